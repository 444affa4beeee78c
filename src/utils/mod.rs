pub mod error;
pub mod token_counter;

pub use token_counter::count_tokens;
