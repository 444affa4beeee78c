pub mod chat;
pub mod health;
pub mod logs;

pub use chat::chat_handler;
pub use health::health_check;
pub use logs::{logs_handler, monitor_handler};

use crate::utils::error::ApiError;

/// Session ids become transcript file names, so only a conservative
/// character set is accepted: ASCII alphanumerics and hyphens, as minted by
/// `Uuid::new_v4`. Anything else (separators, dots, empty ids) is rejected
/// before it can reach the filesystem.
pub(crate) fn validate_session_id(id: &str) -> Result<(), ApiError> {
    let well_formed = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid session id: {id}")))
    }
}
