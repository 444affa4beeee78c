use unicode_segmentation::UnicodeSegmentation;

/// Token estimation for English clinical text.
/// Word-based heuristic: avg ~1.3 tokens per word plus a small formatting
/// overhead. Used for transcript accounting and session token budgets.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let words = text.unicode_words().count();
    if words == 0 {
        // Whitespace-free blobs still cost something
        return (text.graphemes(true).count() / 4).max(1);
    }

    ((words as f64 * 1.3) + 5.0).ceil() as usize
}
