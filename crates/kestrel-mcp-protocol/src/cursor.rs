//! Opaque pagination cursors.
//!
//! A cursor encodes the zero-based index at which the next page resumes,
//! base64-wrapped so clients treat it as opaque.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub usize);

impl Cursor {
    pub fn encode(index: usize) -> String {
        STANDARD.encode(index.to_string())
    }

    /// Decode a client-supplied cursor. Returns `None` for anything that is
    /// not a base64-wrapped decimal index.
    pub fn decode(cursor: &str) -> Option<usize> {
        let bytes = STANDARD.decode(cursor).ok()?;
        let text = std::str::from_utf8(&bytes).ok()?;
        text.parse().ok()
    }
}

/// Slice one page out of `items`, returning the page and the cursor for the
/// next one when more entries remain.
pub fn paginate<T: Clone>(items: &[T], offset: usize, page_size: usize) -> (Vec<T>, Option<String>) {
    if offset >= items.len() {
        return (Vec::new(), None);
    }
    let end = (offset + page_size).min(items.len());
    let page = items[offset..end].to_vec();
    let next = (end < items.len()).then(|| Cursor::encode(end));
    (page, next)
}
