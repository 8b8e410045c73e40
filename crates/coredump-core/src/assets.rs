//! Static web assets embedded in the binary.

use crate::writer::CONTENT_TYPE_HTML;

/// The landing page, linking to `/download` and `/crash`.
pub const INDEX_HTML: &[u8] = include_bytes!("../assets/index.html");

/// A fixed asset and its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAsset {
    pub bytes: &'static [u8],
    pub content_type: &'static str,
}

impl StaticAsset {
    pub const fn new(bytes: &'static [u8], content_type: &'static str) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub const fn index() -> Self {
        Self::new(INDEX_HTML, CONTENT_TYPE_HTML)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
