//! Export formatters
//!
//! Read-only projections of a registry snapshot. Only items that are both
//! selected and successfully captioned are exported, in registry order.

mod archive;
mod naming;
mod table;

pub use archive::build_archive;
pub use naming::{batch_file_name, batch_file_name_today, caption_file_name};
pub use table::build_table;

use crate::types::BatchItem;

/// MIME type of archive exports
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
/// MIME type of table exports
pub const TABLE_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
/// MIME type of single-caption exports
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A named byte blob ready to hand to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    /// Suggested file name
    pub file_name: String,
    /// MIME type of `bytes`
    pub content_type: &'static str,
    /// File content
    pub bytes: Vec<u8>,
}

/// Items that belong in an export
pub(crate) fn exportable(items: &[BatchItem]) -> impl Iterator<Item = &BatchItem> {
    items.iter().filter(|item| item.is_exportable())
}
