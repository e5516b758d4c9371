//! ZIP archive export

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::Result;
use crate::types::BatchItem;

/// Build a ZIP with one `<base-name>.txt` per exportable item
///
/// Entries are written in registry order. Colliding names get ` (1)`, ` (2)`,
/// ... suffixes so every caption lands in the archive. Timestamps are fixed,
/// so equal input yields byte-identical output. Returns `Ok(None)` when no item
/// is selected and captioned.
pub fn build_archive(items: &[BatchItem]) -> Result<Option<Vec<u8>>> {
    let mut exportable = super::exportable(items).peekable();
    if exportable.peek().is_none() {
        return Ok(None);
    }

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used = HashSet::new();

    for item in exportable {
        let entry = unique_entry_name(item.image.base_name(), &mut used);
        writer.start_file(entry, options)?;
        writer.write_all(item.caption.as_deref().unwrap_or_default().as_bytes())?;
    }

    let bytes = writer.finish()?.into_inner();
    tracing::debug!(entries = used.len(), bytes = bytes.len(), "Built caption archive");
    Ok(Some(bytes))
}

/// First of `base.txt`, `base (1).txt`, `base (2).txt`, ... not yet used
fn unique_entry_name(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = format!("{base}.txt");
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = format!("{base} ({n}).txt");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}
