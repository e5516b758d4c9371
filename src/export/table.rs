//! CSV table export

use crate::types::BatchItem;

/// Byte-order mark so spreadsheet tools detect UTF-8
const BOM: &str = "\u{FEFF}";
const HEADER: &str = "Filename,Caption";

/// Build the `Filename,Caption` table over exportable items
///
/// Every field is double-quoted with embedded quotes doubled. Rows are joined
/// with `\n` and there is no trailing newline. Returns `None` when no item is
/// selected and captioned.
pub fn build_table(items: &[BatchItem]) -> Option<String> {
    let rows: Vec<String> = super::exportable(items)
        .map(|item| {
            format!(
                "{},{}",
                quote(&item.file_name),
                quote(item.caption.as_deref().unwrap_or_default())
            )
        })
        .collect();

    if rows.is_empty() {
        return None;
    }

    Some(format!("{BOM}{HEADER}\n{}", rows.join("\n")))
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
