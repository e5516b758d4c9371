//! Export file names

use chrono::NaiveDate;

use crate::types::BatchItem;

/// `<prefix>_<YYYY-MM-DD>.<extension>`
pub fn batch_file_name(prefix: &str, date: NaiveDate, extension: &str) -> String {
    format!("{prefix}_{}.{extension}", date.format("%Y-%m-%d"))
}

/// Batch export name stamped with today's UTC date
pub fn batch_file_name_today(prefix: &str, extension: &str) -> String {
    batch_file_name(prefix, chrono::Utc::now().date_naive(), extension)
}

/// `<base-name>.txt` for a single item's caption
pub fn caption_file_name(item: &BatchItem) -> String {
    format!("{}.txt", item.image.base_name())
}
