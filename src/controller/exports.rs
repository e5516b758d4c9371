//! Archive, table and per-item caption exports.

use super::BatchCaptioner;
use crate::error::{Error, Result};
use crate::export::{
    self, ARCHIVE_CONTENT_TYPE, ExportFile, TABLE_CONTENT_TYPE, TEXT_CONTENT_TYPE,
};
use crate::types::{ItemId, ItemStatus};

impl BatchCaptioner {
    /// ZIP of `<base-name>.txt` captions for every selected, captioned item
    ///
    /// Returns `Ok(None)` when nothing qualifies.
    pub async fn export_archive(&self) -> Result<Option<ExportFile>> {
        let items = self.registry.snapshot().await;
        let Some(bytes) = export::build_archive(&items)? else {
            return Ok(None);
        };
        let file_name = export::batch_file_name_today(&self.config.export.file_prefix, "zip");
        tracing::info!(file_name = %file_name, bytes = bytes.len(), "Exported caption archive");
        Ok(Some(ExportFile {
            file_name,
            content_type: ARCHIVE_CONTENT_TYPE,
            bytes,
        }))
    }

    /// `Filename,Caption` CSV for every selected, captioned item
    ///
    /// Returns `None` when nothing qualifies.
    pub async fn export_table(&self) -> Option<ExportFile> {
        let items = self.registry.snapshot().await;
        let table = export::build_table(&items)?;
        let file_name = export::batch_file_name_today(&self.config.export.file_prefix, "csv");
        tracing::info!(file_name = %file_name, "Exported caption table");
        Some(ExportFile {
            file_name,
            content_type: TABLE_CONTENT_TYPE,
            bytes: table.into_bytes(),
        })
    }

    /// `<base-name>.txt` holding one item's caption
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the item does not exist
    /// - [`Error::InvalidState`] unless the item is `success`
    pub async fn export_item(&self, id: ItemId) -> Result<ExportFile> {
        let item = self.registry.get(id).await.ok_or(Error::NotFound(id))?;
        let caption = match (&item.status, &item.caption) {
            (ItemStatus::Success, Some(caption)) => caption.clone(),
            _ => {
                return Err(Error::InvalidState {
                    id,
                    operation: "export caption of".to_string(),
                    status: item.status.to_string(),
                });
            }
        };

        Ok(ExportFile {
            file_name: export::caption_file_name(&item),
            content_type: TEXT_CONTENT_TYPE,
            bytes: caption.into_bytes(),
        })
    }
}
