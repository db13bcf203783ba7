//! Sequential, fail-fast upload of app metadata in fixed-size batches.

use crate::config::ServiceSettings;
use crate::domain::{Batch, UploadItem, partition};
use crate::error::{Result, VolleyError};
use crate::http::{HttpClient, HttpRequest};
use crate::metrics;

/// Service route accepting a JSON array of app infos.
pub const APP_INFO_PATH: &str = "/app-info/create";

/// Uploads item metadata batch by batch, stopping at the first failure.
pub struct MetadataUploader<'a, H: HttpClient> {
    http_client: &'a H,
    settings: &'a ServiceSettings,
    language_code: &'a str,
    batch_size: usize,
}

impl<'a, H: HttpClient> MetadataUploader<'a, H> {
    pub fn new(
        http_client: &'a H,
        settings: &'a ServiceSettings,
        language_code: &'a str,
        batch_size: usize,
    ) -> Self {
        Self {
            http_client,
            settings,
            language_code,
            batch_size,
        }
    }

    /// Upload every batch in order. Returns the number of batches sent.
    ///
    /// The first failing batch aborts the upload; later batches are never attempted.
    #[tracing::instrument(skip_all, fields(items = items.len(), batch_size = self.batch_size))]
    pub async fn upload_all(&self, items: &[UploadItem]) -> Result<usize> {
        let batches = partition(items, self.batch_size);
        let total = batches.len();

        for batch in batches {
            if let Err(e) = self.upload_batch(batch).await {
                metrics::record_metadata_batch("failure");
                tracing::error!(
                    batch = batch.index,
                    total_batches = total,
                    error = %e,
                    "Metadata batch failed, aborting submission"
                );
                return Err(e);
            }
            metrics::record_metadata_batch("success");
            tracing::debug!(
                batch = batch.index,
                total_batches = total,
                size = batch.len(),
                "Metadata batch uploaded"
            );
        }

        tracing::info!(batches = total, "App metadata uploaded");
        Ok(total)
    }

    async fn upload_batch(&self, batch: Batch<'_>) -> Result<()> {
        let body = serde_json::to_string(&batch.app_infos(self.language_code))
            .map_err(|e| VolleyError::MetadataTransport(e.to_string()))?;

        let request = HttpRequest::post(self.settings.url(APP_INFO_PATH))
            .bearer(&self.settings.token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body);

        let response = self
            .http_client
            .execute(&request)
            .await
            .map_err(|e| VolleyError::MetadataTransport(e.cause_message()))?;

        if !response.is_success() {
            return Err(VolleyError::MetadataStatus {
                status: response.status,
            });
        }
        Ok(())
    }
}
