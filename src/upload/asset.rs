//! Per-item icon upload: signed URL, icon bitmap, PNG, PUT.

use std::sync::Arc;

use crate::config::ServiceSettings;
use crate::domain::{UploadItem, UploadOutcome};
use crate::http::{HttpClient, HttpRequest};

use super::icon::IconSource;
use super::signed_url::resolve_upload_url;

/// Uploads one item's icon. Cheap to clone; clones share the client and icon source.
pub struct AssetUploader<H, I: ?Sized> {
    http_client: H,
    icons: Arc<I>,
    settings: Arc<ServiceSettings>,
}

impl<H: Clone, I: ?Sized> Clone for AssetUploader<H, I> {
    fn clone(&self) -> Self {
        Self {
            http_client: self.http_client.clone(),
            icons: self.icons.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<H, I> AssetUploader<H, I>
where
    H: HttpClient,
    I: IconSource + ?Sized,
{
    pub fn new(http_client: H, icons: Arc<I>, settings: Arc<ServiceSettings>) -> Self {
        Self {
            http_client,
            icons,
            settings,
        }
    }

    /// Upload `item`'s icon, producing exactly one outcome whatever happens.
    #[tracing::instrument(skip_all, fields(package_name = %item.package_name))]
    pub async fn upload(&self, item: &UploadItem) -> UploadOutcome {
        let package_name = &item.package_name;

        let Some(upload_url) =
            resolve_upload_url(&self.http_client, &self.settings, package_name).await
        else {
            return UploadOutcome::failure(format!("Failed to get upload URL for {}", package_name));
        };

        let bitmap = match self.icons.load_icon(item).await {
            Ok(Some(bitmap)) => bitmap,
            Ok(None) => {
                return UploadOutcome::failure(format!("Failed to get icon for {}", package_name));
            }
            Err(e) => {
                return UploadOutcome::failure(format!(
                    "Failed to get icon for {}: {}",
                    package_name,
                    e.cause_message()
                ));
            }
        };

        let png = match bitmap.to_png() {
            Ok(png) => png,
            Err(e) => {
                return UploadOutcome::failure(format!(
                    "Failed to convert icon to PNG for {}: {}",
                    package_name,
                    e.cause_message()
                ));
            }
        };

        // The signed URL authorizes the write; no bearer token here.
        let request = HttpRequest::put(upload_url).binary("image/png", png);

        match self.http_client.execute(&request).await {
            Ok(response) if response.is_success() => {
                tracing::debug!(status = response.status, "Icon uploaded");
                UploadOutcome::Success
            }
            Ok(response) => UploadOutcome::failure(format!(
                "Failed to upload icon for {}: HTTP {}",
                package_name, response.status
            )),
            Err(e) => UploadOutcome::failure(format!(
                "Failed to upload icon for {}: {}",
                package_name,
                e.cause_message()
            )),
        }
    }
}
