//! Submission orchestrator.
//!
//! A submission moves through these phases:
//!
//! ```text
//! ResolvingConfig ──> UploadingMetadata ──> UploadingAssets ──> Done
//!        │                   │                                   ^
//!        └── missing ────────┴── first failed batch ─────────────┘
//! ```
//!
//! In [`UploadMode::BestEffort`] the upload phases run as telemetry: their failures are
//! logged, then the [`ArchiveBuilder`] decides the result and its archive is handed straight
//! to the [`SharePresenter`] (`Archiving` phase).

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ConfigSource, ServiceSettings, SubmitConfig, UploadMode};
use crate::domain::{SubmissionId, UploadItem};
use crate::error::{Result, VolleyError, panic_message};
use crate::fanout::{FanOut, ResultAggregator};
use crate::http::HttpClient;
use crate::upload::{AssetUploader, IconSource, MetadataUploader};

/// Phase a submission is in, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    ResolvingConfig,
    UploadingMetadata,
    UploadingAssets,
    Archiving,
    Done,
}

impl fmt::Display for SubmitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmitPhase::ResolvingConfig => "resolving_config",
            SubmitPhase::UploadingMetadata => "uploading_metadata",
            SubmitPhase::UploadingAssets => "uploading_assets",
            SubmitPhase::Archiving => "archiving",
            SubmitPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Builds the local request archive (icons plus generated resource files).
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    /// Build the archive and return its path.
    ///
    /// Implementations set [`UploadItem::file_name`] on items whose icon they saved.
    async fn build(&self, items: &mut [UploadItem]) -> Result<PathBuf>;
}

/// Presents a finished archive to the user, e.g. through a share sheet.
pub trait SharePresenter: Send + Sync {
    fn present(&self, archive: &Path) -> Result<()>;
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub submission_id: SubmissionId,
    /// Archive handed to the presenter, in best-effort mode
    pub archive_path: Option<PathBuf>,
}

/// Submits icon requests to the statistics service.
pub struct Submitter<H, I: ?Sized> {
    http_client: H,
    icons: Arc<I>,
    primary: Arc<dyn ConfigSource>,
    fallback: Arc<dyn ConfigSource>,
    config: SubmitConfig,
    archiver: Option<Arc<dyn ArchiveBuilder>>,
    presenter: Option<Arc<dyn SharePresenter>>,
}

impl<H, I> Submitter<H, I>
where
    H: HttpClient + 'static,
    I: IconSource + ?Sized + 'static,
{
    /// Create a submitter reading credentials from `primary`, then `fallback`.
    pub fn new(
        http_client: H,
        icons: Arc<I>,
        primary: Arc<dyn ConfigSource>,
        fallback: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            http_client,
            icons,
            primary,
            fallback,
            config: SubmitConfig::default(),
            archiver: None,
            presenter: None,
        }
    }

    pub fn with_config(mut self, config: SubmitConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the archive collaborators required by [`UploadMode::BestEffort`].
    pub fn with_archive(
        mut self,
        archiver: Arc<dyn ArchiveBuilder>,
        presenter: Arc<dyn SharePresenter>,
    ) -> Self {
        self.archiver = Some(archiver);
        self.presenter = Some(presenter);
        self
    }

    pub fn config(&self) -> &SubmitConfig {
        &self.config
    }

    /// Submit `items`. Returns `None` on success, otherwise a human-readable diagnostic.
    ///
    /// `is_premium` is accepted for callers that track it but does not change behavior.
    pub async fn submit(&self, items: &mut [UploadItem], is_premium: bool) -> Option<String> {
        self.submit_with_cancellation(items, is_premium, CancellationToken::new())
            .await
    }

    /// Like [`Submitter::submit`], aborting with `Icon upload interrupted` if `cancellation`
    /// fires while icon uploads are being admitted or joined.
    pub async fn submit_with_cancellation(
        &self,
        items: &mut [UploadItem],
        is_premium: bool,
        cancellation: CancellationToken,
    ) -> Option<String> {
        let submission = self.try_submit(items, is_premium, cancellation);
        match AssertUnwindSafe(submission).catch_unwind().await {
            Ok(Ok(_receipt)) => None,
            Ok(Err(e)) => Some(e.into_report()),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "Submission panicked");
                Some(format!("Request failed: {}", message))
            }
        }
    }

    /// Structured form of [`Submitter::submit`]; the error's `Display` matches the string
    /// contract (after [`VolleyError::into_report`]).
    pub async fn try_submit(
        &self,
        items: &mut [UploadItem],
        is_premium: bool,
        cancellation: CancellationToken,
    ) -> Result<SubmitReceipt> {
        let submission_id = SubmissionId::new();
        let span = tracing::info_span!(
            "submit",
            submission_id = %submission_id,
            items = items.len(),
            mode = ?self.config.mode,
        );

        async move {
            let result = self
                .run(submission_id, items, is_premium, &cancellation)
                .await;
            match &result {
                Ok(_) => tracing::info!(phase = %SubmitPhase::Done, "Submission succeeded"),
                Err(e) => tracing::warn!(phase = %SubmitPhase::Done, error = %e, "Submission failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        submission_id: SubmissionId,
        items: &mut [UploadItem],
        is_premium: bool,
        cancellation: &CancellationToken,
    ) -> Result<SubmitReceipt> {
        self.config.validate()?;
        tracing::debug!(is_premium, "Starting submission");

        match self.config.mode {
            UploadMode::Authoritative => {
                let settings = self.resolve_settings()?;
                self.upload(settings, items, cancellation).await?;
                Ok(SubmitReceipt {
                    submission_id,
                    archive_path: None,
                })
            }
            UploadMode::BestEffort => {
                let (Some(archiver), Some(presenter)) = (&self.archiver, &self.presenter) else {
                    return Err(VolleyError::Validation(
                        "best-effort mode requires an archive builder and share presenter"
                            .to_string(),
                    ));
                };

                match self.resolve_settings() {
                    Ok(settings) => {
                        if let Err(e) = self.upload(settings, items, cancellation).await {
                            tracing::warn!(error = %e, "Statistics upload failed, continuing with archive");
                        }
                    }
                    Err(e) => {
                        tracing::debug!(reason = %e, "Statistics service not configured, skipping upload");
                    }
                }

                tracing::info!(phase = %SubmitPhase::Archiving, "Building request archive");
                let archive_path = archiver.build(items).await.map_err(|e| match e {
                    VolleyError::Archive(_) => e,
                    other => VolleyError::Archive(other.cause_message()),
                })?;

                if let Err(e) = presenter.present(&archive_path) {
                    tracing::error!(archive = %archive_path.display(), error = %e, "Failed to present archive");
                }

                Ok(SubmitReceipt {
                    submission_id,
                    archive_path: Some(archive_path),
                })
            }
        }
    }

    fn resolve_settings(&self) -> Result<ServiceSettings> {
        tracing::debug!(phase = %SubmitPhase::ResolvingConfig, "Resolving statistics service settings");
        ServiceSettings::resolve(self.primary.as_ref(), self.fallback.as_ref())
    }

    /// Metadata batches first; icons only if every batch went through.
    async fn upload(
        &self,
        settings: ServiceSettings,
        items: &[UploadItem],
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let language_code = self.config.resolved_language_code();

        tracing::info!(
            phase = %SubmitPhase::UploadingMetadata,
            endpoint = %settings.endpoint,
            language_code = %language_code,
            "Uploading app metadata"
        );
        MetadataUploader::new(
            &self.http_client,
            &settings,
            &language_code,
            self.config.batch_size,
        )
        .upload_all(items)
        .await?;

        tracing::info!(phase = %SubmitPhase::UploadingAssets, "Uploading icons");
        let uploader = AssetUploader::new(
            self.http_client.clone(),
            self.icons.clone(),
            Arc::new(settings),
        );
        let aggregator = Arc::new(ResultAggregator::new());

        FanOut::new(self.config.concurrency)
            .with_cancellation(cancellation.clone())
            .run(items.to_vec(), aggregator.clone(), move |item: UploadItem| {
                let uploader = uploader.clone();
                async move { uploader.upload(&item).await }
            })
            .await?;

        match aggregator.summary() {
            None => Ok(()),
            Some(summary) => Err(VolleyError::UploadIncomplete(summary)),
        }
    }
}
