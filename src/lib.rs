//! Bulk uploader for icon requests.
//!
//! A submission sends app metadata to a statistics service in fixed-size batches, strictly
//! in order and stopping at the first failure, then uploads every app's icon to a signed URL
//! with a bounded number of uploads in flight. Per-icon failures are collected and reported
//! as one readable summary.
//!
//! ```ignore
//! let client = ReqwestHttpClient::new(&TransportConfig::default())?;
//! let submitter = Submitter::new(
//!     client,
//!     Arc::new(icons),
//!     Arc::new(StaticConfig::new("https://stats.example.com", token)),
//!     Arc::new(EnvConfig::from_env()),
//! );
//! if let Some(error) = submitter.submit(&mut items, false).await {
//!     eprintln!("{error}");
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod upload;

// Re-export commonly used types
pub use config::{
    ConfigSource, EnvConfig, ServiceSettings, StaticConfig, SubmitConfig, TransportConfig,
    UploadMode,
};
pub use domain::{AppInfo, Batch, SubmissionId, UploadItem, UploadOutcome, partition};
pub use error::{Result, VolleyError};
pub use fanout::{FanOut, ResultAggregator};
pub use http::{
    HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, MockHttpClient,
    ReqwestHttpClient,
};
pub use orchestrator::{ArchiveBuilder, SharePresenter, SubmitPhase, SubmitReceipt, Submitter};
pub use upload::{AssetUploader, Bitmap, IconSource, InMemoryIconSource, MetadataUploader};
