//! Network stages of a submission: metadata batches and per-item icon uploads.

pub mod asset;
pub mod icon;
pub mod metadata;
pub mod signed_url;

pub use asset::AssetUploader;
pub use icon::{Bitmap, IconSource, InMemoryIconSource};
pub use metadata::{APP_INFO_PATH, MetadataUploader};
pub use signed_url::{UPLOAD_URL_PATH, resolve_upload_url};
