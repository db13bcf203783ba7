//! Core domain types for the upload pipeline.
//!
//! This module contains pure domain types with no transport dependencies:
//! - Upload items and submission identifiers
//! - Metadata batches and their wire payload
//! - Per-item upload outcomes

pub mod batch;
pub mod item;
pub mod outcome;

pub use batch::{AppInfo, Batch, partition};
pub use item::{SubmissionId, UploadItem};
pub use outcome::UploadOutcome;
