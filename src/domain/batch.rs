//! Metadata batches.
//!
//! A batch is a contiguous run of items uploaded together in one `app-info/create` call.

use serde::Serialize;

use super::item::UploadItem;

/// A contiguous slice of the submitted items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Zero-based position of this batch in the submission
    pub index: usize,
    pub items: &'a [UploadItem],
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wire payload for this batch, one element per item in order.
    pub fn app_infos(&self, language_code: &'a str) -> Vec<AppInfo<'a>> {
        self.items
            .iter()
            .map(|item| AppInfo::new(item, language_code))
            .collect()
    }
}

/// Split `items` into batches of at most `batch_size`, preserving order.
///
/// Batches never overlap or skip items; only the last one may be shorter. A `batch_size`
/// of zero is treated as one.
pub fn partition(items: &[UploadItem], batch_size: usize) -> Vec<Batch<'_>> {
    items
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, items)| Batch { index, items })
        .collect()
}

/// One element of the `app-info/create` JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo<'a> {
    pub language_code: &'a str,
    pub main_activity: &'a str,
    pub localized_name: &'a str,
    pub default_name: &'a str,
    pub package_name: &'a str,
}

impl<'a> AppInfo<'a> {
    // No separate localization source: both names are the display name.
    pub fn new(item: &'a UploadItem, language_code: &'a str) -> Self {
        Self {
            language_code,
            main_activity: &item.activity,
            localized_name: &item.name,
            default_name: &item.name,
            package_name: &item.package_name,
        }
    }
}
