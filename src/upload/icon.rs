//! Icon bitmaps and the collaborator that supplies them.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;

use crate::domain::UploadItem;
use crate::error::{Result, VolleyError};

/// A decoded icon: 8-bit RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Wrap raw RGBA pixels, checking the buffer matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VolleyError::Validation(format!(
                "bitmap dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|area| area.checked_mul(4))
            .ok_or_else(|| {
                VolleyError::Validation(format!(
                    "bitmap dimensions {}x{} are too large",
                    width, height
                ))
            })?;
        if pixels.len() != expected {
            return Err(VolleyError::Validation(format!(
                "expected {} bytes of RGBA data for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Encode losslessly as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .context("failed to write PNG header")?;
            writer
                .write_image_data(&self.pixels)
                .context("failed to write PNG image data")?;
            writer.finish().context("failed to finish PNG stream")?;
        }
        Ok(bytes)
    }
}

/// Supplies the launcher icon for an item.
///
/// `Ok(None)` means the app has no icon available (e.g. it was uninstalled); `Err` means
/// the icon exists but could not be decoded.
#[async_trait]
pub trait IconSource: Send + Sync {
    async fn load_icon(&self, item: &UploadItem) -> Result<Option<Bitmap>>;
}

/// Icons held in memory, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIconSource {
    icons: HashMap<String, Bitmap>,
}

impl InMemoryIconSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_icon(mut self, package_name: impl Into<String>, bitmap: Bitmap) -> Self {
        self.insert(package_name, bitmap);
        self
    }

    pub fn insert(&mut self, package_name: impl Into<String>, bitmap: Bitmap) {
        self.icons.insert(package_name.into(), bitmap);
    }
}

#[async_trait]
impl IconSource for InMemoryIconSource {
    async fn load_icon(&self, item: &UploadItem) -> Result<Option<Bitmap>> {
        Ok(self.icons.get(&item.package_name).cloned())
    }
}
