use image::RgbaImage;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStatus {
    Pending,
    Loaded,
    Failed,
}

/// Decoded preview pixels. Cloning shares the buffer; the pixels are freed
/// when the last owning entry is dropped.
#[derive(Clone)]
pub struct Preview {
    image: Arc<RgbaImage>,
}

impl Preview {
    pub fn new(image: RgbaImage) -> Self {
        Self { image: Arc::new(image) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preview({}x{})", self.width(), self.height())
    }
}

/// Result of a successful decode: the original image's pixel size plus a
/// bounded preview.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub preview: Preview,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    path: PathBuf,
    file_name: String,
    byte_size: u64,
    width: u32,
    height: u32,
    status: DecodeStatus,
    preview: Option<Preview>,
    failure: Option<String>,
}

impl CatalogEntry {
    pub fn new(path: PathBuf, byte_size: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self {
            path,
            file_name,
            byte_size,
            width: 0,
            height: 0,
            status: DecodeStatus::Pending,
            preview: None,
            failure: None,
        }
    }

    /// Creates a pending entry, reading the byte size from disk. An unreadable
    /// file is recorded with size zero and left for the decoder to fail.
    pub fn discover(path: PathBuf) -> Self {
        let byte_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self::new(path, byte_size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn status(&self) -> DecodeStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == DecodeStatus::Pending
    }

    pub fn is_loaded(&self) -> bool {
        self.status == DecodeStatus::Loaded
    }

    pub fn is_failed(&self) -> bool {
        self.status == DecodeStatus::Failed
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Records a decode result. Only a pending entry changes; returns whether
    /// it did. Dimensions are set together or not at all.
    pub fn resolve(&mut self, result: Result<DecodedImage>) -> bool {
        if self.status != DecodeStatus::Pending {
            return false;
        }

        match result {
            Ok(decoded) if decoded.width > 0 && decoded.height > 0 => {
                self.width = decoded.width;
                self.height = decoded.height;
                self.preview = Some(decoded.preview);
                self.status = DecodeStatus::Loaded;
            }
            Ok(_) => {
                self.status = DecodeStatus::Failed;
                self.failure = Some("image reports empty dimensions".to_owned());
            }
            Err(e) => {
                self.status = DecodeStatus::Failed;
                self.failure = Some(e.to_string());
            }
        }
        true
    }

    pub fn file_size_text(&self) -> String {
        format_file_size(self.byte_size)
    }

    pub fn resolution_text(&self) -> String {
        if self.width > 0 && self.height > 0 {
            format!("{} × {}", self.width, self.height)
        } else {
            "Unknown".to_owned()
        }
    }

    pub fn info_text(&self) -> String {
        format!(
            "File: {}\nPath: {}\nResolution: {}\nSize: {}",
            self.file_name,
            self.path.display(),
            self.resolution_text(),
            self.file_size_text()
        )
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
