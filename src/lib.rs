use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod actions;
pub mod entry;
pub mod filter;
pub mod loader;
pub mod pipeline;
pub mod run;
pub mod scale;
pub mod scanner;

pub use entry::{format_file_size, CatalogEntry, DecodeStatus, DecodedImage, Preview};
pub use filter::{DimensionFilter, FilterBounds, FilterTick};
pub use loader::{BatchReport, DecodeJob, DecodeOutcome, LoaderOptions, ThumbnailLoader};
pub use pipeline::{
    CatalogPipeline, CatalogUpdate, PipelineConfig, PipelinePhase, SubscriptionId, UpdateKind,
};
pub use run::{RunCounter, RunToken};
pub use scale::{compute_display_size, compute_scale, DisplaySettings, DisplaySize};
pub use scanner::{FolderScanner, ScanOptions};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to create thread pool: {0}")]
    ThreadPoolCreation(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Image {0} reports empty dimensions")]
    EmptyImage(PathBuf),

    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "ico", "tiff", "tif"];
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_PREVIEW_EDGE: u32 = 512;
pub const DEFAULT_FILTER_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_THUMBNAIL_SIZE: f64 = 96.0;
pub const DEFAULT_PIXEL_SCALE: f64 = 4.0;
pub const MIN_THREAD_COUNT: usize = 4;

#[derive(Parser, Clone, Debug)]
#[command(name = "pixel-thumb")]
#[command(about = "Catalog folders of images and list them as pixel-perfect thumbnails")]
pub struct Args {
    #[arg(short, long = "directory", default_value = ".")]
    pub directories: Vec<PathBuf>,

    #[arg(short, long, default_value_t = DEFAULT_THUMBNAIL_SIZE)]
    pub thumbnail_size: f64,

    #[arg(short, long, default_value_t = DEFAULT_PIXEL_SCALE)]
    pub pixel_scale: f64,

    #[arg(long, help = "Show small images at their scaled size instead of filling the cell")]
    pub no_fit_small: bool,

    #[arg(long, help = "Let scaled images overflow the cell instead of shrinking them")]
    pub no_fit_large: bool,

    #[arg(long, default_value_t = DEFAULT_PREVIEW_EDGE)]
    pub preview_size: u32,

    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long)]
    pub min_width: Option<u32>,

    #[arg(long)]
    pub max_width: Option<u32>,

    #[arg(long)]
    pub min_height: Option<u32>,

    #[arg(long)]
    pub max_height: Option<u32>,

    #[arg(long, help = "Number of decode threads (defaults to the CPU count, at least 4)")]
    pub threads: Option<usize>,

    #[arg(long, help = "Enable debug output")]
    pub debug: bool,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size.max(1),
            preview_edge: self.preview_size.max(1),
            worker_threads: self.threads,
            ..PipelineConfig::default()
        }
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            container_size: self.thumbnail_size,
            fit_small: !self.no_fit_small,
            fit_large: !self.no_fit_large,
            pixel_scale: self.pixel_scale,
        }
    }

    pub fn filter_bounds(&self) -> FilterBounds {
        FilterBounds {
            min_width: self.min_width,
            max_width: self.max_width,
            min_height: self.min_height,
            max_height: self.max_height,
        }
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext_str| IMAGE_EXTENSIONS.iter().any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext_str)))
        .unwrap_or(false)
}
