use image::error::{LimitError, LimitErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, Limits};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::entry::{CatalogEntry, DecodedImage, Preview};
use crate::run::RunToken;
use crate::{CatalogError, Result, DEFAULT_PREVIEW_EDGE, MIN_THREAD_COUNT};

const DEFAULT_MAX_DECODE_ALLOC: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub target_long_edge: u32,
    pub worker_threads: Option<usize>,
    pub max_decode_alloc: u64,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            target_long_edge: DEFAULT_PREVIEW_EDGE,
            worker_threads: None,
            max_decode_alloc: DEFAULT_MAX_DECODE_ALLOC,
        }
    }
}

/// One unit of work handed to the decode pool: an entry's position in the
/// catalog and its source path.
#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub enum DecodeOutcome {
    Decoded(DecodedImage),
    Failed(CatalogError),
    /// The run was superseded before this entry started.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub loaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &DecodeOutcome) {
        match outcome {
            DecodeOutcome::Decoded(_) => self.loaded += 1,
            DecodeOutcome::Failed(_) => self.failed += 1,
            DecodeOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct ThumbnailLoader {
    options: LoaderOptions,
    thread_pool: Arc<rayon::ThreadPool>,
}

impl ThumbnailLoader {
    pub fn new(options: LoaderOptions) -> Result<Self> {
        let threads = options
            .worker_threads
            .filter(|&count| count > 0)
            .unwrap_or_else(|| num_cpus::get().max(MIN_THREAD_COUNT));

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("thumbnail-decode-{}", index))
            .build()?;

        Ok(Self::with_pool(Arc::new(thread_pool), options))
    }

    pub fn with_pool(thread_pool: Arc<rayon::ThreadPool>, options: LoaderOptions) -> Self {
        Self { options, thread_pool }
    }

    pub fn target_long_edge(&self) -> u32 {
        self.options.target_long_edge
    }

    pub fn decode(&self, path: &Path) -> Result<DecodedImage> {
        decode_preview(path, self.options.target_long_edge, self.limits())
    }

    /// Decodes a batch in parallel on the loader's pool and blocks until every
    /// member has finished or been skipped. Outcomes keep the order of `jobs`.
    pub fn decode_batch(&self, jobs: &[DecodeJob], cancel: &RunToken) -> Vec<(usize, DecodeOutcome)> {
        if cancel.is_cancelled() {
            return jobs.iter().map(|job| (job.index, DecodeOutcome::Skipped)).collect();
        }

        self.thread_pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    if cancel.is_cancelled() {
                        return (job.index, DecodeOutcome::Skipped);
                    }
                    let outcome = match self.decode(&job.path) {
                        Ok(decoded) => DecodeOutcome::Decoded(decoded),
                        Err(e) => {
                            log::debug!("Failed to load thumbnail for {:?}: {}", job.path, e);
                            DecodeOutcome::Failed(e)
                        }
                    };
                    (job.index, outcome)
                })
                .collect()
        })
    }

    /// Decodes every entry of `entries` and records the results in place.
    /// Entries skipped because of cancellation stay pending.
    pub fn load_batch(&self, entries: &mut [CatalogEntry], cancel: &RunToken) -> BatchReport {
        let jobs: Vec<DecodeJob> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_pending())
            .map(|(index, entry)| DecodeJob {
                index,
                path: entry.path().to_path_buf(),
            })
            .collect();

        let outcomes = self.decode_batch(&jobs, cancel);
        apply_outcomes(entries, 0, outcomes)
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.options.max_decode_alloc);
        limits
    }
}

/// Writes decode outcomes into `entries`, whose first element sits at catalog
/// index `offset`. Outcomes for indices outside the slice are ignored.
pub fn apply_outcomes(
    entries: &mut [CatalogEntry],
    offset: usize,
    outcomes: Vec<(usize, DecodeOutcome)>,
) -> BatchReport {
    let mut report = BatchReport::default();

    for (index, outcome) in outcomes {
        report.record(&outcome);

        let Some(entry) = index.checked_sub(offset).and_then(|i| entries.get_mut(i)) else {
            continue;
        };
        match outcome {
            DecodeOutcome::Decoded(decoded) => {
                entry.resolve(Ok(decoded));
            }
            DecodeOutcome::Failed(e) => {
                entry.resolve(Err(e));
            }
            DecodeOutcome::Skipped => {}
        }
    }

    report
}

/// Reads the original dimensions from the decoder header, then decodes and
/// shrinks the pixels to at most `long_edge` on the longer side.
///
/// The decode itself runs at full resolution for every format; `limits` is
/// what bounds it. An image whose decoded buffer would exceed
/// `limits.max_alloc` fails with [`CatalogError::Decode`] before any pixels
/// are allocated.
pub fn decode_preview(path: &Path, long_edge: u32, limits: Limits) -> Result<DecodedImage> {
    let io_error = |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let decode_error = |source| CatalogError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ImageReader::open(path)
        .map_err(io_error)?
        .with_guessed_format()
        .map_err(io_error)?;
    let max_alloc = limits.max_alloc;
    reader.limits(limits);

    let decoder = reader.into_decoder().map_err(decode_error)?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(CatalogError::EmptyImage(path.to_path_buf()));
    }
    if max_alloc.is_some_and(|max| decoder.total_bytes() > max) {
        let limit = LimitError::from_kind(LimitErrorKind::InsufficientMemory);
        return Err(decode_error(ImageError::Limits(limit)));
    }

    let img = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    let preview = shrink_to_edge(img, long_edge.max(1));

    Ok(DecodedImage {
        width,
        height,
        preview: Preview::new(preview.to_rgba8()),
    })
}

/// Images already within `size` keep their native pixels.
pub fn shrink_to_edge(img: DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width <= size && height <= size {
        return img;
    }

    let scale_factor = width.max(height) as f32 / size as f32;

    if scale_factor > 8.0 {
        // Cheap nearest pass first, then a filtered pass for the final size
        let intermediate_size = size.saturating_mul(4);
        let step = img.resize(intermediate_size, intermediate_size, FilterType::Nearest);
        step.resize(size, size, FilterType::Triangle)
    } else {
        img.resize(size, size, FilterType::Triangle)
    }
}
