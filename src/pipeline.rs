use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::entry::CatalogEntry;
use crate::filter::{DimensionFilter, FilterBounds, FilterTick};
use crate::loader::{apply_outcomes, DecodeJob, DecodeOutcome, LoaderOptions, ThumbnailLoader};
use crate::run::{RunCounter, RunToken};
use crate::scale::{DisplaySettings, DisplaySize};
use crate::scanner::{FolderScanner, ScanOptions};
use crate::{Result, DEFAULT_BATCH_SIZE, DEFAULT_FILTER_DEBOUNCE, DEFAULT_PREVIEW_EDGE};

const INITIAL_STATUS: &str = "Select a folder";
const SEARCHING_STATUS: &str = "Searching for images...";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub preview_edge: u32,
    pub filter_debounce: Duration,
    pub worker_threads: Option<usize>,
    pub max_decode_alloc: u64,
    pub scan: ScanOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let loader = LoaderOptions::default();
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            preview_edge: DEFAULT_PREVIEW_EDGE,
            filter_debounce: DEFAULT_FILTER_DEBOUNCE,
            worker_threads: loader.worker_threads,
            max_decode_alloc: loader.max_decode_alloc,
            scan: ScanOptions::default(),
        }
    }
}

impl PipelineConfig {
    fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            target_long_edge: self.preview_edge,
            worker_threads: self.worker_threads,
            max_decode_alloc: self.max_decode_alloc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Scanning,
    Populated,
    LoadingThumbnails,
    Complete,
    Cancelled,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Complete | PipelinePhase::Cancelled)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PipelinePhase::Scanning | PipelinePhase::Populated | PipelinePhase::LoadingThumbnails
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Phase(PipelinePhase),
    Status(String),
    Loading(bool),
    FolderLabel(String),
    CatalogReplaced { len: usize },
    EntriesUpdated { range: Range<usize> },
    VisibleChanged { visible: usize, total: usize },
    DisplaySettings(DisplaySettings),
}

/// One published change, tagged with the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogUpdate {
    pub run: u64,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&CatalogUpdate)>;

enum PipelineEvent {
    Scanned {
        token: RunToken,
        entries: Vec<CatalogEntry>,
    },
    BatchDecoded {
        token: RunToken,
        range: Range<usize>,
        outcomes: Vec<(usize, DecodeOutcome)>,
    },
    FilterTick(FilterTick),
}

/// Owns the catalog and sequences scan, batched thumbnail decoding and
/// filtering for it.
///
/// Background work reports back over a channel; nothing it produces becomes
/// visible until the owner drains that channel with
/// [`CatalogPipeline::process_events`] or one of the async waiters.
pub struct CatalogPipeline {
    config: PipelineConfig,
    runtime: Handle,
    runs: RunCounter,
    active: Option<RunToken>,
    run_started: Option<Instant>,
    phase: PipelinePhase,
    roots: Vec<PathBuf>,
    catalog: Vec<CatalogEntry>,
    visible: Vec<usize>,
    processed: usize,
    status: String,
    loading: bool,
    folder_label: String,
    display: DisplaySettings,
    filter: DimensionFilter,
    scanner: FolderScanner,
    loader: Arc<ThumbnailLoader>,
    events_sender: UnboundedSender<PipelineEvent>,
    events_receiver: UnboundedReceiver<PipelineEvent>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl CatalogPipeline {
    pub fn new(config: PipelineConfig, runtime: Handle) -> Result<Self> {
        let loader = ThumbnailLoader::new(config.loader_options())?;
        let (events_sender, events_receiver) = mpsc::unbounded_channel();

        let tick_sender = events_sender.clone();
        let filter = DimensionFilter::new(config.filter_debounce, runtime.clone(), move |tick| {
            let _ = tick_sender.send(PipelineEvent::FilterTick(tick));
        });

        Ok(Self {
            scanner: FolderScanner::new(config.scan.clone()),
            loader: Arc::new(loader),
            config,
            runtime,
            runs: RunCounter::new(),
            active: None,
            run_started: None,
            phase: PipelinePhase::Idle,
            roots: Vec::new(),
            catalog: Vec::new(),
            visible: Vec::new(),
            processed: 0,
            status: INITIAL_STATUS.to_owned(),
            loading: false,
            folder_label: String::new(),
            display: DisplaySettings::default(),
            filter,
            events_sender,
            events_receiver,
            observers: Vec::new(),
            next_subscription: 0,
        })
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&CatalogUpdate) + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Starts a new run over `roots`, superseding any run in flight.
    pub fn load<I, P>(&mut self, roots: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();

        if let Some(previous) = self.active.take() {
            if self.phase.is_in_flight() {
                log::debug!("Run {} superseded while {:?}", previous.id(), self.phase);
                self.publish_for(previous.id(), UpdateKind::Phase(PipelinePhase::Cancelled));
            }
        }

        // Invalidates the previous token before any new I/O starts
        let token = self.runs.advance();
        self.active = Some(token.clone());
        self.run_started = Some(Instant::now());

        log::info!("Run {}: scanning {} folder(s)", token.id(), roots.len());

        self.catalog = Vec::new();
        self.visible.clear();
        self.processed = 0;
        self.roots = roots.clone();
        self.folder_label = folder_label(&roots);

        self.publish(UpdateKind::CatalogReplaced { len: 0 });
        self.publish(UpdateKind::FolderLabel(self.folder_label.clone()));
        self.set_loading(true);
        self.set_phase(PipelinePhase::Scanning);
        self.set_status(SEARCHING_STATUS.to_owned());

        let scanner = self.scanner.clone();
        let sender = self.events_sender.clone();
        self.runtime.spawn_blocking(move || {
            let paths = scanner.scan(&roots, &token);
            if token.is_cancelled() {
                return;
            }

            let entries: Vec<CatalogEntry> = paths.into_iter().map(CatalogEntry::discover).collect();
            if token.is_current() {
                let _ = sender.send(PipelineEvent::Scanned { token, entries });
            }
        });
    }

    pub fn set_filter_bounds(&mut self, bounds: FilterBounds) {
        self.filter.set_bounds(bounds);
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// Bounds currently in effect; a bound set within the debounce window is
    /// not reflected until it fires.
    pub fn filter_bounds(&self) -> FilterBounds {
        self.filter.bounds()
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter.is_active()
    }

    pub fn set_display_settings(&mut self, settings: DisplaySettings) {
        if self.display == settings {
            return;
        }
        self.display = settings;
        self.publish(UpdateKind::DisplaySettings(settings));
    }

    pub fn display_settings(&self) -> DisplaySettings {
        self.display
    }

    pub fn display_size(&self, entry: &CatalogEntry) -> DisplaySize {
        self.display.display_size(entry.width(), entry.height())
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn folder_label(&self) -> &str {
        &self.folder_label
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn current_run(&self) -> u64 {
        self.runs.current()
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible
    }

    pub fn visible_entries(&self) -> impl Iterator<Item = &CatalogEntry> + '_ {
        self.visible.iter().filter_map(move |&index| self.catalog.get(index))
    }

    /// Applies every result already delivered by background work without
    /// waiting. Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_receiver.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next background result and applies it.
    pub async fn next_event(&mut self) -> bool {
        match self.events_receiver.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Drives the current run until it stops loading.
    pub async fn run_until_idle(&mut self) {
        while self.loading {
            if !self.next_event().await {
                break;
            }
        }
    }

    /// Drives the current run and any scheduled filter recomputation to rest.
    pub async fn settle(&mut self) {
        while self.loading || !self.filter.is_settled() {
            if !self.next_event().await {
                break;
            }
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Scanned { token, entries } => self.on_scanned(token, entries),
            PipelineEvent::BatchDecoded { token, range, outcomes } => self.on_batch_decoded(token, range, outcomes),
            PipelineEvent::FilterTick(tick) => self.on_filter_tick(tick),
        }
    }

    fn is_active(&self, token: &RunToken) -> bool {
        token.is_current() && self.active.as_ref().is_some_and(|active| active.id() == token.id())
    }

    fn on_scanned(&mut self, token: RunToken, entries: Vec<CatalogEntry>) {
        if !self.is_active(&token) {
            log::debug!("Dropping scan result of superseded run {}", token.id());
            return;
        }

        self.catalog = entries;
        let total = self.catalog.len();
        log::info!("Run {}: found {} images", token.id(), total);

        self.publish(UpdateKind::CatalogReplaced { len: total });
        self.set_phase(PipelinePhase::Populated);
        self.refresh_visible();
        self.set_status(format!("{} found", self.count_text()));

        if total == 0 {
            self.complete();
            return;
        }

        self.set_phase(PipelinePhase::LoadingThumbnails);
        self.dispatch_batch(token, 0);
    }

    fn dispatch_batch(&mut self, token: RunToken, start: usize) {
        if !self.is_active(&token) {
            return;
        }

        let end = (start + self.config.batch_size.max(1)).min(self.catalog.len());
        let jobs: Vec<DecodeJob> = self.catalog[start..end]
            .iter()
            .enumerate()
            .map(|(offset, entry)| DecodeJob {
                index: start + offset,
                path: entry.path().to_path_buf(),
            })
            .collect();

        let loader = Arc::clone(&self.loader);
        let sender = self.events_sender.clone();
        self.runtime.spawn_blocking(move || {
            let outcomes = loader.decode_batch(&jobs, &token);
            if token.is_current() {
                let _ = sender.send(PipelineEvent::BatchDecoded {
                    token,
                    range: start..end,
                    outcomes,
                });
            }
        });
    }

    fn on_batch_decoded(&mut self, token: RunToken, range: Range<usize>, outcomes: Vec<(usize, DecodeOutcome)>) {
        if !self.is_active(&token) {
            log::debug!("Dropping decoded batch of superseded run {}", token.id());
            return;
        }

        let Some(entries) = self.catalog.get_mut(range.clone()) else {
            return;
        };
        let report = apply_outcomes(entries, range.start, outcomes);
        if report.failed > 0 {
            log::debug!("Run {}: {} of {} thumbnails failed in batch", token.id(), report.failed, range.len());
        }

        let total = self.catalog.len();
        self.processed = range.end.min(total);
        self.publish(UpdateKind::EntriesUpdated { range: range.clone() });

        if self.filter.is_active() {
            self.refresh_visible();
        }
        self.set_status(format!("Loading images {} / {}...", self.processed, total));

        if range.end < total {
            self.dispatch_batch(token, range.end);
        } else {
            self.complete();
        }
    }

    fn complete(&mut self) {
        let failed = self.catalog.iter().filter(|entry| entry.is_failed()).count();
        let elapsed = self.run_started.map(|started| started.elapsed()).unwrap_or_default();
        log::info!(
            "Run {}: {} images loaded, {} failed ({:.1}s)",
            self.runs.current(),
            self.catalog.len() - failed,
            failed,
            elapsed.as_secs_f64()
        );

        self.set_phase(PipelinePhase::Complete);
        self.set_loading(false);
        if self.filter.is_active() {
            self.refresh_visible();
        }
        self.set_status(self.final_status());
    }

    fn on_filter_tick(&mut self, tick: FilterTick) {
        if !self.filter.fire(tick) {
            return;
        }

        log::debug!("Applying filter {:?}", self.filter.bounds());
        self.refresh_visible();

        // While loading, the progress text owns the status line
        if !self.loading && !self.catalog.is_empty() {
            self.set_status(self.final_status());
        }
    }

    fn refresh_visible(&mut self) {
        self.visible = self.filter.visible(&self.catalog);
        self.publish(UpdateKind::VisibleChanged {
            visible: self.visible.len(),
            total: self.catalog.len(),
        });
    }

    fn count_text(&self) -> String {
        if self.filter.is_active() {
            format!("{} / {} images", self.visible.len(), self.catalog.len())
        } else {
            format!("{} images", self.catalog.len())
        }
    }

    fn final_status(&self) -> String {
        format!("{} ({})", self.count_text(), self.folder_label)
    }

    fn set_phase(&mut self, phase: PipelinePhase) {
        self.phase = phase;
        self.publish(UpdateKind::Phase(phase));
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.publish(UpdateKind::Loading(loading));
    }

    fn set_status(&mut self, status: String) {
        self.status = status.clone();
        self.publish(UpdateKind::Status(status));
    }

    fn publish(&mut self, kind: UpdateKind) {
        self.publish_for(self.runs.current(), kind);
    }

    fn publish_for(&mut self, run: u64, kind: UpdateKind) {
        let update = CatalogUpdate { run, kind };
        for (_, observer) in self.observers.iter_mut() {
            observer(&update);
        }
    }
}

impl Drop for CatalogPipeline {
    fn drop(&mut self) {
        // Detached scan/decode work stops at its next token check
        self.runs.invalidate();
    }
}

/// Display name of the scanned source: the folder's own name for a single
/// root, otherwise the number of folders.
pub fn folder_label(roots: &[PathBuf]) -> String {
    match roots {
        [root] => root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned()),
        _ => format!("{} folders", roots.len()),
    }
}
