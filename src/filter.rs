use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::entry::{CatalogEntry, DecodeStatus};

/// Inclusive width/height bounds. `None` leaves that edge unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterBounds {
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
}

impl FilterBounds {
    pub const NONE: FilterBounds = FilterBounds {
        min_width: None,
        max_width: None,
        min_height: None,
        max_height: None,
    };

    pub fn is_active(&self) -> bool {
        self.min_width.is_some() || self.max_width.is_some() || self.min_height.is_some() || self.max_height.is_some()
    }

    /// Pending entries always pass: their size is not known yet. Failed
    /// entries are judged as 0 x 0.
    pub fn accepts(&self, entry: &CatalogEntry) -> bool {
        match entry.status() {
            DecodeStatus::Pending => true,
            DecodeStatus::Loaded => self.accepts_dimensions(entry.width(), entry.height()),
            DecodeStatus::Failed => self.accepts_dimensions(0, 0),
        }
    }

    pub fn accepts_dimensions(&self, width: u32, height: u32) -> bool {
        if self.min_width.is_some_and(|min| width < min) {
            return false;
        }
        if self.max_width.is_some_and(|max| width > max) {
            return false;
        }
        if self.min_height.is_some_and(|min| height < min) {
            return false;
        }
        if self.max_height.is_some_and(|max| height > max) {
            return false;
        }
        true
    }

    /// Parses text-field input. Anything but a positive integer means unset.
    pub fn parse_edge(text: &str) -> Option<u32> {
        text.trim().parse::<u32>().ok().filter(|&value| value > 0)
    }
}

/// Identifies one scheduled recomputation. Only the tick of the latest
/// `set_bounds` call is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTick {
    generation: u64,
}

impl FilterTick {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

type TickNotifier = Arc<dyn Fn(FilterTick) + Send + Sync>;

/// Debounced width/height filter over a catalog.
pub struct DimensionFilter {
    applied: FilterBounds,
    pending: FilterBounds,
    generation: u64,
    fired_generation: u64,
    recomputations: u64,
    debounce: Duration,
    runtime: Handle,
    notify: TickNotifier,
}

impl DimensionFilter {
    pub fn new<F>(debounce: Duration, runtime: Handle, notify: F) -> Self
    where
        F: Fn(FilterTick) + Send + Sync + 'static,
    {
        Self {
            applied: FilterBounds::NONE,
            pending: FilterBounds::NONE,
            generation: 0,
            fired_generation: 0,
            recomputations: 0,
            debounce,
            runtime,
            notify: Arc::new(notify),
        }
    }

    /// Records new bounds and restarts the quiet period. The notifier is
    /// called with a tick once the period elapses; pass that tick to
    /// [`DimensionFilter::fire`].
    pub fn set_bounds(&mut self, bounds: FilterBounds) -> FilterTick {
        self.pending = bounds;
        self.generation += 1;

        let tick = FilterTick {
            generation: self.generation,
        };
        let notify = Arc::clone(&self.notify);
        let delay = self.debounce;

        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            notify(tick);
        });

        tick
    }

    pub fn clear(&mut self) -> FilterTick {
        self.set_bounds(FilterBounds::NONE)
    }

    /// Applies the pending bounds if `tick` was not superseded by a later
    /// `set_bounds`. Returns whether the visible subset must be recomputed.
    pub fn fire(&mut self, tick: FilterTick) -> bool {
        if tick.generation != self.generation || tick.generation == self.fired_generation {
            return false;
        }

        self.fired_generation = tick.generation;
        self.applied = self.pending;
        self.recomputations += 1;
        true
    }

    /// Bounds currently in effect.
    pub fn bounds(&self) -> FilterBounds {
        self.applied
    }

    /// Bounds from the latest `set_bounds`, in effect or not.
    pub fn pending_bounds(&self) -> FilterBounds {
        self.pending
    }

    pub fn is_active(&self) -> bool {
        self.applied.is_active()
    }

    /// True when no scheduled recomputation is outstanding.
    pub fn is_settled(&self) -> bool {
        self.fired_generation == self.generation
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Indices of the entries that pass the bounds currently in effect.
    pub fn visible(&self, catalog: &[CatalogEntry]) -> Vec<usize> {
        if !self.applied.is_active() {
            return (0..catalog.len()).collect();
        }

        catalog
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.applied.accepts(entry))
            .map(|(index, _)| index)
            .collect()
    }
}
