use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues run tokens from a monotonically increasing counter.
///
/// Only the most recently issued token is current; issuing a new one
/// invalidates every token handed out before it.
#[derive(Debug, Clone, Default)]
pub struct RunCounter {
    current: Arc<AtomicU64>,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> RunToken {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            id,
            current: Arc::clone(&self.current),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Invalidates the current token without issuing a replacement.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    current: Arc<AtomicU64>,
}

impl RunToken {
    /// A token nobody else can supersede, for standalone scanner/loader use.
    pub fn detached() -> Self {
        RunCounter::new().advance()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.id
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}
