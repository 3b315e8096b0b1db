//! Bounded scalar properties shared across threads.
//!
//! Each property is a single-writer/multi-reader atomic cell. Only the
//! owning [`EngineDispatcher`](super::EngineDispatcher) writes (through the
//! `pub(crate)` setters), always in response to a drained action or a direct
//! call on the owning thread. Every other thread reads without blocking.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Atomic `usize` clamped to an inclusive `[min, max]` range.
#[derive(Debug)]
pub struct BoundedProperty {
    value: AtomicUsize,
    min: AtomicUsize,
    max: AtomicUsize,
}

impl BoundedProperty {
    pub fn new(value: usize, min: usize, max: usize) -> Self {
        let max = max.max(min);
        Self {
            value: AtomicUsize::new(value.clamp(min, max)),
            min: AtomicUsize::new(min),
            max: AtomicUsize::new(max),
        }
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn min(&self) -> usize {
        self.min.load(Ordering::Acquire)
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max.load(Ordering::Acquire)
    }

    /// Clamp `value` to the current bounds without storing it.
    pub fn clamp(&self, value: usize) -> usize {
        value.clamp(self.min(), self.max())
    }

    /// Clamp a signed request (hand-edited documents, encoder arithmetic).
    pub fn clamp_signed(&self, value: i64) -> usize {
        if value < 0 {
            self.min()
        } else {
            self.clamp(value as usize)
        }
    }

    /// Store `value` clamped to the bounds and return what was stored.
    pub(crate) fn set(&self, value: usize) -> usize {
        let clamped = self.clamp(value);
        self.value.store(clamped, Ordering::Release);
        clamped
    }

    /// Replace the bounds and re-clamp the current value.
    pub(crate) fn set_bounds(&self, min: usize, max: usize) -> usize {
        let max = max.max(min);
        self.min.store(min, Ordering::Release);
        self.max.store(max, Ordering::Release);
        self.set(self.get())
    }
}

/// Selection state observed by UI collaborators.
#[derive(Debug)]
pub struct SelectionProperties {
    pub selected_engine_idx: BoundedProperty,
    pub selected_preset_idx: BoundedProperty,
    version: AtomicU64,
}

/// Point-in-time copy of [`SelectionProperties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub engine_idx: usize,
    pub preset_idx: usize,
    pub engine_max: usize,
    pub preset_max: usize,
    pub version: u64,
}

impl SelectionProperties {
    pub fn new(engine_count: usize) -> Self {
        Self {
            selected_engine_idx: BoundedProperty::new(0, 0, engine_count.saturating_sub(1)),
            selected_preset_idx: BoundedProperty::new(0, 0, 0),
            version: AtomicU64::new(0),
        }
    }

    /// Incremented by the owner after every committed change.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            engine_idx: self.selected_engine_idx.get(),
            preset_idx: self.selected_preset_idx.get(),
            engine_max: self.selected_engine_idx.max(),
            preset_max: self.selected_preset_idx.max(),
            version: self.version(),
        }
    }
}
