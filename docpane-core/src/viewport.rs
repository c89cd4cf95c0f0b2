//! Visibility-driven fetch planning.
//!
//! The watcher knows nothing about how visibility is detected. A host reports
//! which placeholders became visible and gets back the units that still need
//! fetching.

use std::collections::BTreeSet;

use crate::cache::PageCache;
use crate::types::UnitNumber;

/// Turns a set of visible units into the units that should be fetched.
pub trait FetchPlanner: Send + Sync {
    fn plan(&self, visible: &[UnitNumber], total_units: u32, cache: &PageCache) -> Vec<UnitNumber>;
}

/// Fetches each visible unit plus `radius` numeric neighbours on either side.
#[derive(Debug, Clone, Copy)]
pub struct NeighborPlanner {
    pub radius: u32,
}

impl Default for NeighborPlanner {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl FetchPlanner for NeighborPlanner {
    fn plan(&self, visible: &[UnitNumber], total_units: u32, cache: &PageCache) -> Vec<UnitNumber> {
        let mut wanted = BTreeSet::new();
        for &unit in visible {
            if unit < 1 || unit > total_units {
                continue;
            }
            let low = unit.saturating_sub(self.radius).max(1);
            let high = unit.saturating_add(self.radius).min(total_units);
            wanted.extend(low..=high);
        }
        wanted
            .into_iter()
            .filter(|unit| !cache.contains(*unit) && !cache.is_in_flight(*unit))
            .collect()
    }
}

pub struct ViewportWatcher {
    planner: Box<dyn FetchPlanner>,
    visible: BTreeSet<UnitNumber>,
    total_units: u32,
    observing: bool,
}

impl ViewportWatcher {
    pub fn new(planner: Box<dyn FetchPlanner>) -> Self {
        Self {
            planner,
            visible: BTreeSet::new(),
            total_units: 0,
            observing: false,
        }
    }

    /// Starts observing placeholders `1..=total_units`.
    pub fn observe(&mut self, total_units: u32) {
        self.total_units = total_units;
        self.visible.clear();
        self.observing = true;
    }

    /// Stops observing. Later reports are ignored until [`observe`](Self::observe).
    pub fn release(&mut self) {
        self.observing = false;
        self.visible.clear();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn visible(&self) -> &BTreeSet<UnitNumber> {
        &self.visible
    }

    /// Records newly visible units and returns what should be fetched.
    pub fn on_visible(&mut self, units: &[UnitNumber], cache: &PageCache) -> Vec<UnitNumber> {
        if !self.observing {
            return Vec::new();
        }
        let in_range: Vec<_> = units
            .iter()
            .copied()
            .filter(|unit| *unit >= 1 && *unit <= self.total_units)
            .collect();
        self.visible.extend(in_range.iter().copied());
        self.planner.plan(&in_range, self.total_units, cache)
    }
}

impl Default for ViewportWatcher {
    fn default() -> Self {
        Self::new(Box::new(NeighborPlanner::default()))
    }
}
