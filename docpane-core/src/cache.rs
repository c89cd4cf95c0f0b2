use std::collections::HashMap;

use tracing::debug;

use crate::types::{PageRecord, UnitNumber};

/// Identifies the render parameters a fetch was issued under. Bumped on every
/// invalidation so late responses can be told apart from current ones.
pub type Generation = u64;

/// Rendered units keyed by unit number.
///
/// Entries only ever hold records fetched under the current generation and
/// for units inside `1..=total_units`.
#[derive(Debug, Default)]
pub struct PageCache {
    entries: HashMap<UnitNumber, PageRecord>,
    in_flight: HashMap<UnitNumber, Generation>,
    generation: Generation,
    total_units: u32,
}

/// Outcome of [`PageCache::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Stale,
    OutOfRange,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    /// Sets the valid unit range and drops anything outside it.
    pub fn set_total_units(&mut self, total_units: u32) {
        self.total_units = total_units;
        self.entries
            .retain(|unit, _| *unit >= 1 && *unit <= total_units);
    }

    pub fn get(&self, unit: UnitNumber) -> Option<&PageRecord> {
        self.entries.get(&unit)
    }

    pub fn contains(&self, unit: UnitNumber) -> bool {
        self.entries.contains_key(&unit)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn units(&self) -> Vec<UnitNumber> {
        let mut units: Vec<_> = self.entries.keys().copied().collect();
        units.sort_unstable();
        units
    }

    pub fn is_in_flight(&self, unit: UnitNumber) -> bool {
        self.in_flight.get(&unit) == Some(&self.generation)
    }

    /// Marks `unit` as being fetched under the current generation. Returns
    /// false when a fetch for it is already outstanding.
    pub fn begin_fetch(&mut self, unit: UnitNumber) -> bool {
        if self.is_in_flight(unit) {
            return false;
        }
        self.in_flight.insert(unit, self.generation);
        true
    }

    /// Clears the in-flight marker left by a fetch issued under `generation`.
    pub fn finish_fetch(&mut self, unit: UnitNumber, generation: Generation) {
        if self.in_flight.get(&unit) == Some(&generation) {
            self.in_flight.remove(&unit);
        }
    }

    /// Stores a record fetched under `generation`, replacing any previous one.
    pub fn store(&mut self, generation: Generation, record: PageRecord) -> StoreOutcome {
        if generation != self.generation {
            debug!(
                unit = record.unit,
                generation,
                current = self.generation,
                "discarding response from superseded generation"
            );
            return StoreOutcome::Stale;
        }
        if record.unit < 1 || record.unit > self.total_units {
            debug!(unit = record.unit, total = self.total_units, "discarding out-of-range unit");
            return StoreOutcome::OutOfRange;
        }
        self.entries.insert(record.unit, record);
        StoreOutcome::Stored
    }

    /// Drops every record and outstanding fetch marker.
    pub fn invalidate_all(&mut self) {
        debug!(
            dropped = self.entries.len(),
            generation = self.generation + 1,
            "invalidating page cache"
        );
        self.entries.clear();
        self.in_flight.clear();
        self.generation += 1;
    }
}
