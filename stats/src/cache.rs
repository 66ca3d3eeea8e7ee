use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// Performance counter of the cache controller.
#[derive(
    Debug,
    strum::EnumIter,
    strum::Display,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Counter {
    /// Classifier reported a hit for a looked up request.
    ///
    /// Only lookups made in idle are counted, one per lookup cycle, including the
    /// re-lookup after a refill. Cycles spent servicing a miss count nothing.
    LOOKUP_HIT = 0,
    /// Classifier reported a miss for a looked up request, counted like
    /// [`Counter::LOOKUP_HIT`].
    LOOKUP_MISS,
    /// A request was served from the arrays without leaving idle.
    HIT,
    /// A miss was detected in idle.
    MISS,
    /// A write-back burst was started.
    EVICTION,
}

pub type CacheCsvRow = (Counter, u64);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    pub counters: HashMap<Counter, u64>,
}

impl Default for Cache {
    fn default() -> Self {
        let counters = Counter::iter().map(|counter| (counter, 0)).collect();
        Self { counters }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut out = f.debug_struct("CacheStats");
        for (counter, count) in self.flatten() {
            if count > 0 {
                out.field(&counter.to_string(), &count);
            }
        }
        out.finish_non_exhaustive()
    }
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        for (k, v) in other.counters {
            *self.counters.entry(k).or_insert(0) += v;
        }
    }
}

impl Cache {
    #[inline]
    pub fn inc(&mut self, counter: Counter) {
        *self.counters.entry(counter).or_insert(0) += 1;
    }

    #[inline]
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.get(Counter::HIT)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.get(Counter::MISS)
    }

    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.get(Counter::EVICTION)
    }

    /// Fraction of requests served without a refill.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits() + self.misses();
        if total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.hits() as f64 / total as f64)
    }

    #[must_use]
    pub fn flatten(&self) -> Vec<CacheCsvRow> {
        let mut flattened: Vec<_> = self
            .counters
            .iter()
            .map(|(counter, count)| (*counter, *count))
            .collect();
        flattened.sort_by_key(|(counter, _)| *counter);
        flattened
    }
}
