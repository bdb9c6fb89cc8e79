use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::BehaviorError;
use crate::engine::Catalog;

/// Picks idle motion groups uniformly and spaces them by a random interval
pub struct IdleMotionSelector {
    groups: Catalog,
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl IdleMotionSelector {
    /// Intervals are drawn from `min..max`; `min` must be non-zero and below
    /// `max`
    pub fn new(groups: Catalog, min: Duration, max: Duration) -> Result<Self, BehaviorError> {
        if min.is_zero() || min >= max {
            return Err(BehaviorError::Interval(min, max));
        }
        Ok(Self {
            groups,
            min,
            max,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Replace the entropy source, mostly for reproducible tests
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &Catalog {
        &self.groups
    }

    pub fn next_group(&mut self) -> Option<&str> {
        self.groups.names().choose(&mut self.rng).map(String::as_str)
    }

    pub fn next_interval(&mut self) -> Duration {
        let secs = self
            .rng
            .random_range(self.min.as_secs_f64()..self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(groups: &[&str]) -> IdleMotionSelector {
        IdleMotionSelector::new(
            Catalog::new(groups.iter().copied()),
            Duration::from_secs(8),
            Duration::from_secs(20),
        )
        .unwrap()
        .with_rng(StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_rejects_bad_interval() {
        for (min, max) in [(0, 5), (5, 5), (9, 4)] {
            assert!(IdleMotionSelector::new(
                Catalog::default(),
                Duration::from_secs(min),
                Duration::from_secs(max),
            )
            .is_err());
        }
    }

    #[test]
    fn test_interval_in_range() {
        let mut sel = selector(&["Idle"]);
        for _ in 0..1000 {
            let d = sel.next_interval();
            assert!(d >= Duration::from_secs(8) && d < Duration::from_secs(20), "{:?}", d);
        }
    }

    #[test]
    fn test_empty_catalog_has_no_group() {
        let mut sel = selector(&[]);
        assert!(sel.is_empty());
        assert_eq!(sel.next_group(), None);
    }

    #[test]
    fn test_every_group_gets_picked() {
        let mut sel = selector(&["Idle", "TapBody", "Wave"]);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..300 {
            seen.insert(sel.next_group().unwrap().to_string());
        }
        assert_eq!(seen.len(), 3);
    }
}
