//! World event log.
//!
//! A bounded feed of notable events for external display and debugging.
//! Cosmetic: the log is excluded from determinism comparisons so the
//! fast-forward schedule may emit fewer entries without drifting state.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    PolityFounded { polity: usize, name: String },
    PolityDied { polity: usize, name: String },
    CityFounded { polity: usize, x: i32, y: i32 },
    CapitalPromoted { polity: usize },
    WarStarted { attacker: usize, defender: usize },
    WarEnded { polity: usize },
    Annihilation { winner: usize, loser: usize },
    PlagueStarted,
    PlagueEnded { deaths: i64 },
    Succession { polity: usize, crisis: bool },
    ElectionHeld { polity: usize, incumbent_retained: bool },
    IdeologyChanged { polity: usize, ideology: String },
    Renamed { polity: usize, name: String },
    RoadBuilt { polity: usize },
    PortBuilt { polity: usize },
    AirwayOpened { polity: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEntry {
    pub year: i32,
    pub event: WorldEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsLog {
    entries: VecDeque<NewsEntry>,
    capacity: usize,
    total_recorded: u64,
    /// Fast-forward runs suppress the feed without changing simulation state.
    pub suppressed: bool,
}

impl Default for NewsLog {
    fn default() -> Self {
        Self::with_capacity(512)
    }
}

impl NewsLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            total_recorded: 0,
            suppressed: false,
        }
    }

    pub fn push(&mut self, year: i32, event: WorldEvent) {
        self.total_recorded += 1;
        if self.suppressed {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(NewsEntry { year, event });
    }

    pub fn entries(&self) -> impl Iterator<Item = &NewsEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut news = NewsLog::with_capacity(3);
        for year in 0..10 {
            news.push(year, WorldEvent::PlagueStarted);
        }
        assert_eq!(news.len(), 3);
        assert_eq!(news.total_recorded(), 10);
        assert_eq!(news.entries().next().unwrap().year, 7);
    }

    #[test]
    fn suppression_counts_but_does_not_store() {
        let mut news = NewsLog::with_capacity(8);
        news.suppressed = true;
        news.push(100, WorldEvent::WarEnded { polity: 0 });
        assert!(news.is_empty());
        assert_eq!(news.total_recorded(), 1);
    }
}
