//! Accumulated timing metrics for simulation performance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SimMetrics {
    pub total_ticks: u64,
    pub total_time: Duration,
    pub plague_time: Duration,
    /// The per-polity phase (expansion, war phase, population, drift).
    pub polity_time: Duration,
    /// Effects join: territory sync plus war bookkeeping.
    pub join_time: Duration,
    pub knowledge_time: Duration,
    pub culture_time: Duration,
    pub trade_time: Duration,
    pub fiscal_time: Duration,
    /// End-of-tick bookkeeping (extinctions, adjacency rebuild).
    pub bookkeeping_time: Duration,
}

impl SimMetrics {
    pub fn tick_avg_ms(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_ticks as f64
        }
    }

    pub fn years_per_second(&self, years_simulated: f64) -> f64 {
        if self.total_time.as_secs_f64() == 0.0 {
            0.0
        } else {
            years_simulated / self.total_time.as_secs_f64()
        }
    }

    /// One-line breakdown for the end-of-run log.
    pub fn summary(&self) -> String {
        format!(
            "{} ticks, avg {:.3} ms (polity {:.1?}, knowledge {:.1?}, trade {:.1?}, fiscal {:.1?})",
            self.total_ticks,
            self.tick_avg_ms(),
            self.polity_time,
            self.knowledge_time,
            self.trade_time,
            self.fiscal_time,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_handle_zero_ticks() {
        let metrics = SimMetrics::default();
        assert_eq!(metrics.tick_avg_ms(), 0.0);
        assert_eq!(metrics.years_per_second(100.0), 0.0);
    }

    #[test]
    fn averages_divide_through() {
        let metrics = SimMetrics {
            total_ticks: 4,
            total_time: Duration::from_millis(40),
            ..Default::default()
        };
        assert!((metrics.tick_avg_ms() - 10.0).abs() < 1e-9);
        assert!((metrics.years_per_second(4.0) - 100.0).abs() < 1e-6);
    }
}
