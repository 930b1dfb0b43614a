//! Dial evaluator
//!
//! Classifies metric values into green / yellow / red zones against a
//! declarative table of direction-aware bounds. The evaluator reads bounds
//! from data only; callers override thresholds by passing another table.

use super::{Direction, MetricId, MetricSnapshot};
use serde::{Deserialize, Serialize};

/// Health classification of one metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

/// Thresholds for one metric
///
/// Red is implicit: anything beyond `yellow_bound` in the bad direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialConfig {
    pub metric: MetricId,
    pub direction: Direction,
    pub green_bound: f64,
    pub yellow_bound: f64,
}

/// Default dial table
pub const DEFAULT_DIALS: [DialConfig; 6] = [
    DialConfig {
        metric: MetricId::BookingSuccessRate,
        direction: Direction::HigherIsBetter,
        green_bound: 0.95,
        yellow_bound: 0.90,
    },
    DialConfig {
        metric: MetricId::BookingDropRate,
        direction: Direction::LowerIsBetter,
        green_bound: 0.05,
        yellow_bound: 0.10,
    },
    DialConfig {
        metric: MetricId::CapacityUtilization,
        direction: Direction::LowerIsBetter,
        green_bound: 0.70,
        yellow_bound: 0.80,
    },
    DialConfig {
        metric: MetricId::TrustViolationRate,
        direction: Direction::LowerIsBetter,
        green_bound: 0.001,
        yellow_bound: 0.01,
    },
    DialConfig {
        metric: MetricId::LatencyP95,
        direction: Direction::LowerIsBetter,
        green_bound: 300.0,
        yellow_bound: 500.0,
    },
    DialConfig {
        metric: MetricId::ErrorRate,
        direction: Direction::LowerIsBetter,
        green_bound: 0.01,
        yellow_bound: 0.03,
    },
];

impl Direction {
    /// True if `value` is at least as good as `bound` in this direction
    pub fn within(&self, value: f64, bound: f64) -> bool {
        match self {
            Direction::HigherIsBetter => value >= bound,
            Direction::LowerIsBetter => value <= bound,
        }
    }
}

impl DialConfig {
    /// Zone for a single value
    pub fn zone(&self, value: f64) -> Zone {
        if self.direction.within(value, self.green_bound) {
            Zone::Green
        } else if self.direction.within(value, self.yellow_bound) {
            Zone::Yellow
        } else {
            Zone::Red
        }
    }
}

/// Evaluated dial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialStatus {
    pub metric: MetricId,
    pub value: f64,
    pub zone: Zone,
}

/// Classify every dial in `dials` against `metrics`, in table order
///
/// # Example
///
/// ```rust
/// use sim_governance_core::metrics::{eval_dials, MetricId, MetricSnapshot, Zone, DEFAULT_DIALS};
///
/// let metrics = MetricSnapshot::default().with(MetricId::CapacityUtilization, 0.9);
/// let statuses = eval_dials(&metrics, &DEFAULT_DIALS);
/// let utilization = statuses.iter().find(|s| s.metric == MetricId::CapacityUtilization).unwrap();
/// assert_eq!(utilization.zone, Zone::Red);
/// ```
pub fn eval_dials(metrics: &MetricSnapshot, dials: &[DialConfig]) -> Vec<DialStatus> {
    dials
        .iter()
        .map(|dial| {
            let value = metrics.get(dial.metric);
            DialStatus {
                metric: dial.metric,
                value,
                zone: dial.zone(value),
            }
        })
        .collect()
}

/// Metrics whose dial landed in the red zone, in table order
pub fn red_metrics(statuses: &[DialStatus]) -> Vec<MetricId> {
    statuses
        .iter()
        .filter(|s| s.zone == Zone::Red)
        .map(|s| s.metric)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dials_cover_every_metric_once() {
        let mut metrics: Vec<_> = DEFAULT_DIALS.iter().map(|d| d.metric).collect();
        metrics.sort();
        assert_eq!(metrics, MetricId::ALL.to_vec());
    }

    #[test]
    fn test_default_dial_directions_match_metric_direction() {
        for dial in DEFAULT_DIALS {
            assert_eq!(dial.direction, dial.metric.direction(), "{}", dial.metric);
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let dial = DEFAULT_DIALS[2];
        assert_eq!(dial.zone(0.70), Zone::Green);
        assert_eq!(dial.zone(0.80), Zone::Yellow);
        assert_eq!(dial.zone(0.8000001), Zone::Red);
    }
}
