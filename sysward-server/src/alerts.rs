//! Threshold alerting on sampled metrics.
//!
//! The policy is a pure comparison: a reading strictly above its threshold
//! produces an alert, a reading at or below it stays quiet. Thresholds are
//! fixed at process start; there is no per-request override.

use std::fmt;

pub const DEFAULT_CPU_THRESHOLD: f32 = 80.0;
pub const DEFAULT_RAM_THRESHOLD: f32 = 80.0;

/// Which metric a reading or alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Cpu,
    Ram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "CPU",
            MetricKind::Ram => "RAM",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold crossing. The timestamp is assigned when the alert is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub kind: MetricKind,
    pub value: f32,
}

/// Alert cutoffs in percent, one per metric.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub cpu: f32,
    pub ram: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_CPU_THRESHOLD,
            ram: DEFAULT_RAM_THRESHOLD,
        }
    }
}

/// Strict comparison: equality does not alert.
pub fn evaluate(kind: MetricKind, value: f32, threshold: f32) -> Option<Alert> {
    (value > threshold).then_some(Alert { kind, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_over_threshold_alerts() {
        let alert = evaluate(MetricKind::Cpu, 95.0, 80.0).unwrap();
        assert_eq!(alert.kind, MetricKind::Cpu);
        assert_eq!(alert.value, 95.0);
    }

    #[test]
    fn value_at_threshold_stays_quiet() {
        assert!(evaluate(MetricKind::Ram, 80.0, 80.0).is_none());
    }

    #[test]
    fn value_under_threshold_stays_quiet() {
        assert!(evaluate(MetricKind::Ram, 12.5, 80.0).is_none());
    }

    #[test]
    fn default_thresholds_are_eighty_percent() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.cpu, 80.0);
        assert_eq!(thresholds.ram, 80.0);
    }
}
