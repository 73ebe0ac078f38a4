//! Prometheus metrics for the thermo daemon
//!
//! Exposed on `/metrics` in the Prometheus text format.

use std::sync::LazyLock;

use prometheus::{
    Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use thermo_core::{FanGroup, SensorGroup, Severity};
use thermo_rl::{CycleReport, Transition};

/// Global Prometheus registry for thermo metrics
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();

    // Register all metrics
    registry.register(Box::new(TEMPERATURE.clone())).unwrap();
    registry.register(Box::new(FAN_SPEED.clone())).unwrap();
    registry.register(Box::new(EMERGENCY.clone())).unwrap();
    registry.register(Box::new(LAST_REWARD.clone())).unwrap();
    registry.register(Box::new(TABLE_ENTRIES.clone())).unwrap();
    registry.register(Box::new(CYCLES_TOTAL.clone())).unwrap();
    registry.register(Box::new(SKIPPED_CYCLES_TOTAL.clone())).unwrap();
    registry.register(Box::new(STALE_READINGS_TOTAL.clone())).unwrap();
    registry.register(Box::new(ACTUATOR_WRITES_TOTAL.clone())).unwrap();
    registry.register(Box::new(EMERGENCY_TRANSITIONS_TOTAL.clone())).unwrap();
    registry.register(Box::new(TABLE_SAVES_TOTAL.clone())).unwrap();
    registry.register(Box::new(NOTIFICATIONS_TOTAL.clone())).unwrap();

    registry
});

// =============================================================================
// Control Loop Gauges
// =============================================================================

/// Latest temperature per sensor group, raw and smoothed
pub static TEMPERATURE: LazyLock<GaugeVec> = LazyLock::new(|| {
    GaugeVec::new(
        Opts::new("thermo_temperature_celsius", "Latest temperature per sensor group"),
        &["group", "kind"],
    )
    .unwrap()
});

/// Commanded fan speed per fan group
pub static FAN_SPEED: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new("thermo_fan_speed_percent", "Commanded fan speed per fan group"),
        &["fan"],
    )
    .unwrap()
});

pub static EMERGENCY: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("thermo_emergency", "1 while the emergency override is active").unwrap()
});

pub static LAST_REWARD: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new("thermo_last_reward", "Reward of the most recent cycle").unwrap()
});

pub static TABLE_ENTRIES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("thermo_value_table_entries", "Number of learned (state, action) entries")
        .unwrap()
});

// =============================================================================
// Counters
// =============================================================================

pub static CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("thermo_cycles_total", "Total control cycles run").unwrap()
});

pub static SKIPPED_CYCLES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "thermo_skipped_cycles_total",
        "Cycles skipped because a sensor group never reported",
    )
    .unwrap()
});

/// Cycles in which a group reused its last reading
pub static STALE_READINGS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("thermo_stale_readings_total", "Cycles with no fresh reading per group"),
        &["group"],
    )
    .unwrap()
});

pub static ACTUATOR_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("thermo_actuator_writes_total", "Fan speed writes by fan group and result"),
        &["fan", "result"],
    )
    .unwrap()
});

pub static EMERGENCY_TRANSITIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "thermo_emergency_transitions_total",
            "Emergency override transitions",
        ),
        &["transition"],
    )
    .unwrap()
});

pub static TABLE_SAVES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("thermo_table_saves_total", "Value table saves by result"),
        &["result"],
    )
    .unwrap()
});

pub static NOTIFICATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("thermo_notifications_total", "Notifications by severity and result"),
        &["severity", "result"],
    )
    .unwrap()
});

/// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

/// Record the outcome of one control cycle
pub fn record_cycle(report: &CycleReport, table_entries: usize) {
    CYCLES_TOTAL.inc();
    TABLE_ENTRIES.set(table_entries as i64);

    let Some(decision) = &report.decision else {
        SKIPPED_CYCLES_TOTAL.inc();
        if let Some(skip) = &report.skip {
            EMERGENCY.set(i64::from(skip.transition.is_emergency()));
            record_transition(skip.transition);
        }
        return;
    };

    for group in SensorGroup::ALL {
        TEMPERATURE
            .with_label_values(&[group.as_str(), "raw"])
            .set(decision.raw.get(group));
        TEMPERATURE
            .with_label_values(&[group.as_str(), "smoothed"])
            .set(decision.smoothed.get(group));
    }
    for group in &decision.stale {
        STALE_READINGS_TOTAL.with_label_values(&[group.as_str()]).inc();
    }
    for fan in FanGroup::ALL {
        FAN_SPEED
            .with_label_values(&[fan.as_str()])
            .set(i64::from(decision.action.speed(fan)));
    }

    EMERGENCY.set(i64::from(decision.emergency));
    LAST_REWARD.set(decision.reward);

    record_transition(decision.transition);
}

fn record_transition(transition: Transition) {
    match transition {
        Transition::Entered => EMERGENCY_TRANSITIONS_TOTAL
            .with_label_values(&["entered"])
            .inc(),
        Transition::Recovered => EMERGENCY_TRANSITIONS_TOTAL
            .with_label_values(&["recovered"])
            .inc(),
        Transition::Clear | Transition::Sustained => {}
    }
}

/// Record a fan speed write
pub fn record_actuator_write(fan: FanGroup, ok: bool) {
    ACTUATOR_WRITES_TOTAL
        .with_label_values(&[fan.as_str(), result_label(ok)])
        .inc();
}

/// Record a value table save
pub fn record_table_save(ok: bool) {
    TABLE_SAVES_TOTAL.with_label_values(&[result_label(ok)]).inc();
}

/// Record a notification attempt
pub fn record_notification(severity: Severity, ok: bool) {
    let severity = severity.to_string();
    NOTIFICATIONS_TOTAL
        .with_label_values(&[severity.as_str(), result_label(ok)])
        .inc();
}
