//! Rolling temperature history and moving-average smoothing

use std::collections::{HashMap, VecDeque};

use thermo_core::SensorGroup;

/// Bounded FIFO of recent readings per sensor group
#[derive(Debug, Clone)]
pub struct TemperatureHistory {
    groups: HashMap<SensorGroup, VecDeque<f64>>,
    capacity: usize,
}

impl TemperatureHistory {
    /// Create a history keeping at most `capacity` readings per group
    pub fn new(capacity: usize) -> Self {
        Self {
            groups: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a reading, evicting the oldest beyond capacity, and return the
    /// arithmetic mean of the group's window
    pub fn record(&mut self, group: SensorGroup, reading: f64) -> f64 {
        let window = self
            .groups
            .entry(group)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(reading);

        mean(window).unwrap_or(reading)
    }

    /// Current smoothed value without recording anything
    pub fn smoothed(&self, group: SensorGroup) -> Option<f64> {
        self.groups.get(&group).and_then(mean)
    }

    /// Number of readings held for a group
    pub fn len(&self, group: SensorGroup) -> usize {
        self.groups.get(&group).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(VecDeque::is_empty)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

fn mean(window: &VecDeque<f64>) -> Option<f64> {
    if window.is_empty() {
        None
    } else {
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }
}
