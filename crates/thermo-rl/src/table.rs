//! Tabular value store keyed by (state, action)
//!
//! Entries are created lazily at 0.0 and moved toward each observed reward
//! by `old + alpha * (reward - old)`. No successor-state bootstrap is applied
//! and entries are never evicted; coarse state buckets keep the table small.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use thermo_core::ThermoError;

use crate::state::{Action, Reward, StateKey};

/// Persisted form: `"<state>|<action>" -> value`, e.g. `"40_60|50_45": -1.2`
pub type FlatTable = BTreeMap<String, f64>;

const KEY_SEPARATOR: char = '|';

/// Learned value per (state, action)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlatTable", into = "FlatTable")]
pub struct ValueTable {
    entries: HashMap<(StateKey, Action), f64>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, 0.0 when unvisited
    pub fn get(&self, state: StateKey, action: Action) -> f64 {
        self.entries.get(&(state, action)).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, state: StateKey, action: Action) -> bool {
        self.entries.contains_key(&(state, action))
    }

    /// Move the entry a fraction `alpha` of the way toward `reward` and
    /// return the new value
    pub fn update(&mut self, state: StateKey, action: Action, reward: Reward, alpha: f64) -> f64 {
        let value = self.entries.entry((state, action)).or_insert(0.0);
        *value += alpha * (reward - *value);
        *value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct states visited
    pub fn state_count(&self) -> usize {
        let mut states: Vec<StateKey> = self.entries.keys().map(|(s, _)| *s).collect();
        states.sort_unstable();
        states.dedup();
        states.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StateKey, Action, f64)> + '_ {
        self.entries.iter().map(|(&(s, a), &v)| (s, a, v))
    }

    /// Highest-valued known action for a state. Ties go to the quieter
    /// action (lower total speed), then to the lower radiator speed.
    pub fn best_action(&self, state: StateKey) -> Option<(Action, f64)> {
        self.entries
            .iter()
            .filter(|((s, _), _)| *s == state)
            .map(|(&(_, a), &v)| (a, v))
            .max_by(|(a1, v1), (a2, v2)| {
                v1.total_cmp(v2)
                    .then_with(|| a2.total().cmp(&a1.total()))
                    .then_with(|| a2.cmp(a1))
            })
    }

    /// Flatten into the persisted key/value form
    pub fn to_flat(&self) -> FlatTable {
        self.entries
            .iter()
            .map(|((s, a), v)| (format!("{s}{KEY_SEPARATOR}{a}"), *v))
            .collect()
    }

    /// Rebuild from the persisted form; any malformed key or non-finite
    /// value rejects the whole table
    pub fn from_flat(flat: FlatTable) -> Result<Self, ThermoError> {
        let mut entries = HashMap::with_capacity(flat.len());
        for (key, value) in flat {
            let (state, action) = key.split_once(KEY_SEPARATOR).ok_or_else(|| {
                ThermoError::PersistenceCorrupt(format!("missing `{KEY_SEPARATOR}` in key {key:?}"))
            })?;
            let state: StateKey = state.parse().map_err(ThermoError::PersistenceCorrupt)?;
            let action: Action = action.parse().map_err(ThermoError::PersistenceCorrupt)?;
            if !value.is_finite() {
                return Err(ThermoError::PersistenceCorrupt(format!(
                    "non-finite value for key {key:?}"
                )));
            }
            entries.insert((state, action), value);
        }
        Ok(Self { entries })
    }

    pub fn to_json(&self) -> Result<String, ThermoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a persisted table; both syntax and key errors are reported as
    /// `PersistenceCorrupt`
    pub fn from_json(json: &str) -> Result<Self, ThermoError> {
        let flat: FlatTable = serde_json::from_str(json)
            .map_err(|e| ThermoError::PersistenceCorrupt(e.to_string()))?;
        Self::from_flat(flat)
    }
}

impl TryFrom<FlatTable> for ValueTable {
    type Error = ThermoError;

    fn try_from(flat: FlatTable) -> Result<Self, Self::Error> {
        Self::from_flat(flat)
    }
}

impl From<ValueTable> for FlatTable {
    fn from(table: ValueTable) -> Self {
        table.to_flat()
    }
}
