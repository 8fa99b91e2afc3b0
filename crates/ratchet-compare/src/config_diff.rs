//! Hyperparameter differences across branches

use indexmap::IndexMap;
use ratchet_registry::{ConfigMap, ConfigValue};
use serde::{Deserialize, Serialize};

/// Config keys injected at launch, not hyperparameters
pub const BOOKKEEPING_KEYS: [&str; 2] = ["branch", "commit"];

/// One config key that differs somewhere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDiffRow {
    /// Config key
    pub key: String,
    /// Value per branch; `None` where the branch does not set it
    pub values: IndexMap<String, Option<ConfigValue>>,
}

/// Config keys whose values differ across the given branches
///
/// Bookkeeping keys are skipped. A key also counts as differing when some
/// branches set it and others do not.
#[must_use]
pub fn config_diff(configs: &[(String, ConfigMap)]) -> Vec<ConfigDiffRow> {
    let mut keys: Vec<String> = Vec::new();
    for (_, config) in configs {
        for key in config.keys() {
            if BOOKKEEPING_KEYS.contains(&key.as_str()) {
                continue;
            }
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }

    let mut rows = Vec::new();
    for key in keys {
        let values: IndexMap<String, Option<ConfigValue>> = configs
            .iter()
            .map(|(branch, config)| (branch.clone(), config.get(&key).cloned()))
            .collect();

        let mut distinct: Vec<&Option<ConfigValue>> = Vec::new();
        for value in values.values() {
            if !distinct.iter().any(|v| *v == value) {
                distinct.push(value);
            }
        }
        if distinct.len() > 1 {
            rows.push(ConfigDiffRow { key, values });
        }
    }
    rows
}
