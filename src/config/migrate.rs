use crate::config::{Config, KNOWN_KEYS};
use crate::errors::AppResult;
use crate::ui::messages::info;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Return the known keys missing from the YAML file at `conf`.
/// A missing or unparsable file reports every key as missing.
pub fn missing_keys(conf: &Path) -> AppResult<Vec<&'static str>> {
    if !conf.exists() {
        return Ok(KNOWN_KEYS.to_vec());
    }

    let content = fs::read_to_string(conf)?;
    let yaml: Value = serde_yaml::from_str(&content)?;

    let Some(map) = yaml.as_mapping() else {
        return Ok(KNOWN_KEYS.to_vec());
    };

    Ok(KNOWN_KEYS
        .iter()
        .filter(|k| !map.contains_key(Value::String(k.to_string())))
        .copied()
        .collect())
}

/// Add any missing key to the YAML file, using the value `cfg` already
/// resolved (serde defaults for absent fields). Existing values are never
/// overwritten.
///   Returns:
///   Ok(true)  → config updated
///   Ok(false) → no change needed
pub fn add_missing_keys(conf: &Path, cfg: &Config) -> AppResult<bool> {
    let missing = missing_keys(conf)?;
    if missing.is_empty() {
        return Ok(false);
    }

    let mut map = if conf.exists() {
        let content = fs::read_to_string(conf)?;
        match serde_yaml::from_str::<Value>(&content)? {
            Value::Mapping(m) => m,
            _ => Mapping::new(),
        }
    } else {
        Mapping::new()
    };

    let resolved = serde_yaml::to_value(cfg)?;
    let Some(resolved) = resolved.as_mapping() else {
        return Ok(false);
    };

    for key in &missing {
        let k = Value::String(key.to_string());
        if let Some(v) = resolved.get(&k) {
            map.insert(k, v.clone());
        }
    }

    if let Some(parent) = conf.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(conf, serde_yaml::to_string(&Value::Mapping(map))?)?;

    info(format!(
        "Config migration performed: added {}",
        missing.join(", ")
    ));

    Ok(true)
}
