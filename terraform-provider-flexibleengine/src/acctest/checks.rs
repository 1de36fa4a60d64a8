//! State checks
//!
//! Checks look at flattened attributes, where nested values are addressed as
//! `db.0.port`, list lengths as `availability_zone.#` and map sizes as
//! `tags.%`.

use anyhow::{anyhow, bail};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resource and data source states after a step, keyed by address
#[derive(Debug, Clone, Default)]
pub struct TestState {
    pub resources: BTreeMap<String, Value>,
}

impl TestState {
    /// Flattened attributes of one object
    pub fn attributes(&self, address: &str) -> anyhow::Result<BTreeMap<String, String>> {
        self.resources
            .get(address)
            .map(flatten_state)
            .ok_or_else(|| anyhow!("Not found: {} in state", address))
    }
}

pub type Check = Box<dyn Fn(&TestState) -> anyhow::Result<()>>;

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        _ => None,
    }
}

fn flatten_into(prefix: &str, value: &Value, in_list: bool, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, i), item, true, out);
            }
        }
        Value::Object(map) => {
            if !in_list {
                let count = map.values().filter(|v| !v.is_null()).count();
                out.insert(format!("{}.%", prefix), count.to_string());
            }
            for (k, v) in map {
                flatten_into(&format!("{}.{}", prefix, k), v, false, out);
            }
        }
        other => {
            if let Some(s) = scalar(other) {
                out.insert(prefix.to_string(), s);
            }
        }
    }
}

/// Flatten an object state into `key -> value` pairs
pub fn flatten_state(state: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = state {
        for (k, v) in map {
            flatten_into(k, v, false, &mut out);
        }
    }
    out
}

fn is_count_key(key: &str) -> bool {
    key.ends_with(".#") || key.ends_with(".%")
}

pub fn check_resource_attr(address: &str, key: &str, value: &str) -> Check {
    let (address, key, value) = (address.to_string(), key.to_string(), value.to_string());
    Box::new(move |state| {
        let attributes = state.attributes(&address)?;
        match attributes.get(&key) {
            Some(actual) if *actual == value => Ok(()),
            // Empty collections are not recorded
            None if is_count_key(&key) && value == "0" => Ok(()),
            Some(actual) => bail!("{}: Attribute '{}' expected {:?}, got {:?}", address, key, value, actual),
            None => bail!("{}: Attribute '{}' expected {:?}, got nothing", address, key, value),
        }
    })
}

pub fn check_resource_attr_set(address: &str, key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |state| {
        let attributes = state.attributes(&address)?;
        match attributes.get(&key) {
            Some(v) if !v.is_empty() => Ok(()),
            _ => bail!("{}: Attribute '{}' expected to be set", address, key),
        }
    })
}

pub fn check_no_resource_attr(address: &str, key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |state| {
        let attributes = state.attributes(&address)?;
        match attributes.get(&key) {
            None => Ok(()),
            Some(v) if is_count_key(&key) && v == "0" => Ok(()),
            Some(v) => bail!("{}: Attribute '{}' found when not expected: {:?}", address, key, v),
        }
    })
}

/// Attribute of one object equals an attribute of another
pub fn check_resource_attr_pair(address: &str, key: &str, other_address: &str, other_key: &str) -> Check {
    let (address, key) = (address.to_string(), key.to_string());
    let (other_address, other_key) = (other_address.to_string(), other_key.to_string());
    Box::new(move |state| {
        let first = state.attributes(&address)?;
        let second = state.attributes(&other_address)?;
        match (first.get(&key), second.get(&other_key)) {
            (Some(a), Some(b)) if a == b => Ok(()),
            (None, None) => Ok(()),
            (a, b) => bail!(
                "{}: Attribute '{}' expected {:?} to match {}: Attribute '{}', got {:?}",
                address,
                key,
                b,
                other_address,
                other_key,
                a
            ),
        }
    })
}

/// Run checks in order, stopping at the first failure
pub fn compose(checks: Vec<Check>) -> Check {
    Box::new(move |state| {
        for (i, check) in checks.iter().enumerate() {
            check(state).map_err(|e| anyhow!("Check {}/{} error: {}", i + 1, checks.len(), e))?;
        }
        Ok(())
    })
}
