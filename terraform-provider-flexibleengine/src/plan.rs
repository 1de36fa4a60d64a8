//! Configuration validation and change planning against a schema

use crate::resources::ResourceState;
use crate::schema::{Diagnostic, SchemaBlock};
use serde_json::Value;
use std::collections::HashMap;

/// Planned state plus the attribute paths that force replacement
#[derive(Debug, Clone, Default)]
pub struct PlannedChange {
    pub state: ResourceState,
    pub requires_replace: Vec<Vec<String>>,
}

/// Check required attributes, block cardinality and unknown names.
pub fn validate_config(schema: &SchemaBlock, config: &ResourceState) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_object(schema, &config.values, &mut Vec::new(), &mut diagnostics);
    diagnostics
}

fn validate_object(
    schema: &SchemaBlock,
    values: &HashMap<String, Value>,
    path: &mut Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr) in &schema.attributes {
        let missing = values.get(name).map_or(true, Value::is_null);
        if attr.required && missing {
            path.push(name.clone());
            diagnostics.push(
                Diagnostic::error(&format!("Missing required argument \"{}\"", path.join(".")))
                    .with_attribute(path.clone()),
            );
            path.pop();
        }
    }

    for (name, nested) in &schema.blocks {
        let items = values
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        path.push(name.clone());
        if let Some(min) = nested.min_items {
            if (items.len() as i64) < min {
                diagnostics.push(
                    Diagnostic::error(&format!(
                        "At least {} \"{}\" block(s) required",
                        min,
                        path.join(".")
                    ))
                    .with_attribute(path.clone()),
                );
            }
        }
        if let Some(max) = nested.max_items {
            if (items.len() as i64) > max {
                diagnostics.push(
                    Diagnostic::error(&format!(
                        "No more than {} \"{}\" block(s) allowed",
                        max,
                        path.join(".")
                    ))
                    .with_attribute(path.clone()),
                );
            }
        }
        for (index, item) in items.iter().enumerate() {
            if let Some(obj) = item.as_object() {
                let obj: HashMap<String, Value> =
                    obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                path.push(index.to_string());
                validate_object(&nested.block, &obj, path, diagnostics);
                path.pop();
            }
        }
        path.pop();
    }

    for name in values.keys() {
        if name != "id" && !schema.attributes.contains_key(name) && !schema.blocks.contains_key(name) {
            path.push(name.clone());
            diagnostics.push(
                Diagnostic::error(&format!("Unsupported argument \"{}\"", path.join(".")))
                    .with_attribute(path.clone()),
            );
            path.pop();
        }
    }
}

/// Plan a change: fill defaults, keep prior computed values and collect
/// force-new differences.
pub fn plan_resource_change(
    schema: &SchemaBlock,
    prior: Option<&ResourceState>,
    proposed: &ResourceState,
) -> PlannedChange {
    let prior_values = prior.map(|p| &p.values);
    let values = plan_object(schema, prior_values, &proposed.values);

    // The ID is never configured
    let mut state = ResourceState { values };
    if let Some(id) = prior.and_then(|p| p.get("id")) {
        state.set("id", id.clone());
    }

    let mut requires_replace = Vec::new();
    if let Some(prior) = prior {
        collect_replacements(
            schema,
            &prior.values,
            &state.values,
            &mut Vec::new(),
            &mut requires_replace,
        );
    }

    PlannedChange {
        state,
        requires_replace,
    }
}

fn plan_object(
    schema: &SchemaBlock,
    prior: Option<&HashMap<String, Value>>,
    proposed: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut planned = HashMap::new();

    for (name, attr) in &schema.attributes {
        let mut value = proposed.get(name).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            if let Some(default) = &attr.default {
                value = default.clone();
            } else if attr.computed {
                if let Some(prior_value) = prior.and_then(|p| p.get(name)) {
                    value = prior_value.clone();
                }
            }
        }
        planned.insert(name.clone(), value);
    }

    for (name, nested) in &schema.blocks {
        let proposed_items = proposed
            .get(name)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let prior_items = prior
            .and_then(|p| p.get(name))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let items: Vec<Value> = proposed_items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let item = to_map(item);
                let prior_item = prior_items.get(index).map(to_map);
                Value::Object(
                    plan_object(&nested.block, prior_item.as_ref(), &item)
                        .into_iter()
                        .collect(),
                )
            })
            .collect();
        planned.insert(name.clone(), Value::Array(items));
    }

    planned
}

fn collect_replacements(
    schema: &SchemaBlock,
    prior: &HashMap<String, Value>,
    planned: &HashMap<String, Value>,
    path: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
) {
    let null = Value::Null;

    let mut names: Vec<&String> = schema.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &schema.attributes[name];
        if !attr.force_new {
            continue;
        }
        let before = prior.get(name).unwrap_or(&null);
        let after = planned.get(name).unwrap_or(&null);
        // An unset computed attribute takes whatever the service assigns
        if after.is_null() && attr.computed {
            continue;
        }
        if before != after {
            let mut p = path.clone();
            p.push(name.clone());
            out.push(p);
        }
    }

    let mut blocks: Vec<&String> = schema.blocks.keys().collect();
    blocks.sort();
    for name in blocks {
        let nested = &schema.blocks[name];
        let before = prior.get(name).and_then(Value::as_array).cloned().unwrap_or_default();
        let after = planned.get(name).and_then(Value::as_array).cloned().unwrap_or_default();

        if nested.force_new {
            if before != after {
                let mut p = path.clone();
                p.push(name.clone());
                out.push(p);
            }
            continue;
        }

        for index in 0..before.len().max(after.len()) {
            let b = before.get(index).map(to_map).unwrap_or_default();
            let a = after.get(index).map(to_map).unwrap_or_default();
            path.push(name.clone());
            path.push(index.to_string());
            collect_replacements(&nested.block, &b, &a, path, out);
            path.pop();
            path.pop();
        }
    }
}

fn to_map(value: &Value) -> HashMap<String, Value> {
    value
        .as_object()
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NestedBlock, SchemaAttribute};
    use serde_json::json;

    fn schema() -> SchemaBlock {
        SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute("vpc_id", SchemaAttribute::string().required().force_new())
            .with_attribute(
                "dhcp_enable",
                SchemaAttribute::bool().optional().with_default(json!(true)),
            )
            .with_attribute(
                "availability_zone",
                SchemaAttribute::string().optional().computed().force_new(),
            )
            .with_attribute("status", SchemaAttribute::string().computed())
            .with_block(
                "db",
                NestedBlock::list(
                    SchemaBlock::new()
                        .with_attribute("type", SchemaAttribute::string().required().force_new())
                        .with_attribute("port", SchemaAttribute::number().optional().computed()),
                )
                .max_items(1),
            )
    }

    fn state(value: Value) -> ResourceState {
        ResourceState {
            values: to_map(&value),
        }
    }

    #[test]
    fn test_validate_reports_missing_and_unknown() {
        let diags = validate_config(
            &schema(),
            &state(json!({"name": "a", "bogus": 1, "db": [{}, {}]})),
        );
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.clone()).collect();

        assert!(summaries.contains(&"Missing required argument \"vpc_id\"".to_string()));
        assert!(summaries.contains(&"Unsupported argument \"bogus\"".to_string()));
        assert!(summaries.contains(&"No more than 1 \"db\" block(s) allowed".to_string()));
        assert!(summaries.contains(&"Missing required argument \"db.0.type\"".to_string()));
    }

    #[test]
    fn test_plan_create_fills_defaults() {
        let planned = plan_resource_change(
            &schema(),
            None,
            &state(json!({"name": "a", "vpc_id": "v1", "db": [{"type": "MySQL"}]})),
        );

        assert_eq!(planned.state.get("dhcp_enable"), Some(&json!(true)));
        assert_eq!(planned.state.get("status"), Some(&Value::Null));
        assert_eq!(planned.state.get("db"), Some(&json!([{"type": "MySQL", "port": null}])));
        assert!(planned.requires_replace.is_empty());
    }

    #[test]
    fn test_plan_update_keeps_computed_and_flags_force_new() {
        let prior = state(json!({
            "id": "sn-1", "name": "a", "vpc_id": "v1", "dhcp_enable": true,
            "availability_zone": "eu-west-0a", "status": "ACTIVE",
            "db": [{"type": "MySQL", "port": 3306}]
        }));
        let proposed = state(json!({
            "name": "b", "vpc_id": "v2", "db": [{"type": "PostgreSQL"}]
        }));

        let planned = plan_resource_change(&schema(), Some(&prior), &proposed);

        assert_eq!(planned.state.get_string("id").as_deref(), Some("sn-1"));
        assert_eq!(planned.state.get_string("status").as_deref(), Some("ACTIVE"));
        assert_eq!(
            planned.state.get_string("availability_zone").as_deref(),
            Some("eu-west-0a")
        );
        assert_eq!(planned.state.get("db"), Some(&json!([{"type": "PostgreSQL", "port": 3306}])));
        assert_eq!(
            planned.requires_replace,
            vec![
                vec!["vpc_id".to_string()],
                vec!["db".to_string(), "0".to_string(), "type".to_string()],
            ]
        );
    }

    #[test]
    fn test_plan_in_place_update() {
        let prior = state(json!({"id": "x", "name": "a", "vpc_id": "v1", "dhcp_enable": true}));
        let proposed = state(json!({"name": "b", "vpc_id": "v1", "dhcp_enable": false}));

        let planned = plan_resource_change(&schema(), Some(&prior), &proposed);

        assert!(planned.requires_replace.is_empty());
        assert_eq!(planned.state.get_bool("dhcp_enable"), Some(false));
    }
}
