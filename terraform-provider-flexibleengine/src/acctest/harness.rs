//! Test case runner
//!
//! Each step applies a configuration the way Terraform would: removed
//! resources are destroyed, blocks are planned and applied in declaration
//! order, everything is refreshed and re-planned to catch drift, then the
//! step's checks run. Whatever is left is destroyed when the case ends.

use super::checks::{flatten_state, Check, TestState};
use super::hcl::{Block, BlockKind, Configuration};
use crate::config::ProviderConfig;
use crate::provider::FlexibleEngineProvider;
use crate::schema::{RpcRequest, RpcResponse};
use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A multi-step test
#[derive(Default)]
pub struct TestCase {
    /// Provider block; unset fields come from `OS_*` variables
    pub provider: ProviderConfig,
    /// Run even when `TF_ACC` is unset
    pub unit_test: bool,
    pub pre_check: Option<fn()>,
    pub steps: Vec<TestStep>,
}

/// Import the object at `address` and optionally compare with its state
#[derive(Debug, Clone, Default)]
pub struct ImportStep {
    pub address: String,
    /// Import ID; the object's `id` when unset
    pub id: Option<String>,
    pub verify: bool,
    /// Attribute prefixes left out of the comparison
    pub ignore: Vec<String>,
}

impl ImportStep {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn verify(mut self) -> Self {
        self.verify = true;
        self
    }

    pub fn ignore(mut self, prefixes: &[&str]) -> Self {
        self.ignore.extend(prefixes.iter().map(|p| p.to_string()));
        self
    }
}

#[derive(Default)]
pub struct TestStep {
    pub config: Option<Configuration>,
    pub check: Option<Check>,
    pub import: Option<ImportStep>,
    /// The step must fail with an error containing this text
    pub expect_error: Option<String>,
}

impl TestStep {
    pub fn config(config: Configuration) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }

    pub fn import(import: ImportStep) -> Self {
        Self {
            import: Some(import),
            ..Default::default()
        }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    pub fn expect_error(mut self, text: &str) -> Self {
        self.expect_error = Some(text.to_string());
        self
    }
}

/// Run a test case, panicking on failure. Skipped unless `TF_ACC` is set or
/// the case is a unit test.
pub fn test(case: TestCase) {
    if !case.unit_test && !super::acc_enabled() {
        eprintln!("skipping: acceptance tests run only when {} is set", super::ENV_ACC);
        return;
    }
    if let Some(pre_check) = case.pre_check {
        pre_check();
    }
    if let Err(e) = run(case) {
        panic!("{:#}", e);
    }
}

/// Run a test case and destroy what it created
pub fn run(case: TestCase) -> anyhow::Result<()> {
    let mut runner = Runner::new()?;
    let result = runner.run_steps(case);
    let destroyed = runner.destroy_all();

    match (result, destroyed) {
        (Err(e), Err(d)) => Err(e.context(format!("destroy also failed: {:#}", d))),
        (Err(e), Ok(())) => Err(e),
        (Ok(()), destroyed) => destroyed.context("error destroying resources"),
    }
}

struct Runner {
    provider: FlexibleEngineProvider,
    next_id: i64,
    state: TestState,
    /// Resource address to type name
    types: HashMap<String, String>,
    /// Resource addresses in creation order
    order: Vec<String>,
}

fn error_summaries(result: &Value) -> Vec<String> {
    result
        .get("diagnostics")
        .and_then(Value::as_array)
        .map(|diagnostics| {
            diagnostics
                .iter()
                .filter(|d| d["severity"] == "ERROR")
                .map(|d| match d["detail"].as_str() {
                    Some(detail) => format!("{}: {}", d["summary"].as_str().unwrap_or(""), detail),
                    None => d["summary"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => false,
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

/// Paths where configured values differ from the state
fn config_drift(path: &str, configured: &Value, actual: Option<&Value>, out: &mut Vec<String>) {
    let join = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    };

    match configured {
        Value::Null => {}
        Value::Object(map) => {
            if map.is_empty() && is_absent(actual) {
                return;
            }
            for (k, v) in map {
                if path.is_empty() && k == "timeouts" {
                    continue;
                }
                config_drift(&join(k), v, actual.and_then(|a| a.get(k)), out);
            }
        }
        Value::Array(items) => match actual.and_then(Value::as_array) {
            Some(actual_items) if actual_items.len() == items.len() => {
                for (i, (c, a)) in items.iter().zip(actual_items).enumerate() {
                    config_drift(&join(&i.to_string()), c, Some(a), out);
                }
            }
            _ if items.is_empty() && is_absent(actual) => {}
            _ => out.push(path.to_string()),
        },
        Value::Number(_) => {
            if !actual.map_or(false, |a| numbers_equal(configured, a)) {
                out.push(path.to_string());
            }
        }
        scalar => {
            if actual != Some(scalar) {
                out.push(path.to_string());
            }
        }
    }
}

impl Runner {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            provider: FlexibleEngineProvider::new().context("failed to create provider")?,
            next_id: 0,
            state: TestState::default(),
            types: HashMap::new(),
            order: Vec::new(),
        })
    }

    /// Call the provider and fail on RPC errors or error diagnostics
    fn rpc(&mut self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.next_id += 1;
        let request = serde_json::to_string(&RpcRequest::new(self.next_id, method, params))?;
        let response: RpcResponse = serde_json::from_str(&self.provider.handle_request(&request))
            .with_context(|| format!("invalid {} response", method))?;

        if let Some(error) = response.error {
            bail!("{} failed: {} ({})", method, error.message, error.code);
        }
        let result = response.result.unwrap_or(Value::Null);
        let errors = error_summaries(&result);
        if !errors.is_empty() {
            bail!("{}", errors.join("; "));
        }
        Ok(result)
    }

    fn references(&self) -> HashMap<String, Value> {
        self.state
            .resources
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn run_steps(&mut self, case: TestCase) -> anyhow::Result<()> {
        let provider = serde_json::to_value(&case.provider)?;
        self.rpc("ConfigureProvider", json!({ "config": provider }))
            .context("error configuring provider")?;

        let total = case.steps.len();
        for (i, step) in case.steps.into_iter().enumerate() {
            let result = self.run_step(&step);
            let outcome = match (&step.expect_error, result) {
                (None, result) => result,
                (Some(expected), Ok(())) => {
                    Err(anyhow!("expected an error containing {:?}, got none", expected))
                }
                (Some(expected), Err(e)) => {
                    let message = format!("{:#}", e);
                    if message.contains(expected.as_str()) {
                        Ok(())
                    } else {
                        Err(anyhow!("expected an error containing {:?}, got: {}", expected, message))
                    }
                }
            };
            outcome.with_context(|| format!("step {}/{}", i + 1, total))?;
        }
        Ok(())
    }

    fn run_step(&mut self, step: &TestStep) -> anyhow::Result<()> {
        if let Some(config) = &step.config {
            tracing::debug!("applying configuration:\n{}", config);
            self.apply(config)?;
            self.refresh()?;
            self.check_drift(config)?;
        }
        if let Some(import) = &step.import {
            self.import(import)?;
        }
        if let Some(check) = &step.check {
            check(&self.state)?;
        }
        Ok(())
    }

    fn apply(&mut self, config: &Configuration) -> anyhow::Result<()> {
        let declared: Vec<String> = config.blocks.iter().map(Block::address).collect();

        let removed: Vec<String> = self
            .order
            .iter()
            .rev()
            .filter(|address| !declared.contains(address))
            .cloned()
            .collect();
        for address in removed {
            self.destroy(&address)?;
        }
        self.state
            .resources
            .retain(|address, _| declared.contains(address));

        for block in &config.blocks {
            let address = block.address();
            let resolved = block
                .body
                .resolve(&self.references())
                .with_context(|| format!("error evaluating {}", address))?;

            let new_state = match block.kind {
                BlockKind::Data => self.read_data_source(block, resolved),
                BlockKind::Resource => self.apply_resource(block, resolved),
            }
            .with_context(|| format!("error applying {}", address))?;
            self.state.resources.insert(address, new_state);
        }
        Ok(())
    }

    fn read_data_source(&mut self, block: &Block, config: Value) -> anyhow::Result<Value> {
        self.rpc(
            "ValidateDataSourceConfig",
            json!({ "type_name": block.type_name, "config": config }),
        )?;
        let result = self.rpc(
            "ReadDataSource",
            json!({ "type_name": block.type_name, "config": config }),
        )?;
        Ok(result["state"].clone())
    }

    fn plan(&mut self, type_name: &str, prior: &Value, config: &Value) -> anyhow::Result<(Value, Vec<Value>)> {
        let result = self.rpc(
            "PlanResourceChange",
            json!({
                "type_name": type_name,
                "prior_state": prior,
                "proposed_new_state": config,
                "config": config
            }),
        )?;
        let requires_replace = result["requires_replace"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok((result["planned_state"].clone(), requires_replace))
    }

    fn apply_change(&mut self, type_name: &str, prior: &Value, planned: &Value) -> anyhow::Result<Value> {
        let result = self.rpc(
            "ApplyResourceChange",
            json!({
                "type_name": type_name,
                "prior_state": prior,
                "planned_state": planned
            }),
        )?;
        Ok(result["new_state"].clone())
    }

    fn apply_resource(&mut self, block: &Block, config: Value) -> anyhow::Result<Value> {
        let address = block.address();
        let type_name = block.type_name.as_str();
        self.rpc(
            "ValidateResourceConfig",
            json!({ "type_name": type_name, "config": config }),
        )?;

        let prior = self.state.resources.get(&address).cloned().unwrap_or(Value::Null);
        let (planned, requires_replace) = self.plan(type_name, &prior, &config)?;

        let new_state = if prior.is_null() {
            self.apply_change(type_name, &Value::Null, &planned)?
        } else if !requires_replace.is_empty() {
            tracing::info!(address = %address, paths = ?requires_replace, "replacing resource");
            self.apply_change(type_name, &prior, &Value::Null)?;
            let (planned, _) = self.plan(type_name, &Value::Null, &config)?;
            self.apply_change(type_name, &Value::Null, &planned)?
        } else if planned != prior {
            self.apply_change(type_name, &prior, &planned)?
        } else {
            prior
        };

        if new_state.is_null() {
            bail!("provider returned no state for {}", address);
        }
        self.types.insert(address.clone(), type_name.to_string());
        if !self.order.contains(&address) {
            self.order.push(address);
        }
        Ok(new_state)
    }

    fn read_resource(&mut self, address: &str) -> anyhow::Result<Value> {
        let type_name = self
            .types
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow!("{} is not a managed resource", address))?;
        let current = self.state.resources.get(address).cloned().unwrap_or(Value::Null);
        let result = self.rpc(
            "ReadResource",
            json!({ "type_name": type_name, "current_state": current }),
        )?;
        Ok(result["new_state"].clone())
    }

    fn refresh(&mut self) -> anyhow::Result<()> {
        for address in self.order.clone() {
            let state = self
                .read_resource(&address)
                .with_context(|| format!("error refreshing {}", address))?;
            if state.is_null() {
                bail!("{} no longer exists after apply", address);
            }
            self.state.resources.insert(address, state);
        }
        Ok(())
    }

    /// A second plan over refreshed state must be empty
    fn check_drift(&mut self, config: &Configuration) -> anyhow::Result<()> {
        for block in config.blocks.iter().filter(|b| b.kind == BlockKind::Resource) {
            let address = block.address();
            let resolved = block.body.resolve(&self.references())?;
            let current = self.state.resources.get(&address).cloned().unwrap_or(Value::Null);

            let mut drift = Vec::new();
            config_drift("", &resolved, Some(&current), &mut drift);
            if !drift.is_empty() {
                bail!(
                    "After applying this step, the plan was not empty. {} differs in: {}",
                    address,
                    drift.join(", ")
                );
            }

            let (_, requires_replace) = self.plan(&block.type_name, &current, &resolved)?;
            if !requires_replace.is_empty() {
                bail!(
                    "After applying this step, {} would be replaced: {}",
                    address,
                    Value::Array(requires_replace)
                );
            }
        }
        Ok(())
    }

    fn import(&mut self, step: &ImportStep) -> anyhow::Result<()> {
        let type_name = self
            .types
            .get(&step.address)
            .cloned()
            .ok_or_else(|| anyhow!("{} is not a managed resource", step.address))?;
        let existing = self
            .state
            .resources
            .get(&step.address)
            .cloned()
            .unwrap_or(Value::Null);
        let id = match &step.id {
            Some(id) => id.clone(),
            None => existing["id"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{} has no id to import", step.address))?,
        };

        let result = self.rpc(
            "ImportResourceState",
            json!({ "type_name": type_name, "id": id }),
        )?;
        let imported = result["imported_resources"][0]["state"].clone();
        if imported.is_null() {
            bail!("import of {} returned no state", id);
        }
        if !step.verify {
            return Ok(());
        }

        let ignored = |key: &str| {
            key.starts_with("timeouts") || step.ignore.iter().any(|p| key.starts_with(p.as_str()))
        };
        let expected: BTreeMap<String, String> = flatten_state(&existing)
            .into_iter()
            .filter(|(k, _)| !ignored(k))
            .collect();
        let actual: BTreeMap<String, String> = flatten_state(&imported)
            .into_iter()
            .filter(|(k, _)| !ignored(k))
            .collect();

        if expected != actual {
            let keys: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
            let diffs: Vec<String> = keys
                .into_iter()
                .filter(|key| expected.get(*key) != actual.get(*key))
                .map(|key| format!("{}: state {:?}, imported {:?}", key, expected.get(key), actual.get(key)))
                .collect();
            bail!("ImportStateVerify attributes not equivalent:\n{}", diffs.join("\n"));
        }
        Ok(())
    }

    fn destroy(&mut self, address: &str) -> anyhow::Result<()> {
        let Some(prior) = self.state.resources.get(address).cloned() else {
            return Ok(());
        };
        let type_name = self
            .types
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow!("{} is not a managed resource", address))?;

        self.rpc(
            "PlanResourceChange",
            json!({ "type_name": type_name, "prior_state": prior, "proposed_new_state": null }),
        )?;
        self.apply_change(&type_name, &prior, &Value::Null)
            .with_context(|| format!("error destroying {}", address))?;

        self.state.resources.remove(address);
        self.order.retain(|a| a != address);
        Ok(())
    }

    /// Destroy everything in reverse creation order and confirm it is gone
    fn destroy_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        let mut destroyed = Vec::new();
        for address in self.order.clone().into_iter().rev() {
            let prior = self.state.resources.get(&address).cloned();
            match self.destroy(&address) {
                Ok(()) => destroyed.push((address, prior)),
                Err(e) => errors.push(format!("{:#}", e)),
            }
        }

        for (address, prior) in destroyed {
            let Some(prior) = prior else { continue };
            self.state.resources.insert(address.clone(), prior);
            let result = self.read_resource(&address);
            self.state.resources.remove(&address);
            match result {
                Ok(state) if state.is_null() => {}
                Ok(_) => errors.push(format!("{} still exists after destroy", address)),
                Err(e) => errors.push(format!("{:#}", e)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("{}", errors.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acctest::hcl::Body;

    fn drift(configured: Value, actual: Value) -> Vec<String> {
        let mut out = Vec::new();
        config_drift("", &configured, Some(&actual), &mut out);
        out
    }

    #[test]
    fn test_config_drift() {
        assert!(drift(
            json!({"name": "a", "capacity": 8, "db": [{"port": 8635}], "timeouts": {"create": "1m"}}),
            json!({"name": "a", "capacity": 8.0, "db": [{"port": 8635, "user_name": "root"}], "status": "OK"})
        )
        .is_empty());

        let mut paths = drift(
            json!({"name": "a", "db": [{"port": 8635}]}),
            json!({"name": "b", "db": [{"port": 3306}]}),
        );
        paths.sort();
        assert_eq!(paths, vec!["db.0.port", "name"]);
        assert!(drift(json!({"tags": {}, "zones": []}), json!({})).is_empty());
        assert_eq!(drift(json!({"zones": ["a"]}), json!({"zones": []})), vec!["zones"]);
    }

    #[test]
    fn test_error_summaries() {
        let result = json!({"diagnostics": [
            {"severity": "WARNING", "summary": "deprecated"},
            {"severity": "ERROR", "summary": "Error creating VPC", "detail": "quota exceeded"}
        ]});

        assert_eq!(error_summaries(&result), vec!["Error creating VPC: quota exceeded"]);
        assert!(error_summaries(&json!({})).is_empty());
    }

    #[test]
    fn test_unit_case_without_steps() {
        // Configuration needs only a region and keys when the project ID is given
        let case = TestCase {
            provider: ProviderConfig {
                region: Some("eu-west-0".into()),
                access_key: Some("AK".into()),
                secret_key: Some("SK".into()),
                project_id: Some("project".into()),
                ..Default::default()
            },
            unit_test: true,
            ..Default::default()
        };

        assert!(run(case).is_ok());
    }

    #[test]
    fn test_apply_reports_reference_errors() {
        let case = TestCase {
            provider: ProviderConfig {
                region: Some("eu-west-0".into()),
                access_key: Some("AK".into()),
                secret_key: Some("SK".into()),
                project_id: Some("project".into()),
                ..Default::default()
            },
            unit_test: true,
            steps: vec![TestStep::config(Configuration::new().with(Block::resource(
                "flexibleengine_vpc_subnet_v1",
                "subnet",
                Body::new().reference("vpc_id", "flexibleengine_vpc_v1.missing.id"),
            )))
            .expect_error("flexibleengine_vpc_v1.missing")],
            ..Default::default()
        };

        assert!(run(case).is_ok());
    }
}
