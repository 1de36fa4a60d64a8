// Stateful fake of the FlexibleEngine APIs used by the provider, served by
// wiremock. Objects are created directly in their terminal state so waits
// finish on the first poll.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use terraform_provider_flexibleengine::config::ProviderConfig;
use tokio::runtime::Runtime;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PROJECT_ID: &str = "proj-1";
pub const REGION: &str = "eu-west-0";
pub const SERVICES: &[&str] = &["iam", "vpc", "networking", "nat", "rds", "dcs", "swr"];

// ── Cloud state ─────────────────────────────────────────────────────

#[derive(Default)]
struct Cloud {
    next_id: u64,
    vpcs: BTreeMap<String, Value>,
    vpc_tags: HashMap<String, BTreeMap<String, String>>,
    subnets: BTreeMap<String, Value>,
    groups: BTreeMap<String, Value>,
    rules: BTreeMap<String, Value>,
    nat_gateways: BTreeMap<String, Value>,
    rds_instances: BTreeMap<String, Value>,
    dcs_instances: BTreeMap<String, Value>,
    dcs_passwords: HashMap<String, String>,
    dcs_backups: BTreeMap<String, Vec<Value>>,
    organizations: BTreeMap<String, Value>,
    repositories: BTreeMap<(String, String), Value>,
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn no_content() -> ResponseTemplate {
    ResponseTemplate::new(204)
}

fn not_found(what: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "error_code": "APIGW.0101",
        "error_msg": format!("{} not found", what)
    }))
}

fn bad_request(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error_code": "DCS.4000",
        "error_msg": message
    }))
}

/// Copy the non-null fields of `patch` onto `target`
fn merge(target: &mut Value, patch: &Value, keys: &[&str]) {
    for key in keys {
        if let Some(v) = patch.get(*key).filter(|v| !v.is_null()) {
            target[*key] = v.clone();
        }
    }
}

fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn default_port(engine: &str) -> i64 {
    match engine {
        "MySQL" => 3306,
        "PostgreSQL" => 5432,
        "SQLServer" => 1433,
        "Memcached" => 11211,
        _ => 6379,
    }
}

fn rds_flavors(database: &str) -> Vec<Value> {
    let code = match database {
        "PostgreSQL" => "pg",
        "MySQL" => "mysql",
        _ => return Vec::new(),
    };
    let zones = json!({"eu-west-0a": "normal", "eu-west-0b": "normal", "eu-west-0c": "unsupported"});
    vec![
        json!({"vcpus": "2", "ram": 8, "spec_code": format!("rds.{}.s3.large.4", code), "instance_mode": "single", "az_status": zones}),
        json!({"vcpus": "2", "ram": 8, "spec_code": format!("rds.{}.s3.large.4.ha", code), "instance_mode": "ha", "az_status": zones}),
        json!({"vcpus": "4", "ram": 16, "spec_code": format!("rds.{}.s3.xlarge.4.ha", code), "instance_mode": "ha", "az_status": zones}),
    ]
}

impl Cloud {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn group_with_rules(&self, id: &str) -> Option<Value> {
        let mut group = self.groups.get(id)?.clone();
        let rules: Vec<Value> = self
            .rules
            .values()
            .filter(|r| r["security_group_id"] == id)
            .cloned()
            .collect();
        group["security_group_rules"] = Value::Array(rules);
        Some(group)
    }

    fn handle(&mut self, method: &str, segments: &[&str], query: &HashMap<String, String>, body: &Value) -> ResponseTemplate {
        match (method, segments) {
            // ── IAM ──
            ("GET", ["v3", "projects"]) => {
                let name = query.get("name").cloned().unwrap_or_else(|| REGION.to_string());
                ok(json!({"projects": [{"id": PROJECT_ID, "name": name, "enabled": true}]}))
            }

            // ── VPC ──
            ("POST", ["v1", _, "vpcs"]) => {
                let id = self.new_id("vpc");
                let opts = &body["vpc"];
                let vpc = json!({
                    "id": id,
                    "name": str_or(opts, "name", ""),
                    "cidr": str_or(opts, "cidr", ""),
                    "description": str_or(opts, "description", ""),
                    "status": "OK"
                });
                self.vpcs.insert(id, vpc.clone());
                ok(json!({ "vpc": vpc }))
            }
            ("GET", ["v1", _, "vpcs"]) => {
                let vpcs: Vec<&Value> = self.vpcs.values().collect();
                ok(json!({ "vpcs": vpcs }))
            }
            ("GET", ["v1", _, "vpcs", id]) => match self.vpcs.get(*id) {
                Some(vpc) => ok(json!({ "vpc": vpc })),
                None => not_found("VPC"),
            },
            ("PUT", ["v1", _, "vpcs", id]) => match self.vpcs.get_mut(*id) {
                Some(vpc) => {
                    merge(vpc, &body["vpc"], &["name", "cidr", "description"]);
                    ok(json!({ "vpc": vpc }))
                }
                None => not_found("VPC"),
            },
            ("DELETE", ["v1", _, "vpcs", id]) => {
                if self.subnets.values().any(|s| s["vpc_id"] == *id) {
                    return bad_request("VPC still has subnets");
                }
                self.vpc_tags.remove(*id);
                match self.vpcs.remove(*id) {
                    Some(_) => no_content(),
                    None => not_found("VPC"),
                }
            }
            ("GET", ["v2.0", _, "vpcs", id, "tags"]) => {
                let tags: Vec<Value> = self
                    .vpc_tags
                    .get(*id)
                    .map(|tags| tags.iter().map(|(k, v)| json!({"key": k, "value": v})).collect())
                    .unwrap_or_default();
                ok(json!({ "tags": tags }))
            }
            ("POST", ["v2.0", _, "vpcs", id, "tags", "action"]) => {
                let tags = self.vpc_tags.entry(id.to_string()).or_default();
                let action = str_or(body, "action", "");
                for tag in body["tags"].as_array().cloned().unwrap_or_default() {
                    let key = str_or(&tag, "key", "").to_string();
                    if action == "delete" {
                        tags.remove(&key);
                    } else {
                        tags.insert(key, str_or(&tag, "value", "").to_string());
                    }
                }
                no_content()
            }

            // ── Subnets ──
            ("POST", ["v1", _, "subnets"]) => {
                let opts = &body["subnet"];
                let vpc_id = str_or(opts, "vpc_id", "");
                if !self.vpcs.contains_key(vpc_id) {
                    return not_found("VPC");
                }
                let id = self.new_id("subnet");
                let mut subnet = opts.clone();
                subnet["id"] = json!(id);
                subnet["status"] = json!("ACTIVE");
                subnet["neutron_subnet_id"] = json!(format!("neutron-{}", id));
                subnet["neutron_network_id"] = json!(id);
                self.subnets.insert(id, subnet.clone());
                ok(json!({ "subnet": subnet }))
            }
            ("GET", ["v1", _, "subnets"]) => {
                let subnets: Vec<&Value> = self
                    .subnets
                    .values()
                    .filter(|s| query.get("vpc_id").map_or(true, |v| s["vpc_id"] == v.as_str()))
                    .collect();
                ok(json!({ "subnets": subnets }))
            }
            ("GET", ["v1", _, "subnets", id]) => match self.subnets.get(*id) {
                Some(subnet) => ok(json!({ "subnet": subnet })),
                None => not_found("subnet"),
            },
            ("PUT", ["v1", _, "vpcs", _, "subnets", id]) => match self.subnets.get_mut(*id) {
                Some(subnet) => {
                    merge(
                        subnet,
                        &body["subnet"],
                        &["name", "description", "dhcp_enable", "primary_dns", "secondary_dns"],
                    );
                    ok(json!({"subnet": {"id": id, "status": "ACTIVE"}}))
                }
                None => not_found("subnet"),
            },
            ("DELETE", ["v1", _, "vpcs", _, "subnets", id]) => match self.subnets.remove(*id) {
                Some(_) => no_content(),
                None => not_found("subnet"),
            },

            // ── Security groups ──
            ("POST", ["v2.0", "security-groups"]) => {
                let opts = &body["security_group"];
                let id = self.new_id("sg");
                self.groups.insert(
                    id.clone(),
                    json!({
                        "id": id,
                        "name": str_or(opts, "name", ""),
                        "description": str_or(opts, "description", ""),
                        "tenant_id": PROJECT_ID
                    }),
                );
                for ethertype in ["IPv4", "IPv6"] {
                    let rule_id = self.new_id("rule");
                    self.rules.insert(
                        rule_id.clone(),
                        json!({
                            "id": rule_id,
                            "direction": "egress",
                            "ethertype": ethertype,
                            "security_group_id": id,
                            "tenant_id": PROJECT_ID
                        }),
                    );
                }
                let group = self.group_with_rules(&id).unwrap_or(Value::Null);
                ok(json!({ "security_group": group }))
            }
            ("GET", ["v2.0", "security-groups", id]) => match self.group_with_rules(id) {
                Some(group) => ok(json!({ "security_group": group })),
                None => not_found("security group"),
            },
            ("PUT", ["v2.0", "security-groups", id]) => {
                match self.groups.get_mut(*id) {
                    Some(group) => merge(group, &body["security_group"], &["name", "description"]),
                    None => return not_found("security group"),
                }
                ok(json!({ "security_group": self.group_with_rules(id) }))
            }
            ("DELETE", ["v2.0", "security-groups", id]) => match self.groups.remove(*id) {
                Some(_) => {
                    self.rules.retain(|_, r| r["security_group_id"] != *id);
                    no_content()
                }
                None => not_found("security group"),
            },
            ("POST", ["v2.0", "security-group-rules"]) => {
                let mut rule = body["security_group_rule"].clone();
                if !self.groups.contains_key(str_or(&rule, "security_group_id", "")) {
                    return not_found("security group");
                }
                let id = self.new_id("rule");
                rule["id"] = json!(id);
                rule["tenant_id"] = json!(PROJECT_ID);
                self.rules.insert(id, rule.clone());
                ok(json!({ "security_group_rule": rule }))
            }
            ("GET", ["v2.0", "security-group-rules", id]) => match self.rules.get(*id) {
                Some(rule) => ok(json!({ "security_group_rule": rule })),
                None => not_found("security group rule"),
            },
            ("DELETE", ["v2.0", "security-group-rules", id]) => match self.rules.remove(*id) {
                Some(_) => no_content(),
                None => not_found("security group rule"),
            },

            // ── NAT ──
            ("POST", ["v2.0", "nat_gateways"]) => {
                let opts = &body["nat_gateway"];
                let id = self.new_id("nat");
                let gateway = json!({
                    "id": id,
                    "name": str_or(opts, "name", ""),
                    "description": str_or(opts, "description", ""),
                    "spec": str_or(opts, "spec", "1"),
                    "router_id": str_or(opts, "router_id", ""),
                    "internal_network_id": str_or(opts, "internal_network_id", ""),
                    "status": "ACTIVE",
                    "admin_state_up": true,
                    "tenant_id": PROJECT_ID
                });
                self.nat_gateways.insert(id, gateway.clone());
                ok(json!({ "nat_gateway": gateway }))
            }
            ("GET", ["v2.0", "nat_gateways", id]) => match self.nat_gateways.get(*id) {
                Some(gateway) => ok(json!({ "nat_gateway": gateway })),
                None => not_found("NAT gateway"),
            },
            ("PUT", ["v2.0", "nat_gateways", id]) => match self.nat_gateways.get_mut(*id) {
                Some(gateway) => {
                    merge(gateway, &body["nat_gateway"], &["name", "description", "spec"]);
                    ok(json!({ "nat_gateway": gateway }))
                }
                None => not_found("NAT gateway"),
            },
            ("DELETE", ["v2.0", "nat_gateways", id]) => match self.nat_gateways.remove(*id) {
                Some(_) => no_content(),
                None => not_found("NAT gateway"),
            },

            // ── RDS ──
            ("GET", ["v3", _, "flavors", database]) => ok(json!({ "flavors": rds_flavors(database) })),
            ("POST", ["v3", _, "instances"]) => self.create_rds_instance(body),
            ("GET", ["v3", _, "instances"]) => {
                let instances: Vec<&Value> = self
                    .rds_instances
                    .values()
                    .filter(|i| query.get("id").map_or(true, |id| i["id"] == id.as_str()))
                    .filter(|i| query.get("name").map_or(true, |n| i["name"] == n.as_str()))
                    .collect();
                ok(json!({ "instances": instances, "total_count": instances.len() }))
            }
            ("DELETE", ["v3", _, "instances", id]) => match self.rds_instances.remove(*id) {
                Some(_) => ResponseTemplate::new(202).set_body_json(json!({"job_id": "job-delete"})),
                None => not_found("RDS instance"),
            },
            ("PUT", ["v3", _, "instances", id, "name"]) => match self.rds_instances.get_mut(*id) {
                Some(instance) => {
                    merge(instance, body, &["name"]);
                    ok(json!({}))
                }
                None => not_found("RDS instance"),
            },
            ("POST", ["v3", _, "instances", id, "action"]) => match self.rds_instances.get_mut(*id) {
                Some(instance) => {
                    if let Some(spec_code) = body["resize_flavor"].get("spec_code") {
                        instance["flavor_ref"] = spec_code.clone();
                    }
                    if let Some(size) = body["enlarge_volume"].get("size") {
                        instance["volume"]["size"] = size.clone();
                    }
                    ResponseTemplate::new(202).set_body_json(json!({"job_id": "job-action"}))
                }
                None => not_found("RDS instance"),
            },
            ("PUT", ["v3", _, "instances", id, "backups", "policy"]) => match self.rds_instances.get_mut(*id) {
                Some(instance) => {
                    instance["backup_strategy"] = body["backup_policy"].clone();
                    ok(json!({}))
                }
                None => not_found("RDS instance"),
            },

            // ── DCS ──
            ("POST", ["v2", _, "instances"]) => self.create_dcs_instance(body),
            ("GET", ["v2", _, "instances", id]) => match self.dcs_instances.get(*id) {
                Some(instance) => ok(instance.clone()),
                None => not_found("DCS instance"),
            },
            ("PUT", ["v2", _, "instances", id]) => match self.dcs_instances.get_mut(*id) {
                Some(instance) => {
                    merge(instance, body, &["name", "description", "security_group_id"]);
                    if let Some(policy) = body.get("instance_backup_policy").filter(|p| !p.is_null()) {
                        instance["instance_backup_policy"] = json!({ "policy": policy });
                    }
                    no_content()
                }
                None => not_found("DCS instance"),
            },
            ("POST", ["v2", _, "instances", id, "resize"]) => match self.dcs_instances.get_mut(*id) {
                Some(instance) => {
                    instance["spec_code"] = body["spec_code"].clone();
                    instance["capacity"] = body["new_capacity"].clone();
                    let capacity = body["new_capacity"].as_f64().unwrap_or_default();
                    instance["max_memory"] = json!((capacity * 1024.0) as i64);
                    no_content()
                }
                None => not_found("DCS instance"),
            },
            ("PUT", ["v2", _, "instances", id, "password"]) => {
                if !self.dcs_instances.contains_key(*id) {
                    return not_found("DCS instance");
                }
                let old = str_or(body, "old_password", "");
                if self.dcs_passwords.get(*id).map_or(false, |p| p != old) {
                    return bad_request("old password is incorrect");
                }
                self.dcs_passwords
                    .insert(id.to_string(), str_or(body, "new_password", "").to_string());
                ok(json!({"result": "Success"}))
            }
            ("DELETE", ["v2", _, "instances", id]) => {
                self.dcs_backups.remove(*id);
                self.dcs_passwords.remove(*id);
                match self.dcs_instances.remove(*id) {
                    Some(_) => no_content(),
                    None => not_found("DCS instance"),
                }
            }
            ("POST", ["v2", _, "instances", id, "backups"]) => {
                if !self.dcs_instances.contains_key(*id) {
                    return not_found("DCS instance");
                }
                let backup_id = self.new_id("bk");
                let backup = json!({
                    "backup_id": backup_id,
                    "backup_name": format!("backup_{}", backup_id),
                    "instance_id": id,
                    "status": "succeed",
                    "backup_format": str_or(body, "backup_format", "rdb"),
                    "remark": str_or(body, "remark", ""),
                    "size": 1024,
                    "backup_type": "manual",
                    "created_at": "2026-01-01T00:00:00.000Z",
                    "updated_at": "2026-01-01T00:00:10.000Z"
                });
                self.dcs_backups.entry(id.to_string()).or_default().push(backup);
                ok(json!({ "backup_id": backup_id }))
            }
            ("GET", ["v2", _, "instances", id, "backups"]) => {
                if !self.dcs_instances.contains_key(*id) {
                    return not_found("DCS instance");
                }
                let backups = self.dcs_backups.get(*id).cloned().unwrap_or_default();
                // Offsets count from 1
                let offset = query.get("offset").and_then(|o| o.parse::<usize>().ok()).unwrap_or(1).max(1);
                let limit = query.get("limit").and_then(|l| l.parse::<usize>().ok()).unwrap_or(10);
                let page: Vec<Value> = backups.iter().skip(offset - 1).take(limit).cloned().collect();
                ok(json!({ "total_num": backups.len(), "backup_record_response": page }))
            }
            ("DELETE", ["v2", _, "instances", id, "backups", backup_id]) => {
                let Some(backups) = self.dcs_backups.get_mut(*id) else {
                    return not_found("DCS backup");
                };
                let before = backups.len();
                backups.retain(|b| b["backup_id"] != *backup_id);
                if backups.len() == before {
                    not_found("DCS backup")
                } else {
                    no_content()
                }
            }

            // ── SWR ──
            ("POST", ["v2", "manage", "namespaces"]) => {
                let name = str_or(body, "namespace", "").to_string();
                if self.organizations.contains_key(&name) {
                    return ResponseTemplate::new(409).set_body_json(json!({"errorCode": "SVCSTG.SWR.4091001", "errorMessage": "namespace already exists"}));
                }
                self.next_id += 1;
                let org = json!({"id": self.next_id, "name": name, "creator_name": "tf-user", "auth": 7});
                self.organizations.insert(name, org);
                ResponseTemplate::new(201)
            }
            ("GET", ["v2", "manage", "namespaces", name]) => match self.organizations.get(*name) {
                Some(org) => ok(org.clone()),
                None => not_found("organization"),
            },
            ("DELETE", ["v2", "manage", "namespaces", name]) => {
                self.repositories.retain(|(org, _), _| org.as_str() != *name);
                match self.organizations.remove(*name) {
                    Some(_) => no_content(),
                    None => not_found("organization"),
                }
            }
            ("POST", ["v2", "manage", "namespaces", org, "repos"]) => {
                if !self.organizations.contains_key(*org) {
                    return not_found("organization");
                }
                let name = str_or(body, "repository", "").to_string();
                self.next_id += 1;
                let repo = json!({
                    "id": self.next_id,
                    "name": name,
                    "category": str_or(body, "category", "other"),
                    "description": str_or(body, "description", ""),
                    "is_public": body["is_public"].as_bool().unwrap_or(false),
                    "path": format!("swr.{}.example.com/{}/{}", REGION, org, name),
                    "internal_path": format!("swr.{}.internal/{}/{}", REGION, org, name),
                    "num_images": 0,
                    "size": 0
                });
                self.repositories.insert((org.to_string(), name), repo);
                ResponseTemplate::new(201)
            }
            ("GET", ["v2", "manage", "namespaces", org, "repos", name]) => {
                match self.repositories.get(&(org.to_string(), name.to_string())) {
                    Some(repo) => ok(repo.clone()),
                    None => not_found("repository"),
                }
            }
            ("PATCH", ["v2", "manage", "namespaces", org, "repos", name]) => {
                match self.repositories.get_mut(&(org.to_string(), name.to_string())) {
                    Some(repo) => {
                        merge(repo, body, &["is_public", "category", "description"]);
                        ResponseTemplate::new(201)
                    }
                    None => not_found("repository"),
                }
            }
            ("DELETE", ["v2", "manage", "namespaces", org, "repos", name]) => {
                match self.repositories.remove(&(org.to_string(), name.to_string())) {
                    Some(_) => no_content(),
                    None => not_found("repository"),
                }
            }

            _ => not_found("route"),
        }
    }

    fn create_rds_instance(&mut self, body: &Value) -> ResponseTemplate {
        let id = self.new_id("rds");
        let db_type = str_or(&body["datastore"], "type", "MySQL").to_string();
        let port = body["port"]
            .as_str()
            .and_then(|p| p.parse::<i64>().ok())
            .unwrap_or_else(|| default_port(&db_type));
        let zones: Vec<&str> = str_or(body, "availability_zone", "").split(',').collect();
        let ha = body.get("ha").filter(|h| !h.is_null());

        let mut nodes = vec![json!({
            "id": format!("{}-node-1", id), "name": "node-1", "role": "master",
            "status": "ACTIVE", "availability_zone": zones[0]
        })];
        if ha.is_some() {
            let standby_zone = zones.get(1).copied().unwrap_or(zones[0]);
            nodes.push(json!({
                "id": format!("{}-node-2", id), "name": "node-2", "role": "slave",
                "status": "ACTIVE", "availability_zone": standby_zone
            }));
        }

        let backup_strategy = body
            .get("backup_strategy")
            .filter(|b| !b.is_null())
            .cloned()
            .unwrap_or_else(|| json!({"start_time": "00:00-01:00", "keep_days": 7}));

        let instance = json!({
            "id": id,
            "name": str_or(body, "name", ""),
            "status": "ACTIVE",
            "port": port,
            "type": if ha.is_some() { "Ha" } else { "Single" },
            "region": str_or(body, "region", REGION),
            "datastore": body["datastore"],
            "volume": body["volume"],
            "flavor_ref": str_or(body, "flavor_ref", ""),
            "vpc_id": str_or(body, "vpc_id", ""),
            "subnet_id": str_or(body, "subnet_id", ""),
            "security_group_id": str_or(body, "security_group_id", ""),
            "private_ips": ["192.168.0.21"],
            "public_ips": [],
            "backup_strategy": backup_strategy,
            "db_user_name": "root",
            "created": "2026-01-01T00:00:00+0000",
            "nodes": nodes,
            "ha": ha.map(|h| json!({"replication_mode": h["replication_mode"]})),
            "configuration_id": body.get("configuration_id").and_then(Value::as_str).unwrap_or("cfg-default")
        });
        self.rds_instances.insert(id.clone(), instance);

        ResponseTemplate::new(202).set_body_json(json!({
            "instance": {"id": id, "name": str_or(body, "name", ""), "status": "BUILD"},
            "job_id": format!("job-{}", id)
        }))
    }

    fn create_dcs_instance(&mut self, body: &Value) -> ResponseTemplate {
        let id = self.new_id("dcs");
        let engine = str_or(body, "engine", "Redis").to_string();
        let capacity = body["capacity"].as_f64().unwrap_or(1.0);

        let mut instance = json!({
            "instance_id": id,
            "name": str_or(body, "name", ""),
            "engine": engine,
            "engine_version": str_or(body, "engine_version", ""),
            "capacity": body["capacity"],
            "spec_code": str_or(body, "spec_code", ""),
            "status": "RUNNING",
            "port": body["port"].as_i64().unwrap_or_else(|| default_port(&engine)),
            "ip": "192.168.0.100",
            "domain_name": format!("{}.dcs.{}.example.com", id, REGION),
            "vpc_id": str_or(body, "vpc_id", ""),
            "subnet_id": str_or(body, "subnet_id", ""),
            "security_group_id": str_or(body, "security_group_id", ""),
            "available_zones": body["available_zones"],
            "description": str_or(body, "description", ""),
            "max_memory": (capacity * 1024.0) as i64,
            "used_memory": 2
        });
        if let Some(policy) = body.get("instance_backup_policy").filter(|p| !p.is_null()) {
            instance["instance_backup_policy"] = json!({ "policy": policy });
        }
        if let Some(password) = body["password"].as_str() {
            self.dcs_passwords.insert(id.clone(), password.to_string());
        }
        self.dcs_instances.insert(id.clone(), instance);

        ok(json!({"instances": [{"instance_id": id, "instance_name": str_or(body, "name", "")}]}))
    }
}

// ── Responder ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Handler {
    cloud: Arc<Mutex<Cloud>>,
}

impl Respond for Handler {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.to_string();
        let path = request.url.path().to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let query: HashMap<String, String> = request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        let mut cloud = self.cloud.lock().unwrap();
        cloud.handle(method.as_str(), &segments, &query, &body)
    }
}

// ── Fake cloud ──────────────────────────────────────────────────────

/// A running fake cloud. Keeps its own runtime because the provider blocks
/// on a runtime of its own.
pub struct FakeCloud {
    server: MockServer,
    handler: Handler,
    runtime: Runtime,
}

impl FakeCloud {
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let handler = Handler::default();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            Mock::given(any())
                .respond_with(handler.clone())
                .mount(&server)
                .await;
            server
        });
        Self {
            server,
            handler,
            runtime,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Provider block pointing every service at the fake
    pub fn provider_config(&self) -> ProviderConfig {
        let endpoints: HashMap<String, String> = SERVICES
            .iter()
            .map(|s| (s.to_string(), self.uri()))
            .collect();
        ProviderConfig {
            region: Some(REGION.to_string()),
            access_key: Some("test-ak".to_string()),
            secret_key: Some("test-sk".to_string()),
            project_id: Some(PROJECT_ID.to_string()),
            endpoints: Some(endpoints),
            ..Default::default()
        }
    }

    /// `METHOD /path` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }

    /// Bodies of requests matching `METHOD /path`
    pub fn request_bodies(&self, method: &str, path: &str) -> Vec<Value> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.to_string() == method && r.url.path() == path)
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Number of live objects of a kind
    pub fn count(&self, kind: &str) -> usize {
        let cloud = self.handler.cloud.lock().unwrap();
        match kind {
            "vpc" => cloud.vpcs.len(),
            "subnet" => cloud.subnets.len(),
            "security_group" => cloud.groups.len(),
            "security_group_rule" => cloud.rules.len(),
            "nat_gateway" => cloud.nat_gateways.len(),
            "rds_instance" => cloud.rds_instances.len(),
            "dcs_instance" => cloud.dcs_instances.len(),
            "dcs_backup" => cloud.dcs_backups.values().map(Vec::len).sum(),
            "organization" => cloud.organizations.len(),
            "repository" => cloud.repositories.len(),
            other => panic!("unknown kind {}", other),
        }
    }

    /// Remove a VPC behind the provider's back
    pub fn delete_vpc(&self, id: &str) {
        let mut cloud = self.handler.cloud.lock().unwrap();
        cloud.vpcs.remove(id);
        cloud.vpc_tags.remove(id);
    }

    /// Seed a VPC directly
    pub fn add_vpc(&self, name: &str, cidr: &str) -> String {
        let mut cloud = self.handler.cloud.lock().unwrap();
        let id = cloud.new_id("vpc");
        let vpc = json!({"id": id, "name": name, "cidr": cidr, "description": "", "status": "OK"});
        cloud.vpcs.insert(id.clone(), vpc);
        id
    }

    /// Current raw object of a kind, by ID
    pub fn object(&self, kind: &str, id: &str) -> Option<Value> {
        let cloud = self.handler.cloud.lock().unwrap();
        let map: &BTreeMap<String, Value> = match kind {
            "vpc" => &cloud.vpcs,
            "subnet" => &cloud.subnets,
            "nat_gateway" => &cloud.nat_gateways,
            "rds_instance" => &cloud.rds_instances,
            "dcs_instance" => &cloud.dcs_instances,
            other => panic!("unknown kind {}", other),
        };
        map.get(id).cloned()
    }
}
