//! VPC Tests
//! Create, update, tag, import and destroy VPCs against the fake cloud

mod common;

use common::FakeCloud;
use serde_json::{json, Value};
use terraform_provider_flexibleengine::acctest::{
    self, check_resource_attr, check_resource_attr_pair, check_resource_attr_set, compose, Block,
    Body, Configuration, HclValue, ImportStep, TestCase, TestStep,
};
use terraform_provider_flexibleengine::provider::FlexibleEngineProvider;
use terraform_provider_flexibleengine::schema::{RpcRequest, RpcResponse};

const VPC: &str = "flexibleengine_vpc_v1.vpc_1";

fn vpc_config(name: &str, cidr: &str) -> Configuration {
    Configuration::new().with(Block::resource(
        "flexibleengine_vpc_v1",
        "vpc_1",
        Body::new().attr("name", name).attr("cidr", cidr),
    ))
}

fn vpc_tags_config(name: &str, tags: &[(&str, &str)]) -> Configuration {
    Configuration::new().with(Block::resource(
        "flexibleengine_vpc_v1",
        "vpc_1",
        Body::new()
            .attr("name", name)
            .attr("cidr", "192.168.0.0/16")
            .attr("tags", HclValue::map(tags.iter().copied())),
    ))
}

#[test]
fn test_vpc_basic() {
    let cloud = FakeCloud::start();

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![
            TestStep::config(vpc_config("vpc_basic", "192.168.0.0/16")).check(compose(vec![
                check_resource_attr(VPC, "name", "vpc_basic"),
                check_resource_attr(VPC, "cidr", "192.168.0.0/16"),
                check_resource_attr(VPC, "status", "OK"),
                check_resource_attr(VPC, "tags.%", "0"),
                check_resource_attr_set(VPC, "id"),
            ])),
            TestStep::import(ImportStep::new(VPC).verify()),
            TestStep::config(vpc_config("vpc_updated", "192.168.0.0/16"))
                .check(check_resource_attr(VPC, "name", "vpc_updated")),
        ],
        ..Default::default()
    });

    let requests = cloud.requests();
    assert!(requests.iter().any(|r| r.starts_with("POST /v1/proj-1/vpcs")));
    assert!(requests.iter().any(|r| r.starts_with("PUT /v1/proj-1/vpcs/")));
    assert!(requests.iter().any(|r| r.starts_with("DELETE /v1/proj-1/vpcs/")));
    assert_eq!(cloud.count("vpc"), 0);
}

#[test]
fn test_vpc_tags() {
    let cloud = FakeCloud::start();

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![
            TestStep::config(vpc_tags_config("vpc_tags", &[("foo", "bar"), ("key", "value")]))
                .check(compose(vec![
                    check_resource_attr(VPC, "tags.%", "2"),
                    check_resource_attr(VPC, "tags.foo", "bar"),
                    check_resource_attr(VPC, "tags.key", "value"),
                ])),
            TestStep::config(vpc_tags_config("vpc_tags", &[("foo", "bar2"), ("owner", "ops")]))
                .check(compose(vec![
                    check_resource_attr(VPC, "tags.%", "2"),
                    check_resource_attr(VPC, "tags.foo", "bar2"),
                    check_resource_attr(VPC, "tags.owner", "ops"),
                    acctest::check_no_resource_attr(VPC, "tags.key"),
                ])),
        ],
        ..Default::default()
    });

    let deletes: Vec<Value> = cloud
        .request_bodies("POST", "/v2.0/proj-1/vpcs/vpc-0001/tags/action")
        .into_iter()
        .filter(|b| b["action"] == "delete")
        .collect();
    assert_eq!(deletes.len(), 1);
    let removed: Vec<&str> = deletes[0]["tags"]
        .as_array()
        .map(|tags| tags.iter().filter_map(|t| t["key"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(removed, vec!["foo", "key"]);
}

#[test]
fn test_vpc_cidr_change_updates_in_place() {
    let cloud = FakeCloud::start();

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![
            TestStep::config(vpc_config("vpc_cidr", "192.168.0.0/16")),
            TestStep::config(vpc_config("vpc_cidr", "172.16.0.0/16"))
                .check(check_resource_attr(VPC, "cidr", "172.16.0.0/16")),
        ],
        ..Default::default()
    });

    let creates = cloud
        .requests()
        .into_iter()
        .filter(|r| r == "POST /v1/proj-1/vpcs")
        .count();
    assert_eq!(creates, 1);
}

#[test]
fn test_vpc_data_source() {
    let cloud = FakeCloud::start();
    cloud.add_vpc("other", "10.0.0.0/8");

    let config = vpc_config("vpc_lookup", "192.168.0.0/16").with(Block::data(
        "flexibleengine_vpc_v1",
        "by_name",
        Body::new().reference("name", "flexibleengine_vpc_v1.vpc_1.name"),
    ));
    let data = "data.flexibleengine_vpc_v1.by_name";

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![TestStep::config(config).check(compose(vec![
            check_resource_attr_pair(data, "id", VPC, "id"),
            check_resource_attr(data, "name", "vpc_lookup"),
            check_resource_attr(data, "cidr", "192.168.0.0/16"),
            check_resource_attr(data, "status", "OK"),
        ]))],
        ..Default::default()
    });

    assert_eq!(cloud.count("vpc"), 1);
}

#[test]
fn test_vpc_data_source_no_match() {
    let cloud = FakeCloud::start();
    cloud.add_vpc("web", "10.0.0.0/8");

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![TestStep::config(Configuration::new().with(Block::data(
            "flexibleengine_vpc_v1",
            "missing",
            Body::new().attr("name", "does-not-exist"),
        )))
        .expect_error("Your query returned no VPCs")],
        ..Default::default()
    });
}

#[test]
fn test_vpc_data_source_ambiguous() {
    let cloud = FakeCloud::start();
    cloud.add_vpc("web", "10.0.0.0/8");
    cloud.add_vpc("web", "172.16.0.0/16");

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![TestStep::config(Configuration::new().with(Block::data(
            "flexibleengine_vpc_v1",
            "web",
            Body::new().attr("name", "web"),
        )))
        .expect_error("Your query returned 2 VPCs")],
        ..Default::default()
    });
}

fn rpc(provider: &FlexibleEngineProvider, id: i64, method: &str, params: Value) -> Value {
    let request = serde_json::to_string(&RpcRequest::new(id, method, params)).unwrap();
    let response: RpcResponse = serde_json::from_str(&provider.handle_request(&request)).unwrap();
    assert!(response.error.is_none(), "{} failed", method);
    response.result.unwrap()
}

#[test]
fn test_vpc_removed_outside_terraform() {
    let cloud = FakeCloud::start();
    let provider = FlexibleEngineProvider::new().unwrap();
    let config = serde_json::to_value(cloud.provider_config()).unwrap();
    rpc(&provider, 1, "ConfigureProvider", json!({ "config": config }));

    let planned = rpc(
        &provider,
        2,
        "PlanResourceChange",
        json!({
            "type_name": "flexibleengine_vpc_v1",
            "prior_state": null,
            "proposed_new_state": {"name": "gone", "cidr": "192.168.0.0/16"}
        }),
    )["planned_state"]
        .clone();
    let created = rpc(
        &provider,
        3,
        "ApplyResourceChange",
        json!({"type_name": "flexibleengine_vpc_v1", "prior_state": null, "planned_state": planned}),
    )["new_state"]
        .clone();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(cloud.object("vpc", &id).is_some());

    cloud.delete_vpc(&id);

    let result = rpc(
        &provider,
        4,
        "ReadResource",
        json!({"type_name": "flexibleengine_vpc_v1", "current_state": created}),
    );
    assert_eq!(result["new_state"], Value::Null);
    assert!(result["diagnostics"].as_array().map_or(true, |d| d.is_empty()));

    // Deleting what is already gone succeeds
    let result = rpc(
        &provider,
        5,
        "ApplyResourceChange",
        json!({"type_name": "flexibleengine_vpc_v1", "prior_state": created, "planned_state": null}),
    );
    assert!(result["diagnostics"].as_array().map_or(true, |d| d.is_empty()));
}
