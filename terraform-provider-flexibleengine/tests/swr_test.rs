//! SWR Tests
//! Organizations and image repositories

mod common;

use common::FakeCloud;
use terraform_provider_flexibleengine::acctest::{
    self, check_resource_attr, check_resource_attr_pair, check_resource_attr_set, compose, Block,
    Body, Configuration, ImportStep, TestCase, TestStep,
};

const ORG: &str = "flexibleengine_swr_organization.test";
const REPO: &str = "flexibleengine_swr_repository.test";

fn organization_block(name: &str) -> Block {
    Block::resource(
        "flexibleengine_swr_organization",
        "test",
        Body::new().attr("name", name),
    )
}

fn repository_config(org: &str, is_public: bool, description: &str) -> Configuration {
    Configuration::new()
        .with(organization_block(org))
        .with(Block::resource(
            "flexibleengine_swr_repository",
            "test",
            Body::new()
                .reference("organization", "flexibleengine_swr_organization.test.name")
                .attr("name", "repo-test")
                .attr("is_public", is_public)
                .attr("description", description),
        ))
}

#[test]
fn test_swr_organization_basic() {
    let cloud = FakeCloud::start();

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![
            TestStep::config(Configuration::new().with(organization_block("tf-acc-org"))).check(
                compose(vec![
                    check_resource_attr(ORG, "id", "tf-acc-org"),
                    check_resource_attr(ORG, "name", "tf-acc-org"),
                    check_resource_attr(ORG, "creator", "tf-user"),
                    check_resource_attr(ORG, "permission", "Manage"),
                    check_resource_attr(
                        ORG,
                        "login_server",
                        "swr.eu-west-0.prod-cloud-ocb.orange-business.com",
                    ),
                ]),
            ),
            TestStep::import(ImportStep::new(ORG).verify()),
            // Renaming an organization replaces it
            TestStep::config(Configuration::new().with(organization_block("tf-acc-org2")))
                .check(check_resource_attr(ORG, "id", "tf-acc-org2")),
        ],
        ..Default::default()
    });

    let deletes: Vec<String> = cloud
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("DELETE /v2/manage/namespaces/"))
        .collect();
    assert_eq!(
        deletes,
        vec![
            "DELETE /v2/manage/namespaces/tf-acc-org",
            "DELETE /v2/manage/namespaces/tf-acc-org2"
        ]
    );
    assert_eq!(cloud.count("organization"), 0);
}

#[test]
fn test_swr_repository_basic() {
    let cloud = FakeCloud::start();

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![
            TestStep::config(repository_config("tf-acc-repo", false, "Test repository"))
                .check(compose(vec![
                    check_resource_attr(REPO, "id", "tf-acc-repo/repo-test"),
                    check_resource_attr_pair(REPO, "organization", ORG, "name"),
                    check_resource_attr(REPO, "name", "repo-test"),
                    check_resource_attr(REPO, "is_public", "false"),
                    check_resource_attr(REPO, "category", "linux"),
                    check_resource_attr(REPO, "description", "Test repository"),
                    check_resource_attr(REPO, "num_images", "0"),
                    check_resource_attr_set(REPO, "path"),
                    check_resource_attr_set(REPO, "internal_path"),
                ])),
            TestStep::import(ImportStep::new(REPO).with_id("tf-acc-repo/repo-test").verify()),
            TestStep::config(repository_config("tf-acc-repo", true, "Updated repository"))
                .check(compose(vec![
                    check_resource_attr(REPO, "is_public", "true"),
                    check_resource_attr(REPO, "description", "Updated repository"),
                ])),
        ],
        ..Default::default()
    });

    let updates = cloud.request_bodies("PATCH", "/v2/manage/namespaces/tf-acc-repo/repos/repo-test");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["is_public"], true);
    assert_eq!(updates[0]["category"], "linux");
    assert_eq!(cloud.count("repository"), 0);
    assert_eq!(cloud.count("organization"), 0);
}

#[test]
fn test_swr_organization_already_exists() {
    let cloud = FakeCloud::start();

    let duplicate = Configuration::new()
        .with(organization_block("tf-acc-dup"))
        .with(Block::resource(
            "flexibleengine_swr_organization",
            "again",
            Body::new().attr("name", "tf-acc-dup"),
        ));

    acctest::test(TestCase {
        provider: cloud.provider_config(),
        unit_test: true,
        steps: vec![TestStep::config(duplicate).expect_error("Error creating SWR organization")],
        ..Default::default()
    });

    assert_eq!(cloud.count("organization"), 0);
}
