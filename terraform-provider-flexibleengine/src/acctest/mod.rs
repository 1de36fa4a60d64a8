//! Acceptance test support
//!
//! Test cases drive the provider through the same RPC surface Terraform
//! uses. Live runs are gated on `TF_ACC`; cases marked `unit_test` run
//! against whatever endpoints the provider block points at.

pub mod checks;
pub mod harness;
pub mod hcl;

pub use checks::{
    check_no_resource_attr, check_resource_attr, check_resource_attr_pair, check_resource_attr_set,
    compose, Check, TestState,
};
pub use harness::{run, test, ImportStep, TestCase, TestStep};
pub use hcl::{Block, Body, Configuration, HclValue};

use crate::config::{ENV_ACCESS_KEY, ENV_REGION, ENV_SECRET_KEY};

/// Enables live acceptance tests
pub const ENV_ACC: &str = "TF_ACC";
pub const ENV_AVAILABILITY_ZONE: &str = "OS_AVAILABILITY_ZONE";
pub const ENV_VPC_ID: &str = "OS_VPC_ID";
pub const ENV_NETWORK_ID: &str = "OS_NETWORK_ID";

const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_SUFFIX_LEN: usize = 5;

pub fn acc_enabled() -> bool {
    std::env::var(ENV_ACC).map_or(false, |v| !v.is_empty() && v != "0")
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Panic unless credentials for a live run are present
pub fn pre_check() {
    for key in [ENV_REGION, ENV_ACCESS_KEY, ENV_SECRET_KEY] {
        if env_value(key).is_none() {
            panic!("{} must be set for acceptance tests", key);
        }
    }
}

/// Pre-check for tests that need an existing VPC and network
pub fn pre_check_network() {
    pre_check();
    for key in [ENV_VPC_ID, ENV_NETWORK_ID] {
        if env_value(key).is_none() {
            panic!("{} must be set for this acceptance test", key);
        }
    }
}

/// `prefix` followed by a short random lowercase suffix
pub fn random_name(prefix: &str) -> String {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn availability_zone() -> String {
    env_value(ENV_AVAILABILITY_ZONE).unwrap_or_else(|| "eu-west-0a".to_string())
}

pub fn vpc_id() -> String {
    env_value(ENV_VPC_ID).unwrap_or_default()
}

pub fn network_id() -> String {
    env_value(ENV_NETWORK_ID).unwrap_or_default()
}
