//! Typed service bindings
//!
//! Each module mirrors one service's REST resources: request/response structs
//! plus free functions taking the matching [`ServiceClient`](crate::ServiceClient).

pub mod dcs;
pub mod iam;
pub mod nat;
pub mod networking;
pub mod rds;
pub mod swr;
pub mod vpc;

use serde::{Deserialize, Serialize};

/// Resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
