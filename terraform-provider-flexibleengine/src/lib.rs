//! Terraform provider for the FlexibleEngine cloud
//!
//! Resources and data sources are driven through the JSON-RPC plugin
//! protocol served by [`provider::FlexibleEngineProvider`].

pub mod acctest;
pub mod config;
pub mod data_sources;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
