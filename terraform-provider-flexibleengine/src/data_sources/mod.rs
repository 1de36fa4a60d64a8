//! Terraform Data Sources for FlexibleEngine
//!
//! Read-only queries. Each data source lists objects from one service,
//! filters them by its arguments and flattens the matches into state.

mod rds_flavors;
mod vpc;
mod vpc_subnet_ids;

pub use rds_flavors::RdsFlavorsDataSource;
pub use vpc::VpcDataSource;
pub use vpc_subnet_ids::VpcSubnetIdsDataSource;

use crate::config::Config;
use crate::resources::{ResourceResult, ResourceState};
use crate::schema::{Diagnostic, ResourceSchema};
use async_trait::async_trait;

/// Data source trait
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name
    fn type_name(&self) -> &str;

    /// Get the schema for this data source
    fn schema(&self) -> ResourceSchema;

    /// Run the query described by `config` and return the resulting state
    async fn read(&self, config: &Config, query: &ResourceState) -> ResourceResult<ResourceState>;
}

/// Error for a query without results
pub fn no_results(what: &str) -> Vec<Diagnostic> {
    vec![Diagnostic::error(&format!(
        "Your query returned no {}. Please change your search criteria and try again.",
        what
    ))]
}

/// Get all available data sources
pub fn get_all_data_sources() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(VpcDataSource::new()),
        Box::new(VpcSubnetIdsDataSource::new()),
        Box::new(RdsFlavorsDataSource::new()),
    ]
}
