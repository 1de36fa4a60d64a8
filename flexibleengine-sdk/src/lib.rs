//! Minimal SDK for the FlexibleEngine cloud
//!
//! Signs requests with AK/SK credentials and exposes typed calls for the
//! services the Terraform provider binds. One HTTP request per call; no
//! retries.

pub mod client;
pub mod error;
pub mod pagination;
pub mod services;
pub mod signer;
pub mod wait;

pub use client::{build_http_client, ServiceClient};
pub use error::{ClientError, Result};
pub use pagination::{OffsetPager, Page};
pub use signer::Credentials;
pub use wait::{StateChangeConf, STATE_DELETED};
