//! OPNsense Provider
//!
//! This crate exposes parts of an OPNsense firewall as declaratively managed
//! resources and read-only data sources, following the lifecycle model of
//! [terraform-plugin-go](https://github.com/hashicorp/terraform-plugin-go).
//!
//! # Overview
//!
//! - **Resources**: `opnsense_ipsec_vti` and `opnsense_unbound_host_override`
//!   with create, read, update, delete and import
//! - **Data sources**: `opnsense_interface`, `opnsense_interface_all`,
//!   `opnsense_ipsec_vti` and `opnsense_unbound_host_override`
//! - **Schemas**: attribute flags, defaults and validators per type, checked
//!   by [`validate`] and applied by [`plan::plan_resource`]
//! - **Client seam**: the [`client`] traits the OPNsense API client implements
//! - **Configuration**: the provider block with `OPNSENSE_*` environment
//!   fallback
//! - **Logging**: `tracing` spans on every lifecycle call, written to stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use opnsense_provider::{init_logging, OpnsenseProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run(client: Arc<impl opnsense_provider::client::OpnsenseClient + 'static>)
//! #     -> Result<(), opnsense_provider::ProviderError> {
//! init_logging();
//!
//! let provider = OpnsenseProvider::new(env!("CARGO_PKG_VERSION"), client);
//! provider.configure(json!({"uri": "https://192.168.1.1"})).await?;
//!
//! let plan = provider
//!     .plan(
//!         "opnsense_unbound_host_override",
//!         None,
//!         json!({"hostname": "www", "domain": "example.com", "server": "10.0.0.5"}),
//!         json!({}),
//!     )
//!     .await?;
//! let state = provider
//!     .create("opnsense_unbound_host_override", plan.planned_state)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{ClientError, OpnsenseClient};
pub use config::{ClientOptions, ConfigError, ProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{OpnsenseProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    PROVIDER_TYPE_NAME,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for client implementations
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
