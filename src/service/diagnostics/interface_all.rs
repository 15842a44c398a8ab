//! `opnsense_interface_all` data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::interface::{interface_block, InterfaceModel};
use crate::client::{DiagnosticsApi, Interface};
use crate::error::ProviderError;
use crate::schema::{Attribute, NestedBlock, Schema};
use crate::service::DataSource;

const TYPE_SUFFIX: &str = "interface_all";

/// State of the `opnsense_interface_all` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAllModel {
    /// Every interface, in API order. Empty, never null, after a read.
    pub interfaces: Option<Vec<InterfaceModel>>,
}

impl InterfaceAllModel {
    /// Convert the full interface listing into state.
    pub fn from_records(records: &[Interface]) -> Result<Self, ProviderError> {
        let interfaces = records
            .iter()
            .map(InterfaceModel::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            interfaces: Some(interfaces),
        })
    }
}

/// Schema of the `opnsense_interface_all` data source.
pub fn interface_all_data_source_schema() -> Schema {
    Schema::v0()
        .with_description(
            "InterfacesAll can be used to get a list of all configurations of OPNsense interfaces. Allows for custom filtering.",
        )
        .with_block(
            "interfaces",
            NestedBlock::computed_list(
                interface_block(
                    Attribute::computed_string().with_description("Name of the interface device."),
                )
                .with_description("A list of all interfaces present in OPNsense."),
            ),
        )
}

/// Lists every interface on the firewall.
pub struct InterfaceAllDataSource {
    client: Arc<dyn DiagnosticsApi>,
}

impl InterfaceAllDataSource {
    /// Build the data source around a diagnostics client.
    pub fn new(client: Arc<dyn DiagnosticsApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for InterfaceAllDataSource {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_{}", provider_type_name, TYPE_SUFFIX)
    }

    fn schema(&self) -> Schema {
        interface_all_data_source_schema()
    }

    async fn read(&self, _config: Value) -> Result<Value, ProviderError> {
        let records = self
            .client
            .get_interface_all()
            .await
            .map_err(|e| ProviderError::client("read interface", e))?;
        debug!(count = records.len(), "read interfaces");

        let model = InterfaceAllModel::from_records(&records)?;
        serde_json::to_value(&model).map_err(|e| ProviderError::conversion("interface", e.to_string()))
    }
}
