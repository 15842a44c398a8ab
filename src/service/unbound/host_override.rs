//! `opnsense_unbound_host_override` resource and data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{ClientResult, HostOverride, UnboundApi};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, Validator};
use crate::service::tools::{
    bool_to_string, int64_to_string_negative, string_or_null, string_to_bool, string_to_int64,
    value_string,
};
use crate::service::{Identified, LookupDataSource, ManagedResource};

const DESCRIPTION: &str = "Host overrides can be used to change DNS results from client queries or to add custom DNS records.";

/// Record types OPNsense accepts for a host override.
pub const RECORD_TYPES: [&str; 3] = ["A", "AAAA", "MX"];

/// State of a host override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostOverrideModel {
    /// Whether the override is active.
    pub enabled: Option<bool>,
    /// Host part of the name.
    pub hostname: Option<String>,
    /// Domain part of the name.
    pub domain: Option<String>,
    /// `A`, `AAAA` or `MX`.
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    /// Address answered for A/AAAA records.
    pub server: Option<String>,
    /// Free-form description.
    pub description: Option<String>,

    /// `-1` stands for "no priority".
    pub mx_priority: Option<i64>,
    /// Mail exchanger host for MX records.
    pub mx_host: Option<String>,

    /// OPNsense UUID.
    pub id: Option<String>,
}

impl Identified for HostOverrideModel {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl HostOverrideModel {
    /// Convert state into an API record.
    pub fn to_record(&self) -> Result<HostOverride, ProviderError> {
        Ok(HostOverride {
            enabled: bool_to_string(self.enabled.unwrap_or_default()),
            hostname: value_string(&self.hostname),
            domain: value_string(&self.domain),
            record_type: value_string(&self.record_type),
            server: value_string(&self.server),
            mx_priority: int64_to_string_negative(self.mx_priority.unwrap_or_default()),
            mx_domain: value_string(&self.mx_host),
            description: value_string(&self.description),
        })
    }

    /// Convert an API record into state, without the id.
    ///
    /// An unparsable priority reads back as `-1`; an empty description as null.
    pub fn from_record(d: &HostOverride) -> Result<Self, ProviderError> {
        Ok(Self {
            enabled: Some(string_to_bool(&d.enabled)),
            hostname: Some(d.hostname.clone()),
            domain: Some(d.domain.clone()),
            record_type: Some(d.record_type.clone()),
            server: Some(d.server.clone()),
            description: string_or_null(&d.description),
            mx_priority: Some(string_to_int64(&d.mx_priority)),
            mx_host: Some(d.mx_domain.clone()),
            id: None,
        })
    }
}

// =========================================================================
// Schema
// =========================================================================

/// Schema of the `opnsense_unbound_host_override` resource.
pub fn host_override_resource_schema() -> Schema {
    Schema::v0()
        .with_description(DESCRIPTION)
        .with_attribute(
            "enabled",
            Attribute::optional_computed_bool()
                .with_default(json!(true))
                .with_description("Enable the override for this host. Defaults to `true`."),
        )
        .with_attribute(
            "hostname",
            Attribute::required_string().with_description(
                "Name of the host, without the domain part. Use `*` to create a wildcard entry.",
            ),
        )
        .with_attribute(
            "domain",
            Attribute::required_string().with_description("Domain of the host, e.g. example.com"),
        )
        .with_attribute(
            "type",
            Attribute::optional_computed_string()
                .with_default(json!("A"))
                .with_validator(Validator::one_of(RECORD_TYPES))
                .with_description(
                    "Type of resource record. Available values: `A`, `AAAA`, `MX`. Defaults to `A`.",
                ),
        )
        .with_attribute(
            "server",
            Attribute::optional_computed_string()
                .with_default(json!(""))
                .with_description(
                    "IP address of the host, e.g. 192.168.100.100 or fd00:abcd::1. Must be set when `type` is `A` or `AAAA`.",
                ),
        )
        .with_attribute(
            "mx_priority",
            Attribute::optional_computed_int64()
                .with_default(json!(-1))
                .with_validator(Validator::also_requires(["mx_host"]))
                .with_description("Priority of MX record, e.g. 10. Must be set when `type` is `MX`."),
        )
        .with_attribute(
            "mx_host",
            Attribute::optional_computed_string()
                .with_default(json!(""))
                .with_validator(Validator::also_requires(["mx_priority"]))
                .with_description(
                    "Host name of MX host, e.g. mail.example.com. Must be set when `type` is `MX`.",
                ),
        )
        .with_attribute(
            "description",
            Attribute::optional_string()
                .with_description("Optional description here for your reference (not parsed)."),
        )
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_use_state_for_unknown()
                .with_description("UUID of the host override."),
        )
}

/// Schema of the `opnsense_unbound_host_override` data source.
pub fn host_override_data_source_schema() -> Schema {
    Schema::v0()
        .with_description(DESCRIPTION)
        .with_attribute(
            "id",
            Attribute::required_string().with_description("UUID of the resource."),
        )
        .with_attribute(
            "enabled",
            Attribute::computed_bool().with_description("Whether this host override is enabled."),
        )
        .with_attribute(
            "description",
            Attribute::computed_string()
                .with_description("Optional description here for your reference (not parsed)."),
        )
        .with_attribute(
            "hostname",
            Attribute::computed_string().with_description(
                "Name of the host, without the domain part. Use `*` to create a wildcard entry.",
            ),
        )
        .with_attribute(
            "domain",
            Attribute::computed_string().with_description("Domain of the host, e.g. example.com"),
        )
        .with_attribute(
            "type",
            Attribute::computed_string()
                .with_description("Type of resource record. Available values: `A`, `AAAA`, `MX`."),
        )
        .with_attribute(
            "server",
            Attribute::computed_string().with_description(
                "IP address of the host, e.g. 192.168.100.100 or fd00:abcd::1.",
            ),
        )
        .with_attribute(
            "mx_priority",
            Attribute::computed_int64().with_description("Priority of MX record, e.g. 10."),
        )
        .with_attribute(
            "mx_host",
            Attribute::computed_string()
                .with_description("Host name of MX host, e.g. mail.example.com."),
        )
}

// =========================================================================
// Handler
// =========================================================================

/// Manages Unbound host overrides through [`UnboundApi`].
pub struct HostOverrideResource {
    client: Arc<dyn UnboundApi>,
}

impl HostOverrideResource {
    /// Build the handler around an Unbound client.
    pub fn new(client: Arc<dyn UnboundApi>) -> Self {
        Self { client }
    }

    /// The matching lookup data source, sharing the same client.
    pub fn data_source(client: Arc<dyn UnboundApi>) -> LookupDataSource<Self> {
        LookupDataSource::new(Self::new(client))
    }
}

#[async_trait]
impl ManagedResource for HostOverrideResource {
    type Model = HostOverrideModel;
    type Record = HostOverride;

    const TYPE_SUFFIX: &'static str = "unbound_host_override";
    const OBJECT: &'static str = "host override";

    fn resource_schema() -> Schema {
        host_override_resource_schema()
    }

    fn data_source_schema() -> Schema {
        host_override_data_source_schema()
    }

    fn to_record(model: &HostOverrideModel) -> Result<HostOverride, ProviderError> {
        model.to_record()
    }

    fn from_record(record: &HostOverride) -> Result<HostOverrideModel, ProviderError> {
        HostOverrideModel::from_record(record)
    }

    async fn add_record(&self, record: &HostOverride) -> ClientResult<String> {
        self.client.add_host_override(record).await
    }

    async fn get_record(&self, id: &str) -> ClientResult<HostOverride> {
        self.client.get_host_override(id).await
    }

    async fn update_record(&self, id: &str, record: &HostOverride) -> ClientResult<()> {
        self.client.update_host_override(id, record).await
    }

    async fn delete_record(&self, id: &str) -> ClientResult<()> {
        self.client.delete_host_override(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::service::{DataSource, Resource};
    use crate::testing::MockOpnsense;
    use crate::validation::validate;
    use pretty_assertions::assert_eq;

    fn a_record() -> HostOverride {
        HostOverride {
            enabled: "1".into(),
            hostname: "www".into(),
            domain: "example.com".into(),
            record_type: "A".into(),
            server: "192.168.1.10".into(),
            mx_priority: String::new(),
            mx_domain: String::new(),
            description: "web".into(),
        }
    }

    #[test]
    fn test_a_record_round_trip() {
        let model = HostOverrideModel::from_record(&a_record()).unwrap();
        assert_eq!(model.enabled, Some(true));
        assert_eq!(model.mx_priority, Some(-1));
        assert_eq!(model.to_record().unwrap(), a_record());
    }

    #[test]
    fn test_mx_record_round_trip() {
        let record = HostOverride {
            enabled: "0".into(),
            hostname: "mail".into(),
            domain: "example.com".into(),
            record_type: "MX".into(),
            server: String::new(),
            mx_priority: "10".into(),
            mx_domain: "mx1.example.com".into(),
            description: "mx".into(),
        };

        let model = HostOverrideModel::from_record(&record).unwrap();
        assert_eq!(model.enabled, Some(false));
        assert_eq!(model.mx_priority, Some(10));
        assert_eq!(model.mx_host.as_deref(), Some("mx1.example.com"));
        assert_eq!(model.to_record().unwrap(), record);
    }

    #[test]
    fn test_empty_description_is_null() {
        let record = HostOverride {
            description: String::new(),
            ..a_record()
        };
        let model = HostOverrideModel::from_record(&record).unwrap();
        assert_eq!(model.description, None);

        let state = serde_json::to_value(&model).unwrap();
        assert_eq!(state["description"], serde_json::Value::Null);
        assert_eq!(state["type"], json!("A"));
    }

    #[test]
    fn test_schema_validators() {
        let schema = host_override_resource_schema();

        let ok = json!({"hostname": "www", "domain": "example.com", "type": "AAAA"});
        assert!(validate(&schema, &ok).is_empty());

        let bad_type = json!({"hostname": "www", "domain": "example.com", "type": "CNAME"});
        assert_eq!(validate(&schema, &bad_type).len(), 1);

        let half_mx = json!({"hostname": "mail", "domain": "example.com", "type": "MX", "mx_priority": 10});
        let diagnostics = validate(&schema, &half_mx);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("mx_priority"));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mock = Arc::new(MockOpnsense::new());
        let resource = HostOverrideResource::new(mock.clone());

        let plan = json!({
            "enabled": true,
            "hostname": "www",
            "domain": "example.com",
            "type": "A",
            "server": "192.168.1.10",
            "mx_priority": -1,
            "mx_host": "",
            "description": "web",
            "id": null
        });
        let state = resource.create(plan).await.unwrap();
        let id = state["id"].as_str().unwrap().to_string();
        assert_eq!(mock.host_override(&id), Some(a_record()));

        let read = resource.read(state.clone()).await.unwrap().unwrap();
        assert_eq!(read, state);

        let mut plan = state.clone();
        plan["enabled"] = json!(false);
        let updated = resource.update(state.clone(), plan.clone()).await.unwrap();
        assert_eq!(updated, plan);
        assert_eq!(mock.host_override(&id).unwrap().enabled, "0");

        resource.delete(updated).await.unwrap();
        assert_eq!(mock.host_override(&id), None);
        assert_eq!(resource.read(state).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_failure_detail() {
        let mock = Arc::new(MockOpnsense::new());
        mock.fail_next(ClientError::Api {
            status: 400,
            message: "hostname invalid".into(),
        });
        let resource = HostOverrideResource::new(mock.clone());

        let err = resource
            .create(json!({"hostname": "bad host", "domain": "example.com"}))
            .await
            .unwrap_err();
        let diag = err.to_diagnostic();
        assert_eq!(diag.summary, "Client Error");
        assert_eq!(
            diag.detail.as_deref(),
            Some("Unable to create host override, got error: OPNsense API error (HTTP 400): hostname invalid")
        );
        assert_eq!(mock.host_override_count(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let resource = HostOverrideResource::new(Arc::new(MockOpnsense::new()));
        let err = resource
            .create(json!({"hostname": "www", "enabled": "yes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_data_source() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_host_override(a_record());
        let ds = HostOverrideResource::data_source(mock);

        assert_eq!(ds.metadata("opnsense"), "opnsense_unbound_host_override");
        let state = ds.read(json!({"id": id})).await.unwrap();
        assert_eq!(state["server"], json!("192.168.1.10"));
        assert_eq!(state["mx_priority"], json!(-1));
    }
}
