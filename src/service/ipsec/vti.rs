//! `opnsense_ipsec_vti` resource and data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{ClientResult, IpsecApi, IpsecVti};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::service::tools::value_string;
use crate::service::{Identified, LookupDataSource, ManagedResource};

const DESCRIPTION: &str =
    "IPsec Virtual Tunnel Interfaces (VTIs) are used by routed IPsec VPN connections.";

/// State of an IPsec VTI. Every attribute is a string, as on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpsecVtiModel {
    /// `"1"` when enabled, `"0"` otherwise.
    pub enabled: Option<String>,
    /// Request ID.
    pub request_id: Option<String>,
    /// Local endpoint address.
    pub local_ip: Option<String>,
    /// Remote endpoint address.
    pub remote_ip: Option<String>,
    /// Local tunnel address.
    pub tunnel_local_ip: Option<String>,
    /// Remote tunnel address.
    pub tunnel_remote_ip: Option<String>,
    /// Second local tunnel address.
    pub tunnel_local_ip2: Option<String>,
    /// Second remote tunnel address.
    pub tunnel_remote_ip2: Option<String>,
    /// Free-form description.
    pub description: Option<String>,

    /// OPNsense UUID.
    pub id: Option<String>,
}

impl Identified for IpsecVtiModel {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl IpsecVtiModel {
    /// Convert state into an API record. Null attributes become empty strings.
    pub fn to_record(&self) -> Result<IpsecVti, ProviderError> {
        Ok(IpsecVti {
            enabled: value_string(&self.enabled),
            request_id: value_string(&self.request_id),
            local_ip: value_string(&self.local_ip),
            remote_ip: value_string(&self.remote_ip),
            tunnel_local_ip: value_string(&self.tunnel_local_ip),
            tunnel_remote_ip: value_string(&self.tunnel_remote_ip),
            tunnel_local_ip2: value_string(&self.tunnel_local_ip2),
            tunnel_remote_ip2: value_string(&self.tunnel_remote_ip2),
            description: value_string(&self.description),
        })
    }

    /// Convert an API record into state, without the id.
    pub fn from_record(d: &IpsecVti) -> Result<Self, ProviderError> {
        Ok(Self {
            enabled: Some(d.enabled.clone()),
            request_id: Some(d.request_id.clone()),
            local_ip: Some(d.local_ip.clone()),
            remote_ip: Some(d.remote_ip.clone()),
            tunnel_local_ip: Some(d.tunnel_local_ip.clone()),
            tunnel_remote_ip: Some(d.tunnel_remote_ip.clone()),
            tunnel_local_ip2: Some(d.tunnel_local_ip2.clone()),
            tunnel_remote_ip2: Some(d.tunnel_remote_ip2.clone()),
            description: Some(d.description.clone()),
            id: None,
        })
    }
}

// =========================================================================
// Schema
// =========================================================================

/// Schema of the `opnsense_ipsec_vti` resource.
pub fn ipsec_vti_resource_schema() -> Schema {
    Schema::v0()
        .with_description(DESCRIPTION)
        .with_attribute(
            "enabled",
            Attribute::optional_computed_string()
                .with_default(json!("1"))
                .with_description("Enable or disable the VTI."),
        )
        .with_attribute(
            "request_id",
            Attribute::required_string().with_description("Request ID for the VTI."),
        )
        .with_attribute(
            "local_ip",
            Attribute::required_string().with_description("Local IP address for the VTI."),
        )
        .with_attribute(
            "remote_ip",
            Attribute::required_string().with_description("Remote IP address for the VTI."),
        )
        .with_attribute(
            "tunnel_local_ip",
            Attribute::required_string().with_description("Local tunnel IP address for the VTI."),
        )
        .with_attribute(
            "tunnel_remote_ip",
            Attribute::required_string()
                .with_description("Remote tunnel IP address for the VTI."),
        )
        .with_attribute(
            "tunnel_local_ip2",
            Attribute::optional_computed_string()
                .with_default(json!(""))
                .with_description("Second local tunnel IP address for the VTI."),
        )
        .with_attribute(
            "tunnel_remote_ip2",
            Attribute::optional_computed_string()
                .with_default(json!(""))
                .with_description("Second remote tunnel IP address for the VTI."),
        )
        .with_attribute(
            "description",
            Attribute::optional_computed_string()
                .with_default(json!(""))
                .with_description("Optional description for the VTI."),
        )
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_use_state_for_unknown()
                .with_description("UUID of the resource."),
        )
}

/// Schema of the `opnsense_ipsec_vti` data source.
pub fn ipsec_vti_data_source_schema() -> Schema {
    let computed = |description: &str| Attribute::computed_string().with_description(description);

    Schema::v0()
        .with_description(DESCRIPTION)
        .with_attribute(
            "id",
            Attribute::required_string().with_description("UUID of the resource."),
        )
        .with_attribute("enabled", computed("Enable or disable the VTI."))
        .with_attribute("request_id", computed("Request ID for the VTI."))
        .with_attribute("local_ip", computed("Local IP address for the VTI."))
        .with_attribute("remote_ip", computed("Remote IP address for the VTI."))
        .with_attribute("tunnel_local_ip", computed("Local tunnel IP address for the VTI."))
        .with_attribute("tunnel_remote_ip", computed("Remote tunnel IP address for the VTI."))
        .with_attribute(
            "tunnel_local_ip2",
            computed("Second local tunnel IP address for the VTI."),
        )
        .with_attribute(
            "tunnel_remote_ip2",
            computed("Second remote tunnel IP address for the VTI."),
        )
        .with_attribute("description", computed("Optional description for the VTI."))
}

// =========================================================================
// Handler
// =========================================================================

/// Manages IPsec VTIs through [`IpsecApi`].
pub struct IpsecVtiResource {
    client: Arc<dyn IpsecApi>,
}

impl IpsecVtiResource {
    /// Build the handler around an IPsec client.
    pub fn new(client: Arc<dyn IpsecApi>) -> Self {
        Self { client }
    }

    /// The matching lookup data source, sharing the same client.
    pub fn data_source(client: Arc<dyn IpsecApi>) -> LookupDataSource<Self> {
        LookupDataSource::new(Self::new(client))
    }
}

#[async_trait]
impl ManagedResource for IpsecVtiResource {
    type Model = IpsecVtiModel;
    type Record = IpsecVti;

    const TYPE_SUFFIX: &'static str = "ipsec_vti";
    const OBJECT: &'static str = "ipsec vti";

    fn resource_schema() -> Schema {
        ipsec_vti_resource_schema()
    }

    fn data_source_schema() -> Schema {
        ipsec_vti_data_source_schema()
    }

    fn to_record(model: &IpsecVtiModel) -> Result<IpsecVti, ProviderError> {
        model.to_record()
    }

    fn from_record(record: &IpsecVti) -> Result<IpsecVtiModel, ProviderError> {
        IpsecVtiModel::from_record(record)
    }

    async fn add_record(&self, record: &IpsecVti) -> ClientResult<String> {
        self.client.add_ipsec_vti(record).await
    }

    async fn get_record(&self, id: &str) -> ClientResult<IpsecVti> {
        self.client.get_ipsec_vti(id).await
    }

    async fn update_record(&self, id: &str, record: &IpsecVti) -> ClientResult<()> {
        self.client.update_ipsec_vti(id, record).await
    }

    async fn delete_record(&self, id: &str) -> ClientResult<()> {
        self.client.delete_ipsec_vti(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::service::{DataSource, Resource};
    use crate::testing::MockOpnsense;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn planned() -> Value {
        json!({
            "enabled": "1",
            "request_id": "100",
            "local_ip": "203.0.113.1",
            "remote_ip": "198.51.100.1",
            "tunnel_local_ip": "10.10.0.1",
            "tunnel_remote_ip": "10.10.0.2",
            "tunnel_local_ip2": "",
            "tunnel_remote_ip2": "",
            "description": "site-b",
            "id": null
        })
    }

    fn record() -> IpsecVti {
        IpsecVti {
            enabled: "1".into(),
            request_id: "100".into(),
            local_ip: "203.0.113.1".into(),
            remote_ip: "198.51.100.1".into(),
            tunnel_local_ip: "10.10.0.1".into(),
            tunnel_remote_ip: "10.10.0.2".into(),
            tunnel_local_ip2: String::new(),
            tunnel_remote_ip2: String::new(),
            description: "site-b".into(),
        }
    }

    #[test]
    fn test_round_trip() {
        let model = IpsecVtiModel::from_record(&record()).unwrap();
        assert_eq!(model.id, None);
        assert_eq!(model.to_record().unwrap(), record());
    }

    #[test]
    fn test_null_becomes_empty_string() {
        let model = IpsecVtiModel {
            request_id: Some("7".into()),
            ..Default::default()
        };
        let vti = model.to_record().unwrap();
        assert_eq!(vti.request_id, "7");
        assert_eq!(vti.enabled, "");
        assert_eq!(vti.description, "");
    }

    #[test]
    fn test_schema_defaults() {
        let schema = ipsec_vti_resource_schema();
        assert_eq!(schema.attribute("enabled").unwrap().default, Some(json!("1")));
        assert_eq!(
            schema.attribute("tunnel_local_ip2").unwrap().default,
            Some(json!(""))
        );
        assert!(schema.attribute("request_id").unwrap().flags.required);
        assert!(schema.attribute("id").unwrap().use_state_for_unknown);

        let ds = ipsec_vti_data_source_schema();
        assert!(ds.attribute("id").unwrap().flags.required);
        assert!(ds.attribute("local_ip").unwrap().flags.is_computed_only());
    }

    #[tokio::test]
    async fn test_create_uses_client_id() {
        let mock = Arc::new(MockOpnsense::new());
        let resource = IpsecVtiResource::new(mock.clone());

        let mut plan = planned();
        plan["id"] = json!("made-up-by-caller");
        let state = resource.create(plan).await.unwrap();

        let id = state["id"].as_str().unwrap().to_string();
        assert_ne!(id, "made-up-by-caller");
        assert_eq!(mock.ipsec_vti(&id), Some(record()));
        assert_eq!(state["description"], json!("site-b"));
    }

    #[tokio::test]
    async fn test_read_preserves_id() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        let resource = IpsecVtiResource::new(mock);

        let state = resource.read(json!({"id": id})).await.unwrap().unwrap();
        let mut expected = planned();
        expected["id"] = json!(id);
        assert_eq!(state, expected);
    }

    #[tokio::test]
    async fn test_read_not_found_removes() {
        let resource = IpsecVtiResource::new(Arc::new(MockOpnsense::new()));
        let state = resource.read(json!({"id": "gone"})).await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_read_other_errors_fail() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        mock.fail_next(ClientError::Api {
            status: 500,
            message: "internal error".into(),
        });
        let resource = IpsecVtiResource::new(mock);

        let err = resource.read(json!({"id": id})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to read ipsec vti, got error: OPNsense API error (HTTP 500): internal error"
        );
    }

    #[tokio::test]
    async fn test_update_returns_plan() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        let resource = IpsecVtiResource::new(mock.clone());

        let mut plan = planned();
        plan["description"] = json!("renamed");
        plan["id"] = json!(id);
        let state = resource
            .update(json!({"id": id}), plan.clone())
            .await
            .unwrap();

        assert_eq!(state, plan);
        assert_eq!(mock.ipsec_vti(&id).unwrap().description, "renamed");
    }

    #[tokio::test]
    async fn test_update_takes_id_from_prior_state() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        let resource = IpsecVtiResource::new(mock.clone());

        let state = resource.update(json!({"id": id}), planned()).await.unwrap();
        assert_eq!(state["id"], json!(id));

        let mut plan = planned();
        plan["id"] = json!("");
        let state = resource.update(json!({"id": id}), plan).await.unwrap();
        assert_eq!(state["id"], json!(id));
        assert_eq!(mock.calls().last().unwrap(), &format!("update_ipsec_vti {id}"));
    }

    #[tokio::test]
    async fn test_delete_removes_vti() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        let resource = IpsecVtiResource::new(mock.clone());

        resource.delete(json!({"id": id})).await.unwrap();
        assert_eq!(mock.ipsec_vti(&id), None);
        assert_eq!(mock.calls().last().unwrap(), &format!("delete_ipsec_vti {id}"));
    }

    #[tokio::test]
    async fn test_import_state() {
        let resource = IpsecVtiResource::new(Arc::new(MockOpnsense::new()));
        assert_eq!(
            resource.import_state("abc").await.unwrap(),
            json!({"id": "abc"})
        );
        assert_eq!(resource.metadata("opnsense"), "opnsense_ipsec_vti");
    }

    #[tokio::test]
    async fn test_data_source_read() {
        let mock = Arc::new(MockOpnsense::new());
        let id = mock.insert_ipsec_vti(record());
        let ds = IpsecVtiResource::data_source(mock);

        assert_eq!(ds.metadata("opnsense"), "opnsense_ipsec_vti");
        let state = ds.read(json!({"id": id})).await.unwrap();
        assert_eq!(state["tunnel_remote_ip"], json!("10.10.0.2"));
        assert_eq!(state["id"], json!(id));

        let err = ds.read(json!({"id": "missing"})).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
