//! The host-facing provider.
//!
//! [`ProviderService`] is the boundary the plugin host talks to: schema and
//! metadata requests, provider configuration, validation, planning, and the
//! resource and data source lifecycle calls, all with JSON payloads.
//! [`OpnsenseProvider`] implements it by dispatching each call to the handler
//! registered under the requested type name.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{DiagnosticsApi, IpsecApi, OpnsenseClient, UnboundApi};
use crate::config::{provider_schema, ProviderConfig};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::service::diagnostics::{InterfaceAllDataSource, InterfaceDataSource};
use crate::service::ipsec::IpsecVtiResource;
use crate::service::unbound::HostOverrideResource;
use crate::service::{DataSource, Resource};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities, PROVIDER_TYPE_NAME,
};
use crate::validation::validate;

/// Trait that provider implementations must implement.
///
/// Every payload is the JSON encoding of a schema model, keyed by attribute
/// name. Errors are turned into diagnostics by the host adapter via
/// [`ProviderError::to_diagnostic`].
#[async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<_> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<_> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource. Null means the resource is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// The OPNsense provider.
///
/// The client is injected at construction and shared by every handler.
pub struct OpnsenseProvider {
    version: String,
    resources: HashMap<String, Arc<dyn Resource>>,
    data_sources: HashMap<String, Arc<dyn DataSource>>,
    config: RwLock<Option<ProviderConfig>>,
}

impl OpnsenseProvider {
    /// Build the provider and register every handler against `client`.
    pub fn new<C>(version: impl Into<String>, client: Arc<C>) -> Self
    where
        C: OpnsenseClient + 'static,
    {
        let diagnostics: Arc<dyn DiagnosticsApi> = client.clone();
        let ipsec: Arc<dyn IpsecApi> = client.clone();
        let unbound: Arc<dyn UnboundApi> = client;

        let resources: Vec<Arc<dyn Resource>> = vec![
            Arc::new(IpsecVtiResource::new(ipsec.clone())),
            Arc::new(HostOverrideResource::new(unbound.clone())),
        ];
        let data_sources: Vec<Arc<dyn DataSource>> = vec![
            Arc::new(InterfaceDataSource::new(diagnostics.clone())),
            Arc::new(InterfaceAllDataSource::new(diagnostics)),
            Arc::new(IpsecVtiResource::data_source(ipsec)),
            Arc::new(HostOverrideResource::data_source(unbound)),
        ];

        Self {
            version: version.into(),
            resources: resources
                .into_iter()
                .map(|r| (r.metadata(PROVIDER_TYPE_NAME), r))
                .collect(),
            data_sources: data_sources
                .into_iter()
                .map(|d| (d.metadata(PROVIDER_TYPE_NAME), d))
                .collect(),
            config: RwLock::new(None),
        }
    }

    /// The provider version reported to the host.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The configuration accepted by the last successful [`ProviderService::configure`].
    pub fn config(&self) -> Option<ProviderConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, ProviderError> {
        Ok(self.resource(resource_type)?.schema())
    }
}

#[async_trait]
impl ProviderService for OpnsenseProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name.clone(), resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name.clone(), data_source.schema());
        }
        schema
    }

    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    #[instrument(skip_all, name = "provider.validate_provider_config")]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resolved = match ProviderConfig::from_value(&config) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "provider configuration rejected");
                return Ok(vec![ProviderError::from(e).to_diagnostic()]);
            },
        };

        info!(uri = %resolved.uri, version = %self.version, "provider configured");
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(resolved);
        Ok(vec![])
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(validate(&schema, &config))
    }

    #[instrument(skip_all, fields(resource_type = %resource_type), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        let result = plan_resource(&schema, prior_state.as_ref(), &proposed_state)?;
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "plan computed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.resource(resource_type)?
            .create(planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "create failed"))
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let state = self
            .resource(resource_type)?
            .read(current_state)
            .await
            .inspect_err(|e| error!(error = %e, "read failed"))?;
        Ok(state.unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)?
            .update(prior_state, planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "update failed"))
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource(resource_type)?
            .delete(current_state)
            .await
            .inspect_err(|e| error!(error = %e, "delete failed"))
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.resource(resource_type)?.import_state(id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config), name = "provider.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.data_source(data_source_type)?.schema();
        Ok(validate(&schema, &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.data_source(data_source_type)?
            .read(config)
            .await
            .inspect_err(|e| error!(error = %e, "data source read failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HostOverride;
    use crate::testing::MockOpnsense;
    use figment::Jail;
    use serde_json::json;

    fn provider() -> (Arc<MockOpnsense>, OpnsenseProvider) {
        let mock = Arc::new(MockOpnsense::new());
        let provider = OpnsenseProvider::new("0.1.0", mock.clone());
        (mock, provider)
    }

    #[test]
    fn test_metadata_lists_every_type() {
        let (_, provider) = provider();
        let metadata = provider.metadata();

        assert_eq!(
            metadata.resources,
            vec!["opnsense_ipsec_vti", "opnsense_unbound_host_override"]
        );
        assert_eq!(
            metadata.data_sources,
            vec![
                "opnsense_interface",
                "opnsense_interface_all",
                "opnsense_ipsec_vti",
                "opnsense_unbound_host_override",
            ]
        );
        assert!(metadata.capabilities.plan_destroy);
        assert_eq!(provider.version(), "0.1.0");
    }

    #[test]
    fn test_schema() {
        let (_, provider) = provider();
        let schema = provider.schema();

        assert!(schema.provider.block.attributes.contains_key("api_key"));
        assert!(schema.resources["opnsense_ipsec_vti"]
            .attribute("request_id")
            .unwrap()
            .flags
            .required);
        assert!(schema.data_sources["opnsense_interface_all"]
            .block
            .blocks
            .contains_key("interfaces"));
    }

    #[tokio::test]
    async fn test_configure() {
        let (_, provider) = provider();

        let diagnostics = provider
            .configure(json!({
                "uri": "https://fw.example.com",
                "api_key": "key",
                "api_secret": "secret"
            }))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(provider.config().unwrap().uri, "https://fw.example.com");
    }

    #[test]
    fn test_configure_missing_credentials() {
        Jail::expect_with(|_jail| {
            let (_, provider) = provider();
            let diagnostics = tokio_test::block_on(provider.configure(json!({
                "uri": "https://fw.example.com"
            })))
            .unwrap();

            assert_eq!(diagnostics.len(), 1);
            assert!(diagnostics[0].is_error());
            assert_eq!(diagnostics[0].summary, "Provider Configuration Error");
            assert!(provider.config().is_none());
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let (_, provider) = provider();
        let diagnostics = provider
            .validate_provider_config(json!({"retries": 0, "min_backoff": 2}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("retries"));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_, provider) = provider();

        let diagnostics = provider
            .validate_resource_config(
                "opnsense_unbound_host_override",
                json!({"hostname": "www", "domain": "example.com", "type": "TXT"}),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = provider
            .validate_resource_config("opnsense_ipsec_vti", json!({"request_id": "1"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let (_, provider) = provider();

        let err = provider
            .create("opnsense_widget", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = provider
            .read_data_source("opnsense_widget", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        // Interfaces are data sources only.
        assert!(provider
            .plan("opnsense_interface", None, json!({}), json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_plan_applies_defaults() {
        let (_, provider) = provider();
        let config = json!({"hostname": "www", "domain": "example.com", "server": "10.0.0.5"});

        let plan = provider
            .plan(
                "opnsense_unbound_host_override",
                None,
                config.clone(),
                config,
            )
            .await
            .unwrap();

        let planned = &plan.planned_state;
        assert_eq!(planned["enabled"], json!(true));
        assert_eq!(planned["type"], json!("A"));
        assert_eq!(planned["mx_priority"], json!(-1));
        assert_eq!(planned["mx_host"], json!(""));
        assert_eq!(planned["server"], json!("10.0.0.5"));
        assert!(planned.get("description").is_none());
    }

    #[tokio::test]
    async fn test_read_gone_returns_null() {
        let (mock, provider) = provider();
        let id = mock.insert_host_override(HostOverride {
            enabled: "1".into(),
            hostname: "www".into(),
            domain: "example.com".into(),
            record_type: "A".into(),
            ..Default::default()
        });

        let state = provider
            .read("opnsense_unbound_host_override", json!({"id": id}))
            .await
            .unwrap();
        assert_eq!(state["hostname"], json!("www"));

        mock.remove_host_override(&id);
        let state = provider
            .read("opnsense_unbound_host_override", json!({"id": id}))
            .await
            .unwrap();
        assert_eq!(state, Value::Null);
    }

    #[tokio::test]
    async fn test_configured_id_cannot_redirect_update() {
        let (mock, provider) = provider();
        let www = HostOverride {
            enabled: "1".into(),
            hostname: "www".into(),
            domain: "example.com".into(),
            record_type: "A".into(),
            ..Default::default()
        };
        let mine = mock.insert_host_override(www.clone());
        let other = mock.insert_host_override(HostOverride {
            hostname: "api".into(),
            ..www
        });

        let config = json!({"hostname": "changed", "domain": "example.com", "id": other});
        let diagnostics = provider
            .validate_resource_config("opnsense_unbound_host_override", config.clone())
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid read-only attribute");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("id"));

        let prior = provider
            .read("opnsense_unbound_host_override", json!({"id": mine}))
            .await
            .unwrap();
        let plan = provider
            .plan(
                "opnsense_unbound_host_override",
                Some(prior.clone()),
                config.clone(),
                config,
            )
            .await
            .unwrap();
        assert_eq!(plan.planned_state["id"], json!(mine));

        provider
            .update("opnsense_unbound_host_override", prior, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(mock.host_override(&mine).unwrap().hostname, "changed");
        assert_eq!(mock.host_override(&other).unwrap().hostname, "api");
    }

    #[tokio::test]
    async fn test_import() {
        let (_, provider) = provider();
        let imported = provider
            .import_resource("opnsense_ipsec_vti", "0d3c6b3e")
            .await
            .unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "opnsense_ipsec_vti");
        assert_eq!(imported[0].state, json!({"id": "0d3c6b3e"}));
    }
}
