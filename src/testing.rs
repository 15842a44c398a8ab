//! Testing utilities for the provider.
//!
//! [`MockOpnsense`] is an in-memory firewall implementing every client
//! trait, and [`ProviderTester`] drives a [`ProviderService`] through the
//! same plan/apply sequence the host would, without a host.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use opnsense_provider::testing::{MockOpnsense, ProviderTester};
//! use opnsense_provider::OpnsenseProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_host_override() {
//!     let mock = Arc::new(MockOpnsense::new());
//!     let tester = ProviderTester::new(OpnsenseProvider::new("0.1.0", mock.clone()));
//!
//!     let state = tester
//!         .lifecycle_create(
//!             "opnsense_unbound_host_override",
//!             json!({"hostname": "www", "domain": "example.com", "server": "10.0.0.5"}),
//!         )
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["type"], "A");
//!     assert_eq!(mock.host_override_count(), 1);
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::client::{
    ClientError, ClientResult, DiagnosticsApi, HostOverride, Interface, IpsecApi, IpsecVti,
    UnboundApi,
};
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

// =========================================================================
// Mock OPNsense
// =========================================================================

#[derive(Default)]
struct MockState {
    interfaces: Vec<Interface>,
    vtis: HashMap<String, IpsecVti>,
    host_overrides: HashMap<String, HostOverride>,
    calls: Vec<String>,
    fail_next: Option<ClientError>,
}

/// An in-memory OPNsense backend.
///
/// Objects created through the API get a fresh UUID. Every API call is
/// appended to [`MockOpnsense::calls`] as `"<method> <argument>"`. A failure
/// queued with [`MockOpnsense::fail_next`] is returned by the next API call,
/// whatever it is.
#[derive(Default)]
pub struct MockOpnsense {
    state: Mutex<MockState>,
}

impl MockOpnsense {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface to the diagnostics listing.
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .interfaces
            .push(interface);
        self
    }

    /// Every API call made so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Make the next API call fail with `error`.
    pub fn fail_next(&self, error: ClientError) {
        self.lock().fail_next = Some(error);
    }

    /// Store a VTI directly, bypassing the call log. Returns its id.
    pub fn insert_ipsec_vti(&self, vti: IpsecVti) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().vtis.insert(id.clone(), vti);
        id
    }

    /// The stored VTI, if any.
    pub fn ipsec_vti(&self, id: &str) -> Option<IpsecVti> {
        self.lock().vtis.get(id).cloned()
    }

    /// Store a host override directly, bypassing the call log. Returns its id.
    pub fn insert_host_override(&self, host: HostOverride) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().host_overrides.insert(id.clone(), host);
        id
    }

    /// The stored host override, if any.
    pub fn host_override(&self, id: &str) -> Option<HostOverride> {
        self.lock().host_overrides.get(id).cloned()
    }

    /// Delete a host override behind the provider's back.
    pub fn remove_host_override(&self, id: &str) -> Option<HostOverride> {
        self.lock().host_overrides.remove(id)
    }

    /// Number of stored host overrides.
    pub fn host_override_count(&self) -> usize {
        self.lock().host_overrides.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log a call and hand out the state, or the queued failure.
    fn call(&self, call: String) -> ClientResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl DiagnosticsApi for MockOpnsense {
    async fn get_interface(&self, device: &str) -> ClientResult<Interface> {
        let state = self.call(format!("get_interface {device}"))?;
        state
            .interfaces
            .iter()
            .find(|i| i.device == device)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(device.to_string()))
    }

    async fn get_interface_all(&self) -> ClientResult<Vec<Interface>> {
        let state = self.call("get_interface_all".to_string())?;
        Ok(state.interfaces.clone())
    }
}

#[async_trait]
impl IpsecApi for MockOpnsense {
    async fn get_ipsec_vti(&self, id: &str) -> ClientResult<IpsecVti> {
        let state = self.call(format!("get_ipsec_vti {id}"))?;
        state
            .vtis
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn add_ipsec_vti(&self, vti: &IpsecVti) -> ClientResult<String> {
        let mut state = self.call("add_ipsec_vti".to_string())?;
        let id = Uuid::new_v4().to_string();
        state.vtis.insert(id.clone(), vti.clone());
        Ok(id)
    }

    async fn update_ipsec_vti(&self, id: &str, vti: &IpsecVti) -> ClientResult<()> {
        let mut state = self.call(format!("update_ipsec_vti {id}"))?;
        match state.vtis.get_mut(id) {
            Some(stored) => {
                *stored = vti.clone();
                Ok(())
            },
            None => Err(ClientError::NotFound(id.to_string())),
        }
    }

    async fn delete_ipsec_vti(&self, id: &str) -> ClientResult<()> {
        let mut state = self.call(format!("delete_ipsec_vti {id}"))?;
        state
            .vtis
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl UnboundApi for MockOpnsense {
    async fn get_host_override(&self, id: &str) -> ClientResult<HostOverride> {
        let state = self.call(format!("get_host_override {id}"))?;
        state
            .host_overrides
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }

    async fn add_host_override(&self, host: &HostOverride) -> ClientResult<String> {
        let mut state = self.call(format!("add_host_override {}", host.hostname))?;
        let id = Uuid::new_v4().to_string();
        state.host_overrides.insert(id.clone(), host.clone());
        Ok(id)
    }

    async fn update_host_override(&self, id: &str, host: &HostOverride) -> ClientResult<()> {
        let mut state = self.call(format!("update_host_override {id}"))?;
        match state.host_overrides.get_mut(id) {
            Some(stored) => {
                *stored = host.clone();
                Ok(())
            },
            None => Err(ClientError::NotFound(id.to_string())),
        }
    }

    async fn delete_host_override(&self, id: &str) -> ClientResult<()> {
        let mut state = self.call(format!("delete_host_override {id}"))?;
        state
            .host_overrides
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(id.to_string()))
    }
}

// =========================================================================
// Provider Tester
// =========================================================================

/// A test harness for [`ProviderService`] implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration, failing on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run plan → create → read and return the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Run plan → update → read and return the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Run plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Run create → update → delete and return the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// The operation failed with error diagnostics.
    #[error("operation failed with {}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attr) = &d.attribute {
                line.push_str(&format!(" (at {attr})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates without replacing.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan changes the given attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary or detail contains
/// `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matched = diagnostics.iter().any(|d| {
        matches!(d.severity, DiagnosticSeverity::Error)
            && (d.summary.contains(substring)
                || d.detail.as_deref().is_some_and(|detail| detail.contains(substring)))
    });

    assert!(
        matched,
        "Expected an error containing '{}', got: {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}
