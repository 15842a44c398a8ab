//! Resource and data source handlers.
//!
//! Every managed object follows the same lifecycle: decode the JSON payload
//! into its schema model, convert the model to the OPNsense record, make one
//! client call, convert back and encode. [`ManagedResource`] captures the
//! per-type parts of that (schema, conversions, the four client calls) and a
//! blanket impl supplies [`Resource`] once for all of them. Read-only objects
//! implement [`DataSource`] directly, or reuse a resource's lookup through
//! [`LookupDataSource`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use crate::client::ClientResult;
use crate::error::ProviderError;
use crate::schema::Schema;

pub mod diagnostics;
pub mod ipsec;
pub mod tools;
pub mod unbound;

/// A managed resource type, as seen by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Full type name, e.g. `opnsense_ipsec_vti`.
    fn metadata(&self, provider_type_name: &str) -> String;

    /// Declarative schema.
    fn schema(&self) -> Schema;

    /// Create the object described by `planned`; returns the new state.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `state`. `None` means the object is gone and must be dropped.
    async fn read(&self, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply `planned` over `prior`; returns the new state.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;

    /// Delete the object recorded in `state`.
    async fn delete(&self, state: Value) -> Result<(), ProviderError>;

    /// Seed state for an imported object. The host follows up with [`Resource::read`].
    async fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(json!({ "id": id }))
    }
}

/// A read-only data source type, as seen by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Full type name, e.g. `opnsense_interface`.
    fn metadata(&self, provider_type_name: &str) -> String;

    /// Declarative schema.
    fn schema(&self) -> Schema;

    /// Resolve `config` into the data source's state.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

/// Schema models that carry the OPNsense UUID.
pub trait Identified {
    /// The UUID, if known.
    fn id(&self) -> Option<&str>;

    /// Attach the UUID.
    fn set_id(&mut self, id: String);
}

/// The per-type half of a UUID-addressed resource.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// The schema model persisted as state.
    type Model: Identified + Serialize + DeserializeOwned + Send + Sync;

    /// The OPNsense record sent to and received from the client.
    type Record: Send + Sync;

    /// Suffix appended to the provider type name.
    const TYPE_SUFFIX: &'static str;

    /// Human name used in error details, e.g. `host override`.
    const OBJECT: &'static str;

    /// Resource schema.
    fn resource_schema() -> Schema;

    /// Data source schema: `id` required, everything else computed.
    fn data_source_schema() -> Schema;

    /// Model to record. Never carries the id.
    fn to_record(model: &Self::Model) -> Result<Self::Record, ProviderError>;

    /// Record to model. Never sets the id.
    fn from_record(record: &Self::Record) -> Result<Self::Model, ProviderError>;

    /// Create the record remotely, returning its UUID.
    async fn add_record(&self, record: &Self::Record) -> ClientResult<String>;

    /// Fetch the record stored under `id`.
    async fn get_record(&self, id: &str) -> ClientResult<Self::Record>;

    /// Replace the record stored under `id`.
    async fn update_record(&self, id: &str, record: &Self::Record) -> ClientResult<()>;

    /// Delete the record stored under `id`.
    async fn delete_record(&self, id: &str) -> ClientResult<()>;
}

#[async_trait]
impl<T> Resource for T
where
    T: ManagedResource,
{
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_{}", provider_type_name, T::TYPE_SUFFIX)
    }

    fn schema(&self) -> Schema {
        T::resource_schema()
    }

    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut model: T::Model = decode(planned)?;
        let record = T::to_record(&model)?;

        let id = self
            .add_record(&record)
            .await
            .map_err(|e| ProviderError::client(format!("create {}", T::OBJECT), e))?;

        model.set_id(id);
        trace!(object = T::OBJECT, "created a resource");
        encode::<T>(&model)
    }

    async fn read(&self, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = state_id(&state)?;

        let record = match self.get_record(&id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                warn!(object = T::OBJECT, %id, "{} not present in remote, removing from state", T::OBJECT);
                return Ok(None);
            },
            Err(e) => return Err(ProviderError::client(format!("read {}", T::OBJECT), e)),
        };

        let mut model = T::from_record(&record)?;
        model.set_id(id);
        encode::<T>(&model).map(Some)
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let mut model: T::Model = decode(planned)?;
        let id = match model.id().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => state_id(&prior)?,
        };
        let record = T::to_record(&model)?;

        self.update_record(&id, &record)
            .await
            .map_err(|e| ProviderError::client(format!("update {}", T::OBJECT), e))?;

        debug!(object = T::OBJECT, %id, "updated a resource");
        model.set_id(id);
        encode::<T>(&model)
    }

    async fn delete(&self, state: Value) -> Result<(), ProviderError> {
        let id = state_id(&state)?;

        self.delete_record(&id)
            .await
            .map_err(|e| ProviderError::client(format!("delete {}", T::OBJECT), e))?;

        debug!(object = T::OBJECT, %id, "deleted a resource");
        Ok(())
    }
}

/// A data source that looks up one managed object by `id`.
///
/// Unlike resource reads, a missing object is an error here.
pub struct LookupDataSource<T> {
    resource: T,
}

impl<T: ManagedResource> LookupDataSource<T> {
    /// Serve lookups through `resource`'s client.
    pub fn new(resource: T) -> Self {
        Self { resource }
    }
}

#[async_trait]
impl<T> DataSource for LookupDataSource<T>
where
    T: ManagedResource,
{
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_{}", provider_type_name, T::TYPE_SUFFIX)
    }

    fn schema(&self) -> Schema {
        T::data_source_schema()
    }

    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let id = state_id(&config)?;

        let record = self
            .resource
            .get_record(&id)
            .await
            .map_err(|e| ProviderError::client(format!("read {}", T::OBJECT), e))?;

        let mut model = T::from_record(&record)?;
        model.set_id(id);
        encode::<T>(&model)
    }
}

// =========================================================================
// Helpers
// =========================================================================

#[derive(Deserialize)]
struct StateId {
    #[serde(default)]
    id: Option<String>,
}

/// Pull the non-empty `id` out of a state or config payload.
pub(crate) fn state_id(value: &Value) -> Result<String, ProviderError> {
    if value.is_null() {
        return Err(ProviderError::InvalidRequest(
            "missing resource state".to_string(),
        ));
    }
    let StateId { id } = StateId::deserialize(value)?;
    id.filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::InvalidRequest("missing resource id".to_string()))
}

pub(crate) fn decode<M: DeserializeOwned>(value: Value) -> Result<M, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

fn encode<T: ManagedResource>(model: &T::Model) -> Result<Value, ProviderError> {
    serde_json::to_value(model).map_err(|e| ProviderError::conversion(T::OBJECT, e.to_string()))
}
