pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::notification::Notification;
use crate::models::shipment::Shipment;
use crate::models::task::RiderTask;
use crate::models::vehicle::Vehicle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Collection {
    Shipments,
    RiderTasks,
    Vehicles,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Shipments,
        Collection::RiderTasks,
        Collection::Vehicles,
        Collection::Notifications,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Shipments => "shipments",
            Collection::RiderTasks => "rider_tasks",
            Collection::Vehicles => "vehicles",
            Collection::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored document plus the version its next conditional write must name.
#[derive(Debug, Clone, Serialize)]
pub struct RawRecord {
    pub id: Uuid,
    pub version: u64,
    pub body: Value,
}

/// Top-level field predicate evaluated against the JSON body. A field that
/// is absent compares as JSON null.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq { field: &'static str, value: Value },
    Ne { field: &'static str, value: Value },
}

impl Predicate {
    pub fn eq(field: &'static str, value: Value) -> Self {
        Predicate::Eq { field, value }
    }

    pub fn ne(field: &'static str, value: Value) -> Self {
        Predicate::Ne { field, value }
    }

    pub fn matches(&self, body: &Value) -> bool {
        match self {
            Predicate::Eq { field, value } => {
                body.get(field).unwrap_or(&Value::Null) == value
            }
            Predicate::Ne { field, value } => {
                body.get(field).unwrap_or(&Value::Null) != value
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub record: RawRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {id} already exists in {collection}")]
    AlreadyExists { collection: Collection, id: Uuid },

    #[error("record {id} not found in {collection}")]
    NotFound { collection: Collection, id: Uuid },

    #[error("version conflict on {collection}/{id}: expected {expected}, found {found}")]
    VersionConflict {
        collection: Collection,
        id: Uuid,
        expected: u64,
        found: u64,
    },
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { .. } => {
                DispatchError::ConcurrentModification(err.to_string())
            }
            StoreError::NotFound { .. } => DispatchError::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } => DispatchError::Internal(err.to_string()),
        }
    }
}

/// Abstract document store consumed by the dispatch core. One implementation
/// is chosen at startup and injected; the core never picks stores at runtime.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<RawRecord>, StoreError>;

    async fn query(
        &self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> Result<Vec<RawRecord>, StoreError>;

    async fn create(&self, collection: Collection, record: RawRecord) -> Result<(), StoreError>;

    /// Conditional write: merges the patch's top-level keys into the body
    /// only when the stored version still equals `expected_version`.
    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        expected_version: u64,
        patch: Value,
    ) -> Result<RawRecord, StoreError>;

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent>;
}

/// A model that lives in a gateway collection.
pub trait Persisted: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn record_id(&self) -> Uuid;
}

impl Persisted for Shipment {
    const COLLECTION: Collection = Collection::Shipments;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

impl Persisted for RiderTask {
    const COLLECTION: Collection = Collection::RiderTasks;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

impl Persisted for Vehicle {
    const COLLECTION: Collection = Collection::Vehicles;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

impl Persisted for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Typed access over the raw gateway. All engine code goes through here so
/// the JSON plumbing stays in one place.
#[derive(Clone)]
pub struct Repository {
    gateway: Arc<dyn PersistenceGateway>,
}

impl Repository {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    pub async fn fetch<T: Persisted>(&self, id: Uuid) -> Result<Option<Versioned<T>>, DispatchError> {
        let record = self.gateway.get(T::COLLECTION, id).await?;
        record.map(decode).transpose()
    }

    pub async fn find<T: Persisted>(
        &self,
        predicates: &[Predicate],
    ) -> Result<Vec<Versioned<T>>, DispatchError> {
        let records = self.gateway.query(T::COLLECTION, predicates).await?;
        records.into_iter().map(decode).collect()
    }

    pub async fn insert<T: Persisted>(&self, value: &T) -> Result<(), DispatchError> {
        let record = RawRecord {
            id: value.record_id(),
            version: 0,
            body: encode(value)?,
        };
        self.gateway.create(T::COLLECTION, record).await?;
        Ok(())
    }

    /// Full-document conditional write keyed on the version the caller read.
    pub async fn save<T: Persisted>(
        &self,
        expected_version: u64,
        value: &T,
    ) -> Result<Versioned<T>, DispatchError> {
        let record = self
            .gateway
            .update(T::COLLECTION, value.record_id(), expected_version, encode(value)?)
            .await?;
        decode(record)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value)
        .map_err(|err| DispatchError::Internal(format!("encode record: {err}")))
}

fn decode<T: DeserializeOwned>(record: RawRecord) -> Result<Versioned<T>, DispatchError> {
    let value = serde_json::from_value(record.body)
        .map_err(|err| DispatchError::Internal(format!("decode record {}: {err}", record.id)))?;
    Ok(Versioned {
        version: record.version,
        value,
    })
}
