use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::store::{
    ChangeEvent, ChangeKind, Collection, Predicate, PersistenceGateway, RawRecord, StoreError,
};

/// In-process gateway: one concurrent map and one change channel per
/// collection. Lagging subscribers drop events, which the change-feed
/// contract allows.
pub struct MemoryGateway {
    collections: HashMap<Collection, DashMap<Uuid, RawRecord>>,
    changes: HashMap<Collection, broadcast::Sender<ChangeEvent>>,
}

impl MemoryGateway {
    pub fn new(event_buffer_size: usize) -> Self {
        let mut collections = HashMap::new();
        let mut changes = HashMap::new();

        for collection in Collection::ALL {
            collections.insert(collection, DashMap::new());
            let (tx, _unused_rx) = broadcast::channel(event_buffer_size);
            changes.insert(collection, tx);
        }

        Self {
            collections,
            changes,
        }
    }

    fn records(&self, collection: Collection) -> &DashMap<Uuid, RawRecord> {
        &self.collections[&collection]
    }

    fn publish(&self, collection: Collection, kind: ChangeKind, record: RawRecord) {
        let event = ChangeEvent {
            collection,
            kind,
            record,
        };
        let _ = self.changes[&collection].send(event);
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<RawRecord>, StoreError> {
        Ok(self
            .records(collection)
            .get(&id)
            .map(|entry| entry.value().clone()))
    }

    async fn query(
        &self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> Result<Vec<RawRecord>, StoreError> {
        let matches = self
            .records(collection)
            .iter()
            .filter(|entry| predicates.iter().all(|p| p.matches(&entry.value().body)))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(matches)
    }

    async fn create(&self, collection: Collection, record: RawRecord) -> Result<(), StoreError> {
        match self.records(collection).entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                collection,
                id: record.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                self.publish(collection, ChangeKind::Created, record);
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        expected_version: u64,
        patch: Value,
    ) -> Result<RawRecord, StoreError> {
        let updated = {
            let mut entry = self
                .records(collection)
                .get_mut(&id)
                .ok_or(StoreError::NotFound { collection, id })?;

            if entry.version != expected_version {
                return Err(StoreError::VersionConflict {
                    collection,
                    id,
                    expected: expected_version,
                    found: entry.version,
                });
            }

            let record = entry.value_mut();
            merge_patch(&mut record.body, patch);
            record.version += 1;
            record.clone()
        };

        self.publish(collection, ChangeKind::Updated, updated.clone());
        Ok(updated)
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        self.changes[&collection].subscribe()
    }
}

fn merge_patch(body: &mut Value, patch: Value) {
    match (body.as_object_mut(), patch) {
        (Some(fields), Value::Object(patch_fields)) => {
            for (key, value) in patch_fields {
                fields.insert(key, value);
            }
        }
        (_, patch) => *body = patch,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::MemoryGateway;
    use crate::store::{ChangeKind, Collection, Predicate, PersistenceGateway, RawRecord};

    fn record(id: Uuid, city: &str, status: &str) -> RawRecord {
        RawRecord {
            id,
            version: 0,
            body: json!({ "city": city, "status": status }),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let gateway = MemoryGateway::new(16);
        let id = Uuid::new_v4();

        gateway
            .create(Collection::Shipments, record(id, "Springfield", "Placed"))
            .await
            .unwrap();

        let fetched = gateway.get(Collection::Shipments, id).await.unwrap().unwrap();
        assert_eq!(fetched.version, 0);
        assert_eq!(fetched.body["city"], "Springfield");
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let gateway = MemoryGateway::new(16);
        let id = Uuid::new_v4();

        gateway
            .create(Collection::Shipments, record(id, "Springfield", "Placed"))
            .await
            .unwrap();
        let err = gateway
            .create(Collection::Shipments, record(id, "Springfield", "Placed"))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn stale_version_update_fails_and_leaves_record_unchanged() {
        let gateway = MemoryGateway::new(16);
        let id = Uuid::new_v4();
        gateway
            .create(Collection::Shipments, record(id, "Springfield", "Placed"))
            .await
            .unwrap();

        gateway
            .update(Collection::Shipments, id, 0, json!({ "status": "PickupAssigned" }))
            .await
            .unwrap();

        // Second writer read version 0, record moved to 1 underneath it.
        let err = gateway
            .update(Collection::Shipments, id, 0, json!({ "status": "Picked" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("version conflict"));

        let current = gateway.get(Collection::Shipments, id).await.unwrap().unwrap();
        assert_eq!(current.version, 1);
        assert_eq!(current.body["status"], "PickupAssigned");
    }

    #[tokio::test]
    async fn query_applies_all_predicates() {
        let gateway = MemoryGateway::new(16);
        gateway
            .create(
                Collection::Shipments,
                record(Uuid::new_v4(), "Springfield", "Placed"),
            )
            .await
            .unwrap();
        gateway
            .create(
                Collection::Shipments,
                record(Uuid::new_v4(), "Springfield", "Delivered"),
            )
            .await
            .unwrap();
        gateway
            .create(Collection::Shipments, record(Uuid::new_v4(), "Gotham", "Placed"))
            .await
            .unwrap();

        let placed_in_springfield = gateway
            .query(
                Collection::Shipments,
                &[
                    Predicate::eq("city", json!("Springfield")),
                    Predicate::eq("status", json!("Placed")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(placed_in_springfield.len(), 1);

        let not_delivered = gateway
            .query(
                Collection::Shipments,
                &[Predicate::ne("status", json!("Delivered"))],
            )
            .await
            .unwrap();
        assert_eq!(not_delivered.len(), 2);
    }

    #[tokio::test]
    async fn subscribers_observe_creates_and_updates() {
        let gateway = MemoryGateway::new(16);
        let mut rx = gateway.subscribe(Collection::Vehicles);
        let id = Uuid::new_v4();

        gateway
            .create(Collection::Vehicles, record(id, "-", "Available"))
            .await
            .unwrap();
        gateway
            .update(Collection::Vehicles, id, 0, json!({ "status": "InUse" }))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Created);
        assert_eq!(first.record.id, id);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Updated);
        assert_eq!(second.record.body["status"], "InUse");
        assert_eq!(second.record.version, 1);
    }
}
