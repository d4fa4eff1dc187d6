//! In-memory store for tests
//!
//! Behaves like the API server for the calls the operator makes: creates
//! collide with `AlreadyExists`, updates carrying a stale resourceVersion
//! fail with `Conflict`, and status patches are applied as JSON merge
//! patches. Reads snapshot the object and then yield, so two joined futures
//! interleave the way two concurrent passes would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;

use super::{ChildStore, ClusterStore};
use crate::crd::{Cluster, Component};
use crate::Error;

type Key = (String, String, String);

#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<Key, Value>>,
    next_version: AtomicUsize,
    creates: AtomicUsize,
    updates: AtomicUsize,
    status_patches: AtomicUsize,
    stale_updates: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a Cluster
    pub(crate) fn insert_cluster(&self, cluster: &Cluster) {
        self.insert(cluster);
    }

    /// Seed the store with a child as if another writer created it
    pub(crate) fn insert_child<K: Component>(&self, child: &K) {
        self.insert(child);
    }

    /// Fail the next `n` updates with a conflict, as if another writer won
    pub(crate) fn fail_updates_with_conflict(&self, n: usize) {
        self.stale_updates.store(n, Ordering::SeqCst);
    }

    pub(crate) fn cluster(&self, namespace: &str, name: &str) -> Option<Cluster> {
        self.read(&key::<Cluster>(namespace, name))
    }

    pub(crate) fn child<K: Component>(&self, namespace: &str, name: &str) -> Option<K> {
        self.read(&key::<K>(namespace, name))
    }

    pub(crate) fn count<K: Component>(&self) -> usize {
        let kind = K::kind_name();
        self.lock().keys().filter(|(k, _, _)| *k == kind).count()
    }

    pub(crate) fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub(crate) fn status_patches(&self) -> usize {
        self.status_patches.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Key, Value>> {
        self.objects.lock().unwrap()
    }

    fn bump_version(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn insert<K: kube::Resource<DynamicType = ()> + serde::Serialize>(&self, obj: &K) {
        let mut value = serde_json::to_value(obj).unwrap();
        value["metadata"]["resourceVersion"] = Value::String(self.bump_version());
        let k = (
            K::kind(&()).into_owned(),
            obj.namespace().unwrap_or_default(),
            obj.name_any(),
        );
        self.lock().insert(k, value);
    }

    fn read<T: serde::de::DeserializeOwned>(&self, k: &Key) -> Option<T> {
        self.lock()
            .get(k)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }
}

fn key<K: kube::Resource<DynamicType = ()>>(namespace: &str, name: &str) -> Key {
    (
        K::kind(&()).into_owned(),
        namespace.to_string(),
        name.to_string(),
    )
}

/// Apply an RFC 7386 JSON merge patch
pub(crate) fn apply_merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(map) = target {
                for (field, value) in fields {
                    if value.is_null() {
                        map.remove(field);
                    } else {
                        apply_merge_patch(map.entry(field.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, Error> {
        let snapshot = self.cluster(namespace, name);
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), Error> {
        self.status_patches.fetch_add(1, Ordering::SeqCst);
        let version = self.bump_version();
        let mut objects = self.lock();
        let current = objects
            .get_mut(&key::<Cluster>(namespace, name))
            .ok_or_else(|| Error::not_found("Cluster", format!("{namespace}/{name}")))?;
        apply_merge_patch(
            current,
            &serde_json::json!({ "status": patch, "metadata": { "resourceVersion": version } }),
        );
        Ok(())
    }
}

#[async_trait]
impl<K: Component> ChildStore<K> for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        let snapshot = self.child::<K>(namespace, name);
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn create(&self, namespace: &str, child: &K) -> Result<K, Error> {
        let k = key::<K>(namespace, &child.name_any());
        let mut value = serde_json::to_value(child).unwrap();
        value["metadata"]["resourceVersion"] = Value::String(self.bump_version());
        let mut objects = self.lock();
        if objects.contains_key(&k) {
            return Err(Error::already_exists(K::kind_name(), format!("{namespace}/{}", k.2)));
        }
        objects.insert(k, value.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn update(&self, namespace: &str, child: &K) -> Result<K, Error> {
        let name = child.name_any();
        let k = key::<K>(namespace, &name);
        let conflict = || Error::conflict(K::kind_name(), format!("{namespace}/{name}"));

        if self
            .stale_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            // Another writer bumped the object underneath us.
            let version = self.bump_version();
            if let Some(current) = self.lock().get_mut(&k) {
                current["metadata"]["resourceVersion"] = Value::String(version);
            }
            return Err(conflict());
        }

        let version = self.bump_version();
        let mut objects = self.lock();
        let current = objects
            .get(&k)
            .ok_or_else(|| Error::not_found(K::kind_name(), format!("{namespace}/{name}")))?;
        if current["metadata"]["resourceVersion"].as_str() != child.resource_version().as_deref()
        {
            return Err(conflict());
        }
        let mut value = serde_json::to_value(child).unwrap();
        value["metadata"]["resourceVersion"] = Value::String(version);
        objects.insert(k, value.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(value).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::App;

    #[test]
    fn merge_patch_replaces_and_removes_fields() {
        let mut target = serde_json::json!({ "a": 1, "b": { "c": 2, "d": 3 } });
        apply_merge_patch(&mut target, &serde_json::json!({ "b": { "c": null, "e": 4 } }));
        assert_eq!(target, serde_json::json!({ "a": 1, "b": { "d": 3, "e": 4 } }));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let mut app = App::build("app-demo", "v1");
        app.metadata.namespace = Some("default".into());
        let created = ChildStore::<App>::create(&store, "default", &app).await.unwrap();

        let mut first = created.clone();
        first.set_image("v2");
        ChildStore::<App>::update(&store, "default", &first).await.unwrap();

        let mut stale = created;
        stale.set_image("v3");
        let err = ChildStore::<App>::update(&store, "default", &stale).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
