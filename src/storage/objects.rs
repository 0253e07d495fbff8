//! Object (blob) storage seam

use crate::utils::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Visibility of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Public,
    Private,
}

/// A stored blob with its metadata
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub acl: ObjectAcl,
}

/// put/get blob storage addressed by opaque references
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob and return its internal reference (an `/objects/…` path)
    async fn put(&self, bytes: Bytes, content_type: &str, acl: ObjectAcl) -> Result<String>;
    async fn get(&self, reference: &str) -> Result<Option<StoredObject>>;
}

/// In-memory reference implementation
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bytes: Bytes, content_type: &str, acl: ObjectAcl) -> Result<String> {
        let reference = format!("/objects/uploads/{}", Uuid::new_v4());
        self.objects.write().await.insert(
            reference.clone(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                acl,
            },
        );
        Ok(reference)
    }

    async fn get(&self, reference: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.read().await.get(reference).cloned())
    }
}
