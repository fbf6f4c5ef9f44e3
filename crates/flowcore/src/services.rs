//! Collaborators handed to activity executors through their context.

use crate::{ActivityError, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type ResourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Workflow resource storage.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn resource(&self, path: &Path) -> io::Result<ResourceStream>;

    async fn resource_file(&self, path: &Path) -> io::Result<PathBuf>;

    async fn save_resource(&self, path: &Path, content: &[u8]) -> io::Result<PathBuf>;
}

/// Resources stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsResourceProvider {
    root: PathBuf,
}

impl FsResourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resource paths are relative and may not leave the root.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("resource path {} is outside the resource root", path.display()),
            ));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ResourceProvider for FsResourceProvider {
    async fn resource(&self, path: &Path) -> io::Result<ResourceStream> {
        let file = tokio::fs::File::open(self.resolve(path)?).await?;
        Ok(Box::new(file))
    }

    async fn resource_file(&self, path: &Path) -> io::Result<PathBuf> {
        let full = self.resolve(path)?;
        tokio::fs::metadata(&full).await?;
        Ok(full)
    }

    async fn save_resource(&self, path: &Path, content: &[u8]) -> io::Result<PathBuf> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(full)
    }
}

/// Messaging client used by activities to talk to chat streams.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends `content` to `stream_id` and returns the new message id.
    async fn send_message(&self, stream_id: &str, content: &str) -> Result<String, ActivityError>;
}

/// Gateway that only logs outgoing messages.
#[derive(Debug, Default, Clone)]
pub struct LogMessagingGateway;

#[async_trait]
impl MessagingGateway for LogMessagingGateway {
    async fn send_message(&self, stream_id: &str, content: &str) -> Result<String, ActivityError> {
        let message_id = Uuid::new_v4().to_string();
        tracing::info!(stream_id, message_id = %message_id, "Sending message: {}", content);
        Ok(message_id)
    }
}

/// Data shared across instances and workflows, grouped by namespace.
#[async_trait]
pub trait SharedDataStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    async fn put(&self, namespace: &str, key: &str, value: Value);

    async fn namespace(&self, namespace: &str) -> HashMap<String, Value>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySharedDataStore {
    data: Arc<RwLock<HashMap<String, HashMap<String, Value>>>>,
}

impl InMemorySharedDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedDataStore for InMemorySharedDataStore {
    async fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.data
            .read()
            .await
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    async fn put(&self, namespace: &str, key: &str, value: Value) {
        self.data
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    async fn namespace(&self, namespace: &str) -> HashMap<String, Value> {
        self.data
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }
}

/// Collaborator handles forwarded into every activity context.
#[derive(Clone)]
pub struct ExecutorServices {
    pub resources: Arc<dyn ResourceProvider>,
    pub messaging: Arc<dyn MessagingGateway>,
    pub shared_data: Arc<dyn SharedDataStore>,
}

impl ExecutorServices {
    pub fn new(
        resources: Arc<dyn ResourceProvider>,
        messaging: Arc<dyn MessagingGateway>,
        shared_data: Arc<dyn SharedDataStore>,
    ) -> Self {
        Self {
            resources,
            messaging,
            shared_data,
        }
    }
}
