use async_trait::async_trait;
use dashmap::DashMap;
use flowcore::{
    ActivityContext, ActivityError, ActivityExecutor, EventHolder, ExecutorServices, FlowError,
    RunningInstance,
};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Whether one executor instance serves every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Created once on first use, then reused.
    Shared,
    /// Constructed fresh for each invocation.
    PerInvocation,
}

/// Everything an executor needs besides its configuration.
pub struct InvocationParts {
    pub instance: Arc<dyn RunningInstance>,
    pub activity_id: String,
    pub event: Option<EventHolder>,
    pub services: ExecutorServices,
}

/// Executor with its configuration type erased.
pub trait ErasedExecutor: Send + Sync {
    /// Decodes `config` into the executor's declared configuration type and
    /// binds it to a fresh context.
    fn prepare(
        self: Arc<Self>,
        config: serde_json::Value,
        parts: InvocationParts,
    ) -> Result<Box<dyn PreparedActivity>, serde_json::Error>;
}

/// An executor bound to its context, ready to run.
#[async_trait]
pub trait PreparedActivity: Send {
    async fn execute(self: Box<Self>) -> Result<(), ActivityError>;
}

struct Prepared<E: ActivityExecutor> {
    executor: Arc<E>,
    context: ActivityContext<E::Config>,
}

#[async_trait]
impl<E: ActivityExecutor> PreparedActivity for Prepared<E> {
    async fn execute(self: Box<Self>) -> Result<(), ActivityError> {
        self.executor.execute(&self.context).await
    }
}

impl<E: ActivityExecutor> ErasedExecutor for E {
    fn prepare(
        self: Arc<Self>,
        config: serde_json::Value,
        parts: InvocationParts,
    ) -> Result<Box<dyn PreparedActivity>, serde_json::Error> {
        let activity: E::Config = serde_json::from_value(config)?;
        let context = ActivityContext::new(
            parts.instance,
            parts.activity_id,
            activity,
            parts.event,
            parts.services,
        );
        Ok(Box::new(Prepared {
            executor: self,
            context,
        }))
    }
}

/// Factory trait for creating executor instances
pub trait ExecutorFactory: Send + Sync {
    /// Activity kind handled, e.g. `send-message`
    fn kind(&self) -> &str;

    /// Stable implementation identifier stored in the executable graph
    fn implementation(&self) -> &str;

    fn sharing(&self) -> Sharing {
        Sharing::PerInvocation
    }

    fn create(&self) -> Arc<dyn ErasedExecutor>;

    /// Checks a configuration against the executor's configuration type
    fn validate_config(&self, config: &serde_json::Value) -> Result<(), serde_json::Error>;

    /// Optional: Get executor metadata
    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// Metadata about an activity kind
#[derive(Debug, Clone)]
pub struct ExecutorMetadata {
    pub description: String,
    pub category: String,
}

impl Default for ExecutorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Factory for executors with a no-argument constructor.
pub struct TypedExecutorFactory<E> {
    kind: String,
    implementation: &'static str,
    sharing: Sharing,
    metadata: ExecutorMetadata,
    _executor: PhantomData<fn() -> E>,
}

impl<E: ActivityExecutor + Default> TypedExecutorFactory<E> {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            implementation: std::any::type_name::<E>(),
            sharing: Sharing::PerInvocation,
            metadata: ExecutorMetadata::default(),
            _executor: PhantomData,
        }
    }

    pub fn shared(mut self) -> Self {
        self.sharing = Sharing::Shared;
        self
    }

    pub fn describe(mut self, description: impl Into<String>, category: impl Into<String>) -> Self {
        self.metadata = ExecutorMetadata {
            description: description.into(),
            category: category.into(),
        };
        self
    }
}

impl<E: ActivityExecutor + Default> ExecutorFactory for TypedExecutorFactory<E> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn implementation(&self) -> &str {
        self.implementation
    }

    fn sharing(&self) -> Sharing {
        self.sharing
    }

    fn create(&self) -> Arc<dyn ErasedExecutor> {
        Arc::new(E::default())
    }

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<E::Config>(config.clone()).map(|_| ())
    }

    fn metadata(&self) -> ExecutorMetadata {
        self.metadata.clone()
    }
}

/// Registry of available activity kinds
pub struct ExecutorRegistry {
    factories: HashMap<String, Arc<dyn ExecutorFactory>>,
    kinds: HashMap<String, String>,
    shared: DashMap<String, Arc<dyn ErasedExecutor>>,
    collisions: Vec<String>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            kinds: HashMap::new(),
            shared: DashMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Register an executor factory.
    ///
    /// A kind or implementation registered twice keeps its first
    /// registration and is reported by [`check`](Self::check).
    pub fn register(&mut self, factory: Arc<dyn ExecutorFactory>) {
        self.admit(factory);
    }

    /// Register an already constructed executor, reused for every invocation.
    pub fn register_instance<E: ActivityExecutor>(&mut self, kind: impl Into<String>, executor: Arc<E>) {
        let factory = Arc::new(InstanceFactory {
            kind: kind.into(),
            executor: executor.clone(),
        });
        let implementation = factory.implementation().to_string();
        if self.admit(factory) {
            self.shared
                .insert(implementation, executor as Arc<dyn ErasedExecutor>);
        }
    }

    fn admit(&mut self, factory: Arc<dyn ExecutorFactory>) -> bool {
        let kind = factory.kind().to_string();
        let implementation = factory.implementation().to_string();

        let collision = if self.kinds.contains_key(&kind) {
            Some(format!(
                "executor collision: activity kind {} is registered more than once",
                kind
            ))
        } else {
            self.kinds
                .iter()
                .find(|(_, registered)| **registered == implementation)
                .map(|(existing, _)| {
                    format!(
                        "executor collision: {} is registered for kinds {} and {}",
                        implementation, existing, kind
                    )
                })
        };
        if let Some(collision) = collision {
            tracing::warn!("{}", collision);
            self.collisions.push(collision);
            return false;
        }

        tracing::info!("Registering activity kind: {} ({})", kind, implementation);
        self.kinds.insert(kind, implementation.clone());
        self.factories.insert(implementation, factory);
        true
    }

    /// Fails when any registration collided with an earlier one.
    pub fn check(&self) -> Result<(), FlowError> {
        if self.collisions.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Configuration(self.collisions.join("; ")))
        }
    }

    /// Factory registered for an activity kind
    pub fn factory_for_kind(&self, kind: &str) -> Option<&Arc<dyn ExecutorFactory>> {
        self.kinds.get(kind).and_then(|imp| self.factories.get(imp))
    }

    /// Resolve the executor for an implementation identifier.
    ///
    /// Shared instances are looked up first; shared factories construct their
    /// instance at most once, other factories build a new executor per call.
    pub fn resolve(&self, implementation: &str) -> Result<Arc<dyn ErasedExecutor>, FlowError> {
        if let Some(executor) = self.shared.get(implementation) {
            return Ok(executor.clone());
        }

        let factory = self.factories.get(implementation).ok_or_else(|| {
            FlowError::Configuration(format!("No executor registered as {}", implementation))
        })?;

        match factory.sharing() {
            Sharing::Shared => Ok(self
                .shared
                .entry(implementation.to_string())
                .or_insert_with(|| factory.create())
                .clone()),
            Sharing::PerInvocation => Ok(factory.create()),
        }
    }

    /// Get all registered activity kinds
    pub fn list_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Get metadata for an activity kind
    pub fn get_metadata(&self, kind: &str) -> Option<ExecutorMetadata> {
        self.factory_for_kind(kind).map(|f| f.metadata())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct InstanceFactory<E> {
    kind: String,
    executor: Arc<E>,
}

impl<E: ActivityExecutor> ExecutorFactory for InstanceFactory<E> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn implementation(&self) -> &str {
        std::any::type_name::<E>()
    }

    fn sharing(&self) -> Sharing {
        Sharing::Shared
    }

    fn create(&self) -> Arc<dyn ErasedExecutor> {
        self.executor.clone()
    }

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), serde_json::Error> {
        serde_json::from_value::<E::Config>(config.clone()).map(|_| ())
    }
}
