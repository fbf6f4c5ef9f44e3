use crate::events::EventHolder;
use crate::services::{ExecutorServices, MessagingGateway, ResourceStream, SharedDataStore};
use crate::variable::{output_variable_name, Variable, OUTPUTS};
use crate::{ActivityError, Value};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// View of a running instance at one step, owned by the execution backend.
#[async_trait]
pub trait RunningInstance: Send + Sync {
    fn process_instance_id(&self) -> &str;

    fn process_definition_id(&self) -> &str;

    /// Id of this execution of the current activity.
    fn activity_instance_id(&self) -> &str;

    fn current_activity_id(&self) -> &str;

    async fn variable(&self, name: &str) -> Option<Variable>;

    async fn variables(&self) -> HashMap<String, Variable>;

    async fn set_variable(&self, name: &str, value: Variable);
}

/// Implementation of one activity kind.
///
/// `Config` is the activity's typed configuration; the dispatcher decodes the
/// stored configuration into it before every invocation.
#[async_trait]
pub trait ActivityExecutor: Send + Sync + 'static {
    type Config: DeserializeOwned + Send + Sync + 'static;

    async fn execute(&self, ctx: &ActivityContext<Self::Config>) -> Result<(), ActivityError>;
}

/// Capabilities handed to an executor for a single invocation.
pub struct ActivityContext<C> {
    instance: Arc<dyn RunningInstance>,
    activity_id: String,
    activity: C,
    event: Option<EventHolder>,
    services: ExecutorServices,
}

impl<C> ActivityContext<C> {
    pub fn new(
        instance: Arc<dyn RunningInstance>,
        activity_id: impl Into<String>,
        activity: C,
        event: Option<EventHolder>,
        services: ExecutorServices,
    ) -> Self {
        Self {
            instance,
            activity_id: activity_id.into(),
            activity,
            event,
            services,
        }
    }

    pub fn activity(&self) -> &C {
        &self.activity
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    /// Event that triggered the current branch, if any.
    pub fn event(&self) -> Option<&EventHolder> {
        self.event.as_ref()
    }

    pub fn process_instance_id(&self) -> &str {
        self.instance.process_instance_id()
    }

    pub fn current_activity_id(&self) -> &str {
        self.instance.current_activity_id()
    }

    /// Records outputs of this activity.
    ///
    /// Every call writes twice: the bulk `{"outputs": {..}}` object under the
    /// activity id, merged with earlier outputs, and one flattened
    /// `<activity>.outputs.<key>` variable per entry. Scalars are flattened
    /// natively, everything else as serialized JSON.
    pub async fn set_output_variables(
        &self,
        outputs: HashMap<String, Value>,
    ) -> Result<(), ActivityError> {
        let mut all_outputs = self.recorded_outputs().await;
        all_outputs.extend(outputs.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut bulk = HashMap::new();
        bulk.insert(OUTPUTS.to_string(), Value::Object(all_outputs));
        let bulk = Variable::json(&bulk)?;

        let mut flattened = Vec::with_capacity(outputs.len());
        for (key, value) in outputs {
            flattened.push((output_variable_name(&self.activity_id, &key), Variable::from_value(value)?));
        }

        self.instance.set_variable(&self.activity_id, bulk).await;
        for (name, variable) in flattened {
            self.instance.set_variable(&name, variable).await;
        }
        Ok(())
    }

    pub async fn set_output_variable(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ActivityError> {
        let mut outputs = HashMap::new();
        outputs.insert(name.into(), value.into());
        self.set_output_variables(outputs).await
    }

    /// Snapshot of every visible variable. Changing it has no effect on the
    /// instance.
    pub async fn variables(&self) -> HashMap<String, Variable> {
        self.instance.variables().await
    }

    pub async fn variable(&self, name: &str) -> Option<Variable> {
        self.instance.variable(name).await
    }

    pub async fn require_variable(&self, name: &str) -> Result<Variable, ActivityError> {
        self.variable(name)
            .await
            .ok_or_else(|| ActivityError::MissingVariable(name.to_string()))
    }

    pub fn bdk(&self) -> &dyn MessagingGateway {
        self.services.messaging.as_ref()
    }

    pub fn shared_data_store(&self) -> &dyn SharedDataStore {
        self.services.shared_data.as_ref()
    }

    pub async fn resource(&self, path: &Path) -> io::Result<ResourceStream> {
        self.services.resources.resource(path).await
    }

    pub async fn resource_file(&self, path: &Path) -> io::Result<PathBuf> {
        self.services.resources.resource_file(path).await
    }

    pub async fn save_resource(&self, path: &Path, content: &[u8]) -> io::Result<PathBuf> {
        self.services.resources.save_resource(path, content).await
    }

    async fn recorded_outputs(&self) -> HashMap<String, Value> {
        let Some(existing) = self.instance.variable(&self.activity_id).await else {
            return HashMap::new();
        };
        match existing.decode::<HashMap<String, HashMap<String, Value>>>() {
            Ok(mut bulk) => bulk.remove(OUTPUTS).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }
}
