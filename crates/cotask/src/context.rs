//! Per-execution context threaded through a task chain

use std::any::Any;
use std::fmt::{self, Display};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BoxError;

/// Type-erased value stored in an [`ExecutionContext`]
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Unique identifier for one execution of a task chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of an entry in an [`ExecutionContext`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKey {
    /// The object that raised the work (a control, a command binder)
    Source,
    /// The object the work is performed on
    Target,
    /// Payload of the event that triggered the work
    EventData,
    /// Any producer-defined key
    Custom(String),
}

impl ContextKey {
    pub fn as_str(&self) -> &str {
        match self {
            ContextKey::Source => "source",
            ContextKey::Target => "target",
            ContextKey::EventData => "event-data",
            ContextKey::Custom(name) => name,
        }
    }
}

impl Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ContextKey {
    fn from(name: &str) -> Self {
        match name {
            "source" => ContextKey::Source,
            "target" => ContextKey::Target,
            "event-data" => ContextKey::EventData,
            other => ContextKey::Custom(other.to_string()),
        }
    }
}

impl From<String> for ContextKey {
    fn from(name: String) -> Self {
        match ContextKey::from(name.as_str()) {
            ContextKey::Custom(_) => ContextKey::Custom(name),
            known => known,
        }
    }
}

/// Capability invoked before every task the engine starts
///
/// This is the seam where collaborators plug in service injection or
/// validation. An error prevents the task from starting and is reported as the
/// task's failure.
pub trait ExecutionHook: Send + Sync {
    fn before_execute(&self, task_name: &str, context: &ExecutionContext) -> Result<(), BoxError>;
}

impl<F> ExecutionHook for F
where
    F: Fn(&str, &ExecutionContext) -> Result<(), BoxError> + Send + Sync,
{
    fn before_execute(&self, task_name: &str, context: &ExecutionContext) -> Result<(), BoxError> {
        self(task_name, context)
    }
}

/// Mutable key/value bag shared by every task of one chain
///
/// Cloning yields another handle to the same entries, so a mutation made by
/// one step is visible to every later step. A context belongs to a single
/// execution and is not meant to be reused for an unrelated one.
#[derive(Clone)]
pub struct ExecutionContext {
    id: ContextId,
    entries: Arc<DashMap<ContextKey, ContextValue>>,
    hook: Option<Arc<dyn ExecutionHook>>,
}

impl ExecutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            id: ContextId::new(),
            entries: Arc::new(DashMap::new()),
            hook: None,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Builder-style insert
    pub fn with<K, V>(self, key: K, value: V) -> Self
    where
        K: Into<ContextKey>,
        V: Any + Send + Sync,
    {
        self.insert(key, value);
        self
    }

    pub fn with_source<V: Any + Send + Sync>(self, source: V) -> Self {
        self.with(ContextKey::Source, source)
    }

    pub fn with_target<V: Any + Send + Sync>(self, target: V) -> Self {
        self.with(ContextKey::Target, target)
    }

    pub fn with_event_data<V: Any + Send + Sync>(self, event_data: V) -> Self {
        self.with(ContextKey::EventData, event_data)
    }

    /// Insert or overwrite an entry, returning the previous value
    pub fn insert<K, V>(&self, key: K, value: V) -> Option<ContextValue>
    where
        K: Into<ContextKey>,
        V: Any + Send + Sync,
    {
        self.entries.insert(key.into(), Arc::new(value))
    }

    /// Get a typed copy of an entry; `None` if missing or of another type
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: impl Into<ContextKey>) -> Option<T> {
        let key: ContextKey = key.into();
        self.entries.get(&key)?.downcast_ref::<T>().cloned()
    }

    /// Get the type-erased entry
    pub fn get_raw(&self, key: impl Into<ContextKey>) -> Option<ContextValue> {
        let key: ContextKey = key.into();
        self.entries.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: impl Into<ContextKey>) -> Option<ContextValue> {
        let key: ContextKey = key.into();
        self.entries.remove(&key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: impl Into<ContextKey>) -> bool {
        let key: ContextKey = key.into();
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<ContextKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn source<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.get(ContextKey::Source)
    }

    pub fn set_source<V: Any + Send + Sync>(&self, source: V) -> Option<ContextValue> {
        self.insert(ContextKey::Source, source)
    }

    pub fn target<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.get(ContextKey::Target)
    }

    pub fn set_target<V: Any + Send + Sync>(&self, target: V) -> Option<ContextValue> {
        self.insert(ContextKey::Target, target)
    }

    pub fn event_data<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.get(ContextKey::EventData)
    }

    pub fn set_event_data<V: Any + Send + Sync>(&self, event_data: V) -> Option<ContextValue> {
        self.insert(ContextKey::EventData, event_data)
    }

    /// Attach the pre-execution hook carried down the chain
    pub(crate) fn set_hook(&mut self, hook: Option<Arc<dyn ExecutionHook>>) {
        if hook.is_some() {
            self.hook = hook;
        }
    }

    pub(crate) fn run_hook(&self, task_name: &str) -> Result<(), BoxError> {
        match &self.hook {
            Some(hook) => hook.before_execute(task_name, self),
            None => Ok(()),
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("keys", &self.keys())
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}
