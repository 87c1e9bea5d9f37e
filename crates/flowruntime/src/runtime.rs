use crate::loader;
use crate::manager::NodeManager;
use crate::registry::NodeRegistry;
use flowcore::{EventBus, ExecutionEvent, FlowError, Flowchart, Globals};
use std::path::Path;
use std::sync::Arc;

/// Bundles the node registry, event bus and configuration shared by the
/// managers it creates
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a runtime with default settings
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(Arc::new(registry), RuntimeConfig::default())
    }

    /// Create a runtime over a pre-configured registry
    pub fn with_config(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// An empty manager publishing on this runtime's event bus
    pub fn new_manager(&self) -> NodeManager {
        let mut manager = NodeManager::new(Arc::clone(&self.registry)).with_events(Arc::clone(&self.event_bus));
        manager.inherit_globals(&self.config.globals);
        manager
    }

    /// Build a manager from a description. Runtime globals override the description's.
    pub fn load(&self, flowchart: &Flowchart) -> Result<NodeManager, FlowError> {
        let mut manager = self.new_manager();
        loader::load_flowchart(&mut manager, flowchart)?;
        Ok(manager)
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<NodeManager, FlowError> {
        let flowchart = loader::read_flowchart(path)?;
        self.load(&flowchart)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Globals set on every manager, e.g. from the command line
    pub globals: Globals,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            globals: Globals::new(),
        }
    }
}
