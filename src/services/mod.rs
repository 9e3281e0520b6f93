mod dispatcher;
mod orchestrator;
mod registry;

pub use dispatcher::{Hook, HookAction, HookDispatcher, LifecycleState};
pub use orchestrator::{CompositeService, GroupState};
pub use registry::{ConfigurationRegistry, HooksBuilder};
