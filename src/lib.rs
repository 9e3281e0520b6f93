pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod wait;

// Shared with integration tests
pub mod test_support;

pub use domain::{
    ComposeRuntime, ContainerHandle, ContainerState, HttpWait, PortSpec, ServiceResolver, Timeout,
};
pub use error::{HookError, Result};
pub use infra::DockerCompose;
pub use services::{CompositeService, HookDispatcher, HooksBuilder, LifecycleState};
