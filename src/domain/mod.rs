mod container;
pub mod hooks;
pub mod traits;

pub use container::{ContainerState, ExecResult, PortSpec, Protocol, Timeout};
pub use hooks::{
    Continuation, CopyPair, ExportCondition, ExportDirective, HttpAttempt, HttpMethod, HttpWait,
    PortWait, ProcessWait, ServiceConfiguration,
};
pub use traits::{ComposeRuntime, ContainerHandle, ServiceResolver};
