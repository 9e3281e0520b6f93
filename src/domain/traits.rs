use super::container::{ContainerState, ExecResult, PortSpec, Timeout};
use super::hooks::HttpWait;
use crate::wait;
use anyhow::Result;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// A live container inside a composite service
pub trait ContainerHandle: Send + Sync + Debug {
    /// Engine identifier of the container
    fn id(&self) -> &str;

    /// Service name used for hook resolution
    fn name(&self) -> &str;

    /// Get the current state of the container
    fn state(&self) -> Result<ContainerState>;

    /// Copy a host file or directory into the container
    fn copy_to(&self, container_path: &str, host_path: &Path) -> Result<()>;

    /// Copy a container file or directory out to the host
    fn copy_from(&self, container_path: &str, host_path: &Path) -> Result<()>;

    /// Execute a command inside the container and wait for it to exit
    fn execute(&self, command: &str) -> Result<ExecResult>;

    /// Export the container filesystem, as a tar archive or exploded into a directory
    fn export(&self, host_path: &Path, explode: bool) -> Result<()>;

    /// Host-visible address of a container port, `None` while it is not mapped
    fn host_endpoint(&self, port: &PortSpec) -> Result<Option<SocketAddr>>;

    /// Commands of the processes currently running in the container
    fn processes(&self) -> Result<Vec<String>>;

    /// Block until the port accepts connections or the timeout elapses
    fn wait_for_port(&self, port: &PortSpec, timeout: Timeout) -> crate::error::Result<()> {
        wait::port(self, port, timeout)
    }

    /// Block until the HTTP condition holds, returning the last response body
    fn wait_for_http(&self, http: &HttpWait) -> crate::error::Result<String> {
        wait::http(http)
    }

    /// Block until a process with the given name shows up
    fn wait_for_process(&self, process: &str, timeout: Timeout) -> crate::error::Result<()> {
        wait::process(self, process, timeout)
    }
}

/// Drives the container group through its external lifecycle
pub trait ComposeRuntime: Send + Sync + Debug {
    /// Create the group's containers without starting them
    fn create(&self) -> Result<()>;

    /// Start the group's containers
    fn start(&self) -> Result<()>;

    /// Stop the group's containers
    fn stop(&self) -> Result<()>;

    /// Stop and remove the group
    fn down(&self) -> Result<()>;

    /// Handles for every container currently in the group
    fn containers(&self) -> Result<Vec<Arc<dyn ContainerHandle>>>;
}

/// Name-based lookup of live containers, performed when hooks fire
pub trait ServiceResolver {
    fn resolve(&self, service: &str) -> Option<Arc<dyn ContainerHandle>>;
}
