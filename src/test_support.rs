use crate::domain::{
    ComposeRuntime, ContainerHandle, ContainerState, ExecResult, PortSpec, ServiceResolver,
};
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};

type Journal = Arc<RwLock<Vec<String>>>;

/// Container double that records every engine call into a journal
#[derive(Debug)]
pub struct MockContainer {
    id: String,
    name: String,
    journal: Journal,
    state: RwLock<ContainerState>,
    exit_codes: RwLock<HashMap<String, i32>>,
    processes: RwLock<Vec<String>>,
    endpoint: RwLock<Option<SocketAddr>>,
    fail_on: RwLock<Option<String>>,
}

impl MockContainer {
    pub fn new(name: &str) -> Self {
        Self::with_journal(name, Arc::new(RwLock::new(Vec::new())))
    }

    fn with_journal(name: &str, journal: Journal) -> Self {
        Self {
            id: format!("{name}-0123456789ab"),
            name: name.to_string(),
            journal,
            state: RwLock::new(ContainerState::Running),
            exit_codes: RwLock::new(HashMap::new()),
            processes: RwLock::new(Vec::new()),
            endpoint: RwLock::new(None),
            fail_on: RwLock::new(None),
        }
    }

    /// Make `command` exit with `code`; other commands succeed
    pub fn set_exit_code(&self, command: &str, code: i32) {
        self.exit_codes
            .write()
            .unwrap()
            .insert(command.to_string(), code);
    }

    pub fn set_processes(&self, processes: &[&str]) {
        *self.processes.write().unwrap() = processes.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_endpoint(&self, addr: SocketAddr) {
        *self.endpoint.write().unwrap() = Some(addr);
    }

    pub fn set_state(&self, state: ContainerState) {
        *self.state.write().unwrap() = state;
    }

    pub fn set_fail_on(&self, operation: &str) {
        *self.fail_on.write().unwrap() = Some(operation.to_string());
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.journal.read().unwrap().clone()
    }

    fn record_command(&self, cmd: String) {
        self.journal.write().unwrap().push(cmd);
    }

    fn check_fail(&self, operation: &str) -> Result<()> {
        if let Some(ref fail_on) = *self.fail_on.read().unwrap() {
            if fail_on == operation {
                bail!("Mock failure on: {}", operation);
            }
        }
        Ok(())
    }
}

impl ContainerHandle for MockContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Result<ContainerState> {
        self.check_fail("state")?;
        Ok(self.state.read().unwrap().clone())
    }

    fn copy_to(&self, container_path: &str, _host_path: &Path) -> Result<()> {
        self.record_command(format!("copy_to:{}:{}", self.name, container_path));
        self.check_fail("copy_to")
    }

    fn copy_from(&self, container_path: &str, _host_path: &Path) -> Result<()> {
        self.record_command(format!("copy_from:{}:{}", self.name, container_path));
        self.check_fail("copy_from")
    }

    fn execute(&self, command: &str) -> Result<ExecResult> {
        self.record_command(format!("exec:{}:{}", self.name, command));
        self.check_fail("execute")?;

        Ok(match self.exit_codes.read().unwrap().get(command) {
            Some(&code) => ExecResult::failed(code, format!("exit status {code}")),
            None => ExecResult::ok(),
        })
    }

    fn export(&self, host_path: &Path, explode: bool) -> Result<()> {
        let form = if explode { "exploded" } else { "archive" };
        self.record_command(format!(
            "export:{}:{}:{}",
            self.name,
            host_path.display(),
            form
        ));
        self.check_fail("export")
    }

    fn host_endpoint(&self, port: &PortSpec) -> Result<Option<SocketAddr>> {
        self.record_command(format!("port:{}:{}", self.name, port));
        self.check_fail("host_endpoint")?;
        Ok(*self.endpoint.read().unwrap())
    }

    fn processes(&self) -> Result<Vec<String>> {
        self.record_command(format!("top:{}", self.name));
        self.check_fail("processes")?;
        Ok(self.processes.read().unwrap().clone())
    }
}

/// Composite-service double: owns mock containers and records group transitions
/// into the same journal as its containers
#[derive(Debug)]
pub struct MockRuntime {
    containers: RwLock<Vec<Arc<MockContainer>>>,
    commands: Journal,
    fail_on: RwLock<Option<String>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
            commands: Arc::new(RwLock::new(Vec::new())),
            fail_on: RwLock::new(None),
        }
    }

    pub fn add_container(&self, name: &str) -> Arc<MockContainer> {
        let container = Arc::new(MockContainer::with_journal(name, self.commands.clone()));
        self.containers.write().unwrap().push(container.clone());
        container
    }

    pub fn set_fail_on(&self, operation: &str) {
        *self.fail_on.write().unwrap() = Some(operation.to_string());
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.write().unwrap().clear();
    }

    fn record_command(&self, cmd: &str) {
        self.commands.write().unwrap().push(cmd.to_string());
    }

    fn check_fail(&self, operation: &str) -> Result<()> {
        if let Some(ref fail_on) = *self.fail_on.read().unwrap() {
            if fail_on == operation {
                bail!("Mock failure on: {}", operation);
            }
        }
        Ok(())
    }

    fn set_all(&self, state: ContainerState) {
        for container in self.containers.read().unwrap().iter() {
            container.set_state(state.clone());
        }
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposeRuntime for MockRuntime {
    fn create(&self) -> Result<()> {
        self.record_command("create");
        self.check_fail("create")?;
        self.set_all(ContainerState::Stopped);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.record_command("start");
        self.check_fail("start")?;
        self.set_all(ContainerState::Running);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record_command("stop");
        self.check_fail("stop")?;
        self.set_all(ContainerState::Stopped);
        Ok(())
    }

    fn down(&self) -> Result<()> {
        self.record_command("down");
        self.check_fail("down")?;
        self.set_all(ContainerState::NotCreated);
        self.containers.write().unwrap().clear();
        Ok(())
    }

    fn containers(&self) -> Result<Vec<Arc<dyn ContainerHandle>>> {
        self.check_fail("containers")?;
        Ok(self
            .containers
            .read()
            .unwrap()
            .iter()
            .map(|c| c.clone() as Arc<dyn ContainerHandle>)
            .collect())
    }
}

impl ServiceResolver for MockRuntime {
    fn resolve(&self, service: &str) -> Option<Arc<dyn ContainerHandle>> {
        self.containers
            .read()
            .unwrap()
            .iter()
            .find(|c| c.name == service)
            .map(|c| c.clone() as Arc<dyn ContainerHandle>)
    }
}
