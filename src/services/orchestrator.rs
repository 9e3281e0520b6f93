use super::dispatcher::{HookDispatcher, LifecycleState};
use crate::domain::{ComposeRuntime, ContainerHandle, ServiceResolver};
use crate::error::{HookError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Group-level state as seen by the hook engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Created,
    Starting,
    Running,
    Stopped,
    Removing,
    Removed,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Multi-container group that fires lifecycle hooks as it transitions.
///
/// Hooks run synchronously on the thread calling `start`, `restart` or
/// `dispose`; an error from any hook aborts the transition and is returned
/// to the caller.
pub struct CompositeService {
    runtime: Arc<dyn ComposeRuntime>,
    dispatcher: HookDispatcher,
    containers: Vec<Arc<dyn ContainerHandle>>,
    state: GroupState,
    keep_on_dispose: bool,
}

impl CompositeService {
    pub fn new(runtime: Arc<dyn ComposeRuntime>, dispatcher: HookDispatcher) -> Self {
        Self {
            runtime,
            dispatcher,
            containers: Vec::new(),
            state: GroupState::Created,
            keep_on_dispose: false,
        }
    }

    /// Leave the group untouched, with no Removing hooks, on `dispose`
    pub fn keep_on_dispose(mut self, keep: bool) -> Self {
        self.keep_on_dispose = keep;
        self
    }

    /// Adopt a group that is already up, e.g. started by an earlier process
    pub fn attach(mut self) -> Result<Self> {
        self.refresh()?;
        self.state = GroupState::Running;
        info!("Attached to running group ({} containers)", self.containers.len());
        Ok(self)
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn containers(&self) -> &[Arc<dyn ContainerHandle>] {
        &self.containers
    }

    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    /// Bring the group up, firing Starting hooks before the containers start
    /// and Running hooks once they are up.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            GroupState::Running => {
                warn!("Group is already running");
                return Ok(());
            }
            GroupState::Removing | GroupState::Removed => {
                return Err(HookError::configuration(format!(
                    "cannot start a group in state {}",
                    self.state
                )));
            }
            GroupState::Created => {
                info!("Creating containers...");
                self.runtime.create()?;
                self.refresh()?;
            }
            GroupState::Starting | GroupState::Stopped => {}
        }

        self.enter(LifecycleState::Starting)?;

        info!("Starting containers...");
        self.runtime.start()?;
        self.refresh()?;

        self.enter(LifecycleState::Running)?;
        info!("Group is running");
        Ok(())
    }

    /// Stop the containers; no hooks fire
    pub fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, GroupState::Running | GroupState::Starting) {
            warn!("Group is not running (state {})", self.state);
            return Ok(());
        }

        info!("Stopping containers...");
        self.runtime.stop()?;
        self.state = GroupState::Stopped;
        Ok(())
    }

    /// Stop and start again; Starting and Running hooks fire again
    pub fn restart(&mut self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    /// Fire Removing hooks, then tear the group down.
    ///
    /// If a hook fails the group stays in `Removing` and the error is
    /// returned; calling `dispose` again tears down without re-firing hooks.
    pub fn dispose(&mut self) -> Result<()> {
        if self.keep_on_dispose {
            info!("Keeping group on dispose");
            return Ok(());
        }

        match self.state {
            GroupState::Removed => return Ok(()),
            GroupState::Removing => {
                warn!("Removing hooks already fired, tearing down");
            }
            _ => self.enter(LifecycleState::Removing)?,
        }

        info!("Removing containers...");
        self.runtime.down()?;
        self.containers.clear();
        self.state = GroupState::Removed;
        Ok(())
    }

    /// Fire the hooks of `state`. The group only counts as running once its
    /// Running hooks succeed; until then it stays in `Starting`.
    fn enter(&mut self, state: LifecycleState) -> Result<()> {
        match state {
            LifecycleState::Starting => self.state = GroupState::Starting,
            LifecycleState::Removing => self.state = GroupState::Removing,
            LifecycleState::Running => {}
        }
        self.dispatcher.fire(state, &*self)?;

        if state == LifecycleState::Running {
            self.state = GroupState::Running;
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.containers = self.runtime.containers()?;
        Ok(())
    }
}

impl ServiceResolver for CompositeService {
    /// First container whose name matches exactly
    fn resolve(&self, service: &str) -> Option<Arc<dyn ContainerHandle>> {
        self.containers.iter().find(|c| c.name() == service).cloned()
    }
}

impl fmt::Debug for CompositeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeService")
            .field("state", &self.state)
            .field("containers", &self.containers.len())
            .field("keep_on_dispose", &self.keep_on_dispose)
            .finish()
    }
}
