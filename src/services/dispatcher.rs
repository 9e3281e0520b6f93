use super::registry::ConfigurationRegistry;
use crate::domain::{
    ContainerHandle, CopyPair, ExportDirective, HttpWait, PortWait, ProcessWait, ServiceResolver,
};
use crate::error::{HookError, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Group transitions that accept hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Starting,
    Running,
    Removing,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 3] = [Self::Starting, Self::Running, Self::Removing];
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Removing => write!(f, "Removing"),
        }
    }
}

/// Work a hook performs against its resolved container
#[derive(Debug, Clone)]
pub enum HookAction {
    CopyTo(Vec<CopyPair>),
    WaitForPort(PortWait),
    WaitForHttp(Vec<HttpWait>),
    WaitForProcess(ProcessWait),
    Execute(Vec<String>),
    CopyFrom(Vec<CopyPair>),
    Export(ExportDirective),
}

/// A deferred action bound to one service name.
///
/// The name is resolved to a live container only when the hook fires.
#[derive(Debug, Clone)]
pub struct Hook {
    pub service: String,
    pub action: HookAction,
}

impl Hook {
    pub fn new(service: impl Into<String>, action: HookAction) -> Self {
        Self {
            service: service.into(),
            action,
        }
    }

    /// Resolve the target and run the action.
    ///
    /// A service that does not resolve is skipped for every action kind.
    pub fn invoke(&self, resolver: &dyn ServiceResolver) -> Result<()> {
        let Some(container) = resolver.resolve(&self.service) else {
            debug!("Service '{}' not found, skipping hook: {self}", self.service);
            return Ok(());
        };

        info!("Running hook: {self}");
        self.run(container.as_ref())
    }

    fn run(&self, container: &dyn ContainerHandle) -> Result<()> {
        match &self.action {
            HookAction::CopyTo(pairs) => {
                for pair in pairs {
                    container.copy_to(&pair.container_path, &pair.host_path)?;
                }
            }
            HookAction::WaitForPort(wait) => container.wait_for_port(&wait.port, wait.timeout)?,
            HookAction::WaitForHttp(waits) => {
                for wait in waits {
                    container.wait_for_http(wait)?;
                }
            }
            HookAction::WaitForProcess(wait) => {
                container.wait_for_process(&wait.process, wait.timeout)?
            }
            HookAction::Execute(commands) => {
                for command in commands {
                    let result = container.execute(command)?;
                    if !result.success {
                        return Err(HookError::ExecutionFault {
                            service: self.service.clone(),
                            command: command.clone(),
                            error: result.error,
                            exit_code: result.exit_code,
                        });
                    }
                }
            }
            HookAction::CopyFrom(pairs) => {
                for pair in pairs {
                    container.copy_from(&pair.container_path, &pair.host_path)?;
                }
            }
            HookAction::Export(export) => {
                if export.applies_to(container) {
                    container.export(&export.host_path, export.explode)?;
                } else {
                    debug!("Export condition false for '{}', not exporting", self.service);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let service = &self.service;
        match &self.action {
            HookAction::CopyTo(pairs) => write!(f, "{service}: copy {} path(s) in", pairs.len()),
            HookAction::WaitForPort(w) => {
                write!(f, "{service}: wait for port {} ({})", w.port, w.timeout)
            }
            HookAction::WaitForHttp(waits) => {
                let urls: Vec<_> = waits.iter().map(|w| w.url.as_str()).collect();
                write!(f, "{service}: wait for http {}", urls.join(", "))
            }
            HookAction::WaitForProcess(w) => {
                write!(f, "{service}: wait for process {} ({})", w.process, w.timeout)
            }
            HookAction::Execute(commands) => {
                write!(f, "{service}: execute {}", commands.join("; "))
            }
            HookAction::CopyFrom(pairs) => {
                write!(f, "{service}: copy {} path(s) out", pairs.len())
            }
            HookAction::Export(e) => {
                let form = if e.explode { "exploded" } else { "archive" };
                write!(f, "{service}: export {form} to {}", e.host_path.display())
            }
        }
    }
}

/// Ordered hooks per lifecycle state
#[derive(Debug, Clone, Default)]
pub struct HookDispatcher {
    hooks: HashMap<LifecycleState, Vec<Hook>>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize hooks from every declared field of every service
    pub fn from_registry(registry: &ConfigurationRegistry) -> Self {
        let mut dispatcher = Self::new();

        for config in registry.iter() {
            let name = config.name.as_str();
            if config.is_empty() {
                debug!("Service '{name}' declares no hooks");
                continue;
            }
            let mut add = |state, action| dispatcher.register(state, Hook::new(name, action));

            if !config.copy_to_on_start.is_empty() {
                add(
                    LifecycleState::Starting,
                    HookAction::CopyTo(config.copy_to_on_start.clone()),
                );
            }
            if let Some(wait) = config.wait_for_port {
                add(LifecycleState::Running, HookAction::WaitForPort(wait));
            }
            if !config.wait_for_http.is_empty() {
                add(
                    LifecycleState::Running,
                    HookAction::WaitForHttp(config.wait_for_http.clone()),
                );
            }
            if let Some(wait) = &config.wait_for_process {
                add(
                    LifecycleState::Running,
                    HookAction::WaitForProcess(wait.clone()),
                );
            }
            if !config.execute_on_running.is_empty() {
                add(
                    LifecycleState::Running,
                    HookAction::Execute(config.execute_on_running.clone()),
                );
            }
            if !config.copy_from_on_dispose.is_empty() {
                add(
                    LifecycleState::Removing,
                    HookAction::CopyFrom(config.copy_from_on_dispose.clone()),
                );
            }
            if !config.execute_on_disposing.is_empty() {
                add(
                    LifecycleState::Removing,
                    HookAction::Execute(config.execute_on_disposing.clone()),
                );
            }
            if let Some(export) = &config.export_on_dispose {
                add(LifecycleState::Removing, HookAction::Export(export.clone()));
            }
        }

        dispatcher
    }

    /// Append a hook; hooks of a state fire in registration order
    pub fn register(&mut self, state: LifecycleState, hook: Hook) {
        self.hooks.entry(state).or_default().push(hook);
    }

    pub fn hooks(&self, state: LifecycleState) -> &[Hook] {
        self.hooks.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Invoke every hook of `state` in order.
    ///
    /// The first failing hook aborts the pass: later hooks of the same state
    /// do not run and hooks that already ran are not undone.
    pub fn fire(&self, state: LifecycleState, resolver: &dyn ServiceResolver) -> Result<()> {
        let hooks = self.hooks(state);
        if hooks.is_empty() {
            return Ok(());
        }

        info!("Firing {} {state} hook(s)", hooks.len());
        for hook in hooks {
            hook.invoke(resolver)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PortSpec, Timeout};
    use crate::services::HooksBuilder;
    use crate::test_support::{MockContainer, MockRuntime};
    use std::sync::Arc;

    fn group_with(names: &[&str]) -> (MockRuntime, Vec<Arc<MockContainer>>) {
        let group = MockRuntime::new();
        let containers = names.iter().map(|n| group.add_container(n)).collect();
        (group, containers)
    }

    #[test]
    fn test_synthesis_places_hooks_in_states() {
        let registry = HooksBuilder::new()
            .copy_on_start("web", "site", "/srv")
            .wait_for_port("web", PortSpec::tcp(80), Timeout::from_millis(10))
            .execute_on_running("web", ["echo ready"])
            .copy_on_dispose("web", "/var/log", "logs")
            .execute_on_disposing("web", ["echo bye"])
            .export_on_dispose("web", "web.tar")
            .build();

        let dispatcher = HookDispatcher::from_registry(&registry);
        assert_eq!(dispatcher.hooks(LifecycleState::Starting).len(), 1);
        assert_eq!(dispatcher.hooks(LifecycleState::Running).len(), 2);

        let removing = dispatcher.hooks(LifecycleState::Removing);
        assert_eq!(removing.len(), 3);
        assert!(matches!(removing[0].action, HookAction::CopyFrom(_)));
        assert!(matches!(removing[1].action, HookAction::Execute(_)));
        assert!(matches!(removing[2].action, HookAction::Export(_)));
    }

    #[test]
    fn test_empty_lists_register_nothing() {
        let registry = HooksBuilder::new()
            .execute_on_running("web", Vec::<String>::new())
            .execute_on_disposing("db", ["pg_dump"])
            .build();
        assert!(registry.get("web").unwrap().is_empty());
        assert!(!registry.get("db").unwrap().is_empty());

        let dispatcher = HookDispatcher::from_registry(&registry);
        assert!(dispatcher.hooks(LifecycleState::Starting).is_empty());
        assert!(dispatcher.hooks(LifecycleState::Running).is_empty());

        let removing = dispatcher.hooks(LifecycleState::Removing);
        assert_eq!(removing.len(), 1);
        assert_eq!(removing[0].service, "db");
    }

    #[test]
    fn test_register_appends_in_order() {
        let (group, _) = group_with(&["a", "b"]);
        let mut dispatcher = HookDispatcher::new();
        dispatcher.register(
            LifecycleState::Running,
            Hook::new("b", HookAction::Execute(vec!["first".into()])),
        );
        dispatcher.register(
            LifecycleState::Running,
            Hook::new("a", HookAction::Execute(vec!["second".into()])),
        );

        dispatcher.fire(LifecycleState::Running, &group).unwrap();
        assert_eq!(group.get_commands(), vec!["exec:b:first", "exec:a:second"]);
    }

    #[test]
    fn test_failing_command_stops_remaining_commands() {
        let (group, containers) = group_with(&["web"]);
        containers[0].set_exit_code("false", 1);

        let registry = HooksBuilder::new()
            .execute_on_running("web", ["false", "echo never"])
            .build();
        let dispatcher = HookDispatcher::from_registry(&registry);

        let err = dispatcher
            .fire(LifecycleState::Running, &group)
            .unwrap_err();
        match err {
            HookError::ExecutionFault {
                command, exit_code, ..
            } => {
                assert_eq!(command, "false");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(group.get_commands(), vec!["exec:web:false"]);
    }

    #[test]
    fn test_failure_aborts_later_hooks_of_same_state() {
        let (group, containers) = group_with(&["web"]);
        containers[0].set_exit_code("flush", 2);

        let registry = HooksBuilder::new()
            .execute_on_disposing("web", ["flush"])
            .export_on_dispose("web", "web.tar")
            .build();
        let dispatcher = HookDispatcher::from_registry(&registry);

        assert!(dispatcher.fire(LifecycleState::Removing, &group).is_err());
        assert!(
            !group
                .get_commands()
                .iter()
                .any(|c| c.starts_with("export:"))
        );
    }

    #[test]
    fn test_unresolved_service_is_skipped_for_every_hook_kind() {
        let (group, _) = group_with(&["web"]);

        let registry = HooksBuilder::new()
            .copy_on_start("ghost", "a", "/a")
            .wait_for_port("ghost", PortSpec::tcp(80), Timeout::from_millis(10))
            .wait_for_process("ghost", "init", Timeout::from_millis(10))
            .wait_for_http("ghost", crate::domain::HttpWait::new("http://127.0.0.1:1/"))
            .execute_on_running("ghost", ["false"])
            .copy_on_dispose("ghost", "/b", "b")
            .execute_on_disposing("ghost", ["false"])
            .export_on_dispose("ghost", "ghost.tar")
            .build();
        let dispatcher = HookDispatcher::from_registry(&registry);

        for state in LifecycleState::ALL {
            dispatcher.fire(state, &group).unwrap();
        }
        assert!(group.get_commands().is_empty());
    }

    #[test]
    fn test_export_respects_condition() {
        let (group, _) = group_with(&["web", "db"]);

        let registry = HooksBuilder::new()
            .export_on_dispose_when("web", "web.tar", false, |_| false)
            .export_on_dispose_when("db", "db", true, |c| c.name() == "db")
            .build();
        let dispatcher = HookDispatcher::from_registry(&registry);

        dispatcher.fire(LifecycleState::Removing, &group).unwrap();
        assert_eq!(group.get_commands(), vec!["export:db:db:exploded"]);
    }

    #[test]
    fn test_hook_display() {
        let hook = Hook::new(
            "web",
            HookAction::WaitForPort(PortWait {
                port: PortSpec::tcp(80),
                timeout: Timeout::from_millis(500),
            }),
        );
        assert_eq!(hook.to_string(), "web: wait for port 80/tcp (500ms)");
    }
}
