use crate::domain::ComposeRuntime;
use crate::infra::compose_adapter::DockerCompose;
use crate::infra::config::{HooksConfig, load_hooks_config};
use crate::services::{CompositeService, HookDispatcher, LifecycleState};
use anyhow::{Context, Result, bail};
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

/// A compose group wired to the hooks declared in a hooks file
#[derive(Debug)]
pub struct Session {
    project: String,
    service: CompositeService,
}

impl Session {
    /// Load the hooks file and drive the group through the engine CLI
    pub fn load(path: &Path) -> Result<Self> {
        let config = load_hooks_config(path)?;
        let compose = DockerCompose::new(
            config.engine(),
            config.project_name(),
            config.compose_files(),
            config.compose_options(),
        )?;
        Self::with_runtime(&config, Arc::new(compose))
    }

    pub fn with_runtime(config: &HooksConfig, runtime: Arc<dyn ComposeRuntime>) -> Result<Self> {
        let registry = config.to_builder()?.build();
        let dispatcher = HookDispatcher::from_registry(&registry);
        let service =
            CompositeService::new(runtime, dispatcher).keep_on_dispose(config.keep_on_dispose());

        Ok(Self {
            project: config.project_name(),
            service,
        })
    }

    pub fn service(&self) -> &CompositeService {
        &self.service
    }

    pub fn up(&mut self) -> Result<()> {
        info!("Bringing up project '{}'", self.project);
        self.service.start()?;
        Ok(())
    }

    /// Adopt the running group, fire its Removing hooks and tear it down
    pub fn down(self) -> Result<()> {
        info!("Tearing down project '{}'", self.project);
        let mut service = self.service.attach()?;
        service.dispose()?;
        Ok(())
    }

    /// Bring the group up, run `command` on the host, then dispose.
    ///
    /// The group is disposed even when startup or the command fails.
    pub fn run(mut self, command: &[String]) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            bail!("no command given");
        };

        let outcome = self.up().and_then(|()| {
            info!("Running {}", command.join(" "));
            let status = Command::new(program)
                .args(args)
                .status()
                .with_context(|| format!("failed to launch '{program}'"))?;
            if !status.success() {
                bail!("'{}' exited with {}", command.join(" "), status);
            }
            Ok(())
        });

        if let Err(e) = self.service.dispose() {
            if outcome.is_err() {
                warn!("Dispose after failure also failed: {e}");
            } else {
                return Err(e.into());
            }
        }

        outcome
    }

    /// Hooks per lifecycle state, in firing order
    pub fn plan(&self) -> String {
        let mut out = format!("Project '{}'\n", self.project);
        for state in LifecycleState::ALL {
            let hooks = self.service.dispatcher().hooks(state);
            let _ = writeln!(out, "{state} ({} hooks)", hooks.len());
            for hook in hooks {
                let _ = writeln!(out, "  - {hook}");
            }
        }
        out
    }
}
