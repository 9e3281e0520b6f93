use super::{PROCESS_POLL_INTERVAL, Probe, poll};
use crate::domain::{ContainerHandle, Timeout};
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// Block until a process named `name` runs inside `container`.
pub fn process<C>(container: &C, name: &str, timeout: Timeout) -> Result<()>
where
    C: ContainerHandle + ?Sized,
{
    let target = format!("process '{name}' in {}", container.name());
    info!("Waiting for {target} (timeout {timeout})");

    poll(&target, timeout, PROCESS_POLL_INTERVAL, |_| {
        match container.processes() {
            Ok(list) if list.iter().any(|cmd| matches_process(cmd, name)) => Probe::Ready(()),
            Ok(_) => Probe::Pending,
            Err(e) => Probe::Failed(format!("{e:#}")),
        }
    })
}

/// A command matches when it equals `name` or its executable's file name does
fn matches_process(command: &str, name: &str) -> bool {
    let command = command.trim();
    if command == name {
        return true;
    }

    command
        .split_whitespace()
        .next()
        .and_then(|exe| Path::new(exe).file_name())
        .is_some_and(|exe| exe == name)
}
