use crate::domain::{ComposeRuntime, ContainerHandle, ContainerState, ExecResult, PortSpec};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Docker,
    Podman,
}

impl Engine {
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRemoval {
    All,
    Local,
}

/// Flags passed through to `compose up` and `compose down`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    pub force_recreate: bool,
    pub no_recreate: bool,
    pub no_build: bool,
    pub force_build: bool,
    pub remove_orphans: bool,
    pub keep_volumes: bool,
    pub image_removal: Option<ImageRemoval>,
    pub timeout: Option<Duration>,
}

/// Composite service backed by `<engine> compose`
#[derive(Debug, Clone)]
pub struct DockerCompose {
    engine: Engine,
    project: String,
    files: Vec<PathBuf>,
    options: ComposeOptions,
}

impl DockerCompose {
    pub fn new(
        engine: Engine,
        project: impl Into<String>,
        files: Vec<PathBuf>,
        options: ComposeOptions,
    ) -> Result<Self> {
        if files.is_empty() {
            bail!("cannot create a composite service without a compose file");
        }

        Ok(Self {
            engine,
            project: project.into(),
            files,
            options,
        })
    }

    fn compose_args<S: AsRef<OsStr>>(&self, action: &[S]) -> Vec<OsString> {
        let mut args: Vec<OsString> =
            vec!["compose".into(), "-p".into(), self.project.clone().into()];
        for file in &self.files {
            args.push("-f".into());
            args.push(file.as_os_str().to_os_string());
        }
        args.extend(action.iter().map(|a| a.as_ref().to_os_string()));
        args
    }

    fn up_args(&self) -> Vec<String> {
        let mut args = vec!["up".to_string(), "--no-start".to_string()];
        if self.options.force_recreate {
            args.push("--force-recreate".into());
        }
        if self.options.no_recreate {
            args.push("--no-recreate".into());
        }
        if self.options.no_build {
            args.push("--no-build".into());
        }
        if self.options.force_build {
            args.push("--build".into());
        }
        if self.options.remove_orphans {
            args.push("--remove-orphans".into());
        }
        args
    }

    fn stop_args(&self) -> Vec<String> {
        let mut args = vec!["stop".to_string()];
        if let Some(timeout) = self.options.timeout {
            args.push("-t".into());
            args.push(timeout.as_secs().to_string());
        }
        args
    }

    fn down_args(&self) -> Vec<String> {
        let mut args = vec!["down".to_string()];
        if !self.options.keep_volumes {
            args.push("-v".into());
        }
        match self.options.image_removal {
            Some(ImageRemoval::All) => args.extend(["--rmi".into(), "all".into()]),
            Some(ImageRemoval::Local) => args.extend(["--rmi".into(), "local".into()]),
            None => {}
        }
        if self.options.remove_orphans {
            args.push("--remove-orphans".into());
        }
        if let Some(timeout) = self.options.timeout {
            args.push("-t".into());
            args.push(timeout.as_secs().to_string());
        }
        args
    }

    fn compose(&self, action: &[String], context: &str) -> Result<()> {
        run_engine(self.engine, self.compose_args(action), context)
    }
}

impl ComposeRuntime for DockerCompose {
    fn create(&self) -> Result<()> {
        self.compose(
            &self.up_args(),
            &format!("creating containers of {}", self.project),
        )
    }

    fn start(&self) -> Result<()> {
        self.compose(
            &["start".to_string()],
            &format!("starting {}", self.project),
        )
    }

    fn stop(&self) -> Result<()> {
        self.compose(&self.stop_args(), &format!("stopping {}", self.project))
    }

    fn down(&self) -> Result<()> {
        self.compose(&self.down_args(), &format!("removing {}", self.project))
    }

    fn containers(&self) -> Result<Vec<Arc<dyn ContainerHandle>>> {
        let ids = engine_output(
            self.engine,
            self.compose_args(&["ps", "-a", "-q"]),
            &format!("listing containers of {}", self.project),
        )?;
        let ids: Vec<&str> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["inspect"];
        args.extend(ids.iter().copied());
        let json = engine_output(self.engine, args, "inspecting containers")?;

        Ok(parse_inspect(&json)?
            .into_iter()
            .map(|(id, name)| {
                Arc::new(DockerContainer::new(self.engine, id, name)) as Arc<dyn ContainerHandle>
            })
            .collect())
    }
}

/// One container driven through the engine CLI
#[derive(Debug, Clone)]
pub struct DockerContainer {
    engine: Engine,
    id: String,
    name: String,
}

impl DockerContainer {
    pub fn new(engine: Engine, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            engine,
            id: id.into(),
            name: name.into(),
        }
    }

    fn target(&self, container_path: &str) -> String {
        format!("{}:{}", self.id, container_path)
    }
}

impl ContainerHandle for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Result<ContainerState> {
        let output = Command::new(self.engine.binary())
            .args(["inspect", &self.id, "--format", "{{.State.Running}}"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("checking state of {}", self.name))?;

        if !output.status.success() {
            return Ok(ContainerState::NotCreated);
        }

        Ok(if String::from_utf8_lossy(&output.stdout).trim() == "true" {
            ContainerState::Running
        } else {
            ContainerState::Stopped
        })
    }

    fn copy_to(&self, container_path: &str, host_path: &Path) -> Result<()> {
        run_engine(
            self.engine,
            [
                OsStr::new("cp"),
                host_path.as_os_str(),
                OsStr::new(&self.target(container_path)),
            ],
            &format!("copying {:?} to {}:{container_path}", host_path, self.name),
        )
    }

    fn copy_from(&self, container_path: &str, host_path: &Path) -> Result<()> {
        if let Some(parent) = host_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }

        run_engine(
            self.engine,
            [
                OsStr::new("cp"),
                OsStr::new(&self.target(container_path)),
                host_path.as_os_str(),
            ],
            &format!("copying {}:{container_path} to {:?}", self.name, host_path),
        )
    }

    fn execute(&self, command: &str) -> Result<ExecResult> {
        debug!("exec on {}: {command}", self.name);
        let output = Command::new(self.engine.binary())
            .args(["exec", &self.id, "sh", "-c", command])
            .output()
            .with_context(|| format!("executing '{command}' on {}", self.name))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let error = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };

        Ok(ExecResult {
            success: output.status.success(),
            error: if output.status.success() { String::new() } else { error },
            exit_code: output.status.code(),
        })
    }

    fn export(&self, host_path: &Path, explode: bool) -> Result<()> {
        let context = format!("exporting {} to {:?}", self.name, host_path);

        if !explode {
            if let Some(parent) = host_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
            }
            return run_engine(
                self.engine,
                [
                    OsStr::new("export"),
                    OsStr::new("-o"),
                    host_path.as_os_str(),
                    OsStr::new(&self.id),
                ],
                &context,
            );
        }

        fs::create_dir_all(host_path).with_context(|| format!("creating {:?}", host_path))?;
        let mut child = Command::new(self.engine.binary())
            .args(["export", &self.id])
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| context.clone())?;

        let stdout = child
            .stdout
            .take()
            .context("export produced no output stream")?;
        let unpacked = tar::Archive::new(stdout).unpack(host_path);
        let status = child.wait().with_context(|| context.clone())?;

        unpacked.with_context(|| format!("unpacking export of {}", self.name))?;
        ensure_success(self.engine, status, &context)
    }

    fn host_endpoint(&self, port: &PortSpec) -> Result<Option<SocketAddr>> {
        let output = Command::new(self.engine.binary())
            .args(["port", &self.id, &port.to_string()])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("looking up port {port} of {}", self.name))?;

        if !output.status.success() {
            return Ok(None);
        }

        Ok(parse_port_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn processes(&self) -> Result<Vec<String>> {
        let output = engine_output(
            self.engine,
            ["top", self.id.as_str()],
            &format!("listing processes of {}", self.name),
        )?;
        Ok(parse_top_output(&output))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    #[serde(default)]
    config: InspectConfig,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

/// `(id, name)` of each inspected container, named after its compose
/// service when labelled, else after the container name without the leading `/`
fn parse_inspect(json: &str) -> Result<Vec<(String, String)>> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(json).context("parsing inspect output")?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let name = entry
                .config
                .labels
                .as_ref()
                .and_then(|labels| labels.get(COMPOSE_SERVICE_LABEL))
                .cloned()
                .unwrap_or_else(|| entry.name.trim_start_matches('/').to_string());
            (entry.id, name)
        })
        .collect())
}

/// First address printed by `<engine> port`, with wildcard hosts mapped to loopback
fn parse_port_output(output: &str) -> Option<SocketAddr> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<SocketAddr>().ok())
        .map(|mut addr| {
            if addr.ip().is_unspecified() {
                addr.set_ip(match addr.ip() {
                    IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                    IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
                });
            }
            addr
        })
        .next()
}

/// Command column of `<engine> top` output
fn parse_top_output(output: &str) -> Vec<String> {
    let mut lines = output.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let Some(column) = header.find("CMD").or_else(|| header.find("COMMAND")) else {
        return Vec::new();
    };

    lines
        .filter_map(|line| line.get(column..))
        .map(|cmd| cmd.trim().to_string())
        .filter(|cmd| !cmd.is_empty())
        .collect()
}

fn run_engine<I, S>(engine: Engine, args: I, context: &str) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let status = engine_status(engine, args, context)?;
    ensure_success(engine, status, context)
}

fn engine_status<I, S>(engine: Engine, args: I, context: &str) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(engine.binary())
        .args(args.into_iter().map(|item| item.as_ref().to_os_string()))
        .status()
        .with_context(|| context.to_string())
}

fn engine_output<I, S>(engine: Engine, args: I, context: &str) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(engine.binary())
        .args(args.into_iter().map(|item| item.as_ref().to_os_string()))
        .output()
        .with_context(|| context.to_string())?;

    if !output.status.success() {
        bail!(
            "{} returned status {:?} ({context}): {}",
            engine.binary(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ensure_success(engine: Engine, status: ExitStatus, context: &str) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    bail!("{} returned status {:?} ({context})", engine.binary(), status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(options: ComposeOptions) -> DockerCompose {
        DockerCompose::new(
            Engine::Docker,
            "it",
            vec![PathBuf::from("docker-compose.yml")],
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_compose_requires_file() {
        let err = DockerCompose::new(Engine::Podman, "it", vec![], ComposeOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("compose file"));
    }

    #[test]
    fn test_compose_args_prefix() {
        let args = compose(ComposeOptions::default()).compose_args(&["ps"]);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args, vec!["compose", "-p", "it", "-f", "docker-compose.yml", "ps"]);
    }

    #[test]
    fn test_up_and_down_args_follow_options() {
        let compose = compose(ComposeOptions {
            force_recreate: true,
            no_build: true,
            remove_orphans: true,
            keep_volumes: true,
            image_removal: Some(ImageRemoval::Local),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        });

        assert_eq!(
            compose.up_args(),
            vec!["up", "--no-start", "--force-recreate", "--no-build", "--remove-orphans"]
        );
        assert_eq!(
            compose.down_args(),
            vec!["down", "--rmi", "local", "--remove-orphans", "-t", "5"]
        );
        assert_eq!(compose.stop_args(), vec!["stop", "-t", "5"]);
    }

    #[test]
    fn test_down_removes_volumes_by_default() {
        assert_eq!(compose(ComposeOptions::default()).down_args(), vec!["down", "-v"]);
    }

    #[test]
    fn test_parse_inspect_prefers_service_label() {
        let json = r#"[
            {"Id": "abc", "Name": "/it-web-1",
             "Config": {"Labels": {"com.docker.compose.service": "web"}}},
            {"Id": "def", "Name": "/standalone", "Config": {"Labels": null}}
        ]"#;

        let parsed = parse_inspect(json).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("abc".to_string(), "web".to_string()),
                ("def".to_string(), "standalone".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_port_output() {
        let addr = parse_port_output("0.0.0.0:32768\n[::]:32768\n").unwrap();
        assert_eq!(addr, "127.0.0.1:32768".parse().unwrap());

        let addr = parse_port_output("[::]:8080\n").unwrap();
        assert_eq!(addr, "[::1]:8080".parse().unwrap());

        assert!(parse_port_output("").is_none());
    }

    #[test]
    fn test_parse_top_output() {
        let row = |cols: &[&str]| {
            let (cmd, rest) = cols.split_last().unwrap();
            let mut line: String = rest.iter().map(|c| format!("{c:<20}")).collect();
            line.push_str(cmd);
            line
        };
        let output = [
            row(&["UID", "PID", "PPID", "C", "STIME", "TTY", "TIME", "CMD"]),
            row(&[
                "root",
                "4242",
                "4221",
                "0",
                "10:00",
                "?",
                "00:00:00",
                "nginx: master process nginx -g daemon off;",
            ]),
            row(&["101", "4290", "4242", "0", "10:00", "?", "00:00:00", "nginx: worker process"]),
        ]
        .join("\n");

        let processes = parse_top_output(&output);
        assert_eq!(
            processes,
            vec![
                "nginx: master process nginx -g daemon off;",
                "nginx: worker process"
            ]
        );
    }

    #[test]
    fn test_parse_top_output_without_header() {
        assert!(parse_top_output("").is_empty());
        assert!(parse_top_output("PID USER\n1 root\n").is_empty());
    }
}
