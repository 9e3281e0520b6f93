use super::compose_adapter::{ComposeOptions, Engine, ImageRemoval};
use crate::domain::{
    ContainerHandle, ContainerState, ExportDirective, HttpWait, PortSpec, Timeout,
};
use crate::services::HooksBuilder;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_HOOKS_FILE: &str = "hookbox.toml";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub compose_files: Option<Vec<PathBuf>>,
    pub engine: Option<Engine>,
    pub force_recreate: Option<bool>,
    pub no_recreate: Option<bool>,
    pub no_build: Option<bool>,
    pub force_build: Option<bool>,
    pub remove_orphans: Option<bool>,
    pub keep_volumes: Option<bool>,
    pub remove_images: Option<ImageRemoval>,
    pub keep_on_dispose: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CopySpec {
    pub host: String,
    pub container: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PortWaitSpec {
    pub port: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProcessWaitSpec {
    pub name: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HttpWaitSpec {
    pub url: String,
    pub timeout_ms: Option<u64>,
    pub method: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    /// Stop waiting once this status is returned
    pub expect_status: Option<u16>,
    /// Delay between attempts
    pub retry_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportWhen {
    #[default]
    Always,
    /// Only export containers still running at teardown
    Running,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportSpec {
    pub host: String,
    #[serde(default)]
    pub explode: bool,
    #[serde(default)]
    pub when: ExportWhen,
}

/// Hooks of one service as written in the hooks file
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceHooks {
    #[serde(default)]
    pub copy_on_start: Vec<CopySpec>,
    #[serde(default)]
    pub copy_on_dispose: Vec<CopySpec>,
    pub wait_for_port: Option<PortWaitSpec>,
    pub wait_for_process: Option<ProcessWaitSpec>,
    #[serde(default)]
    pub wait_for_http: Vec<HttpWaitSpec>,
    #[serde(default)]
    pub execute_on_running: Vec<String>,
    #[serde(default)]
    pub execute_on_disposing: Vec<String>,
    pub export_on_dispose: Option<ExportSpec>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct HooksConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    /// Services defined as [services.NAME], in file order
    #[serde(default)]
    pub services: IndexMap<String, ServiceHooks>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl HooksConfig {
    /// Merges another HooksConfig into self.
    /// Project values from `other` overwrite those in `self` when present;
    /// services with the same name are replaced as a whole.
    pub fn merge(&mut self, other: HooksConfig) {
        let p = other.project;
        let base = &mut self.project;
        overlay(&mut base.name, p.name);
        overlay(&mut base.compose_files, p.compose_files);
        overlay(&mut base.engine, p.engine);
        overlay(&mut base.force_recreate, p.force_recreate);
        overlay(&mut base.no_recreate, p.no_recreate);
        overlay(&mut base.no_build, p.no_build);
        overlay(&mut base.force_build, p.force_build);
        overlay(&mut base.remove_orphans, p.remove_orphans);
        overlay(&mut base.keep_volumes, p.keep_volumes);
        overlay(&mut base.remove_images, p.remove_images);
        overlay(&mut base.keep_on_dispose, p.keep_on_dispose);
        overlay(&mut base.timeout_secs, p.timeout_secs);

        for (name, hooks) in other.services {
            self.services.insert(name, hooks);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.services.keys() {
            validate_service_name(name)?;
        }

        if self.project.no_recreate == Some(true) && self.project.force_recreate == Some(true) {
            bail!("force_recreate and no_recreate cannot both be set");
        }
        if self.project.no_build == Some(true) && self.project.force_build == Some(true) {
            bail!("force_build and no_build cannot both be set");
        }

        Ok(())
    }

    /// Project name, defaulting to the name of the config directory
    pub fn project_name(&self) -> String {
        self.project.name.clone().unwrap_or_else(|| {
            fs::canonicalize(&self.base_dir)
                .unwrap_or_else(|_| self.base_dir.clone())
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_else(|| "hookbox".to_string())
        })
    }

    pub fn engine(&self) -> Engine {
        self.project.engine.unwrap_or_default()
    }

    pub fn compose_files(&self) -> Vec<PathBuf> {
        match &self.project.compose_files {
            Some(files) => files.iter().map(|f| self.base_dir.join(f)).collect(),
            None => vec![self.base_dir.join(DEFAULT_COMPOSE_FILE)],
        }
    }

    pub fn keep_on_dispose(&self) -> bool {
        self.project.keep_on_dispose.unwrap_or(false)
    }

    pub fn compose_options(&self) -> ComposeOptions {
        let p = &self.project;
        ComposeOptions {
            force_recreate: p.force_recreate.unwrap_or(false),
            no_recreate: p.no_recreate.unwrap_or(false),
            no_build: p.no_build.unwrap_or(false),
            force_build: p.force_build.unwrap_or(false),
            remove_orphans: p.remove_orphans.unwrap_or(false),
            keep_volumes: p.keep_volumes.unwrap_or(false),
            image_removal: p.remove_images,
            timeout: p.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Translate the declared hooks into a builder, validating every entry
    pub fn to_builder(&self) -> Result<HooksBuilder> {
        self.validate()?;
        let mut builder = HooksBuilder::new();

        for (name, hooks) in &self.services {
            builder = self
                .add_service(builder, name, hooks)
                .with_context(|| format!("service '{name}'"))?;
        }

        Ok(builder)
    }

    fn add_service(
        &self,
        mut builder: HooksBuilder,
        name: &str,
        hooks: &ServiceHooks,
    ) -> Result<HooksBuilder> {
        for copy in &hooks.copy_on_start {
            let host = self.host_path(&copy.host)?;
            builder = builder.copy_on_start(name, host, copy.container.clone());
        }
        for copy in &hooks.copy_on_dispose {
            let host = self.host_path(&copy.host)?;
            builder = builder.copy_on_dispose(name, copy.container.clone(), host);
        }

        if let Some(wait) = &hooks.wait_for_port {
            let port: PortSpec = wait.port.parse()?;
            builder = builder.wait_for_port(name, port, timeout_or_unbounded(wait.timeout_ms));
        }
        if let Some(wait) = &hooks.wait_for_process {
            builder = builder.wait_for_process(
                name,
                wait.name.clone(),
                timeout_or_unbounded(wait.timeout_ms),
            );
        }
        for spec in &hooks.wait_for_http {
            builder = builder.wait_for_http(name, http_wait(spec)?);
        }

        builder = builder
            .execute_on_running(name, hooks.execute_on_running.iter().cloned())
            .execute_on_disposing(name, hooks.execute_on_disposing.iter().cloned());

        if let Some(export) = &hooks.export_on_dispose {
            let mut directive = ExportDirective::new(self.host_path(&export.host)?, export.explode);
            if export.when == ExportWhen::Running {
                directive = directive.when(|c: &dyn ContainerHandle| {
                    matches!(c.state(), Ok(ContainerState::Running))
                });
            }
            builder = builder.export(name, directive);
        }

        Ok(builder)
    }

    /// Expand `~` and environment variables, then resolve against the config dir
    fn host_path(&self, raw: &str) -> Result<PathBuf> {
        let expanded = shellexpand::full(raw).with_context(|| format!("expanding '{raw}'"))?;
        Ok(self.base_dir.join(expanded.as_ref()))
    }
}

fn overlay<T>(base: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *base = other;
    }
}

fn timeout_or_unbounded(timeout_ms: Option<u64>) -> Timeout {
    timeout_ms.map(Timeout::from_millis).unwrap_or(Timeout::Unbounded)
}

fn http_wait(spec: &HttpWaitSpec) -> Result<HttpWait> {
    let mut wait = HttpWait::new(spec.url.clone());
    if let Some(ms) = spec.timeout_ms {
        wait = wait.timeout(Timeout::from_millis(ms));
    }
    if let Some(method) = &spec.method {
        wait = wait.method(method)?;
    }
    if let Some(content_type) = &spec.content_type {
        wait = wait.content_type(content_type.clone());
    }
    if let Some(body) = &spec.body {
        wait = wait.body(body.clone());
    }

    if spec.expect_status.is_some() || spec.retry_ms.is_some() {
        let expected = spec.expect_status;
        let retry = Duration::from_millis(spec.retry_ms.unwrap_or(500));
        wait = wait.continuation(move |attempt, _| {
            let done = match expected {
                Some(code) => attempt.status == Some(code),
                None => attempt.is_success(),
            };
            if done { None } else { Some(retry) }
        });
    }

    Ok(wait)
}

fn validate_service_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("empty service name");
    }

    let Some(first_char) = name.chars().next() else {
        bail!("empty service name");
    };
    if !first_char.is_alphanumeric() {
        bail!("service name '{}' must start with a letter or digit", name);
    }

    for c in name.chars() {
        if !c.is_alphanumeric() && c != '_' && c != '.' && c != '-' {
            bail!("service name '{}' contains invalid character '{}'", name, c);
        }
    }

    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Parse a hooks file, YAML when the extension says so and TOML otherwise
pub fn parse_hooks_file(path: &Path) -> Result<HooksConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;

    let mut config: HooksConfig = if is_yaml(path) {
        serde_yml::from_str(&content).with_context(|| format!("parsing {:?}", path))?
    } else {
        toml::from_str(&content).with_context(|| format!("parsing {:?}", path))?
    };

    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(config)
}

/// `hookbox.toml` -> `hookbox.local.toml`
pub fn local_overlay_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.local.{ext}"),
        None => format!("{stem}.local"),
    };
    Some(path.with_file_name(name))
}

/// Load a hooks file and merge its local overlay on top, if present
pub fn load_hooks_config(path: &Path) -> Result<HooksConfig> {
    if !path.exists() {
        bail!("hooks file {:?} not found", path);
    }

    let mut config = parse_hooks_file(path)?;
    info!("Loaded {} service(s) from {:?}", config.services.len(), path);

    if let Some(overlay) = local_overlay_path(path).filter(|p| p.exists()) {
        debug!("Merging overlay {:?}", overlay);
        let base_dir = config.base_dir.clone();
        config.merge(parse_hooks_file(&overlay)?);
        config.base_dir = base_dir;
    }

    config.validate()?;
    Ok(config)
}
