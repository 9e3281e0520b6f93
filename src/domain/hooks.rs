use super::container::{PortSpec, Timeout};
use super::traits::ContainerHandle;
use crate::error::{HookError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout of an HTTP wait
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// A file transfer between host and container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPair {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl CopyPair {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortWait {
    pub port: PortSpec,
    pub timeout: Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWait {
    pub process: String,
    pub timeout: Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Put,
    Post,
    Delete,
}

impl FromStr for HttpMethod {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            other => Err(HookError::configuration(format!(
                "HTTP method '{other}' is not supported, use GET, PUT, POST or DELETE"
            ))),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// What one HTTP attempt produced.
///
/// `status` is `None` when the request never got a response; `error` then
/// carries the network fault.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpAttempt {
    pub status: Option<u16>,
    pub body: String,
    pub error: Option<String>,
}

impl HttpAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(code) if (200..300).contains(&code))
    }
}

/// Decides from the last attempt and the attempt count how long to wait
/// before retrying. `None` or a zero delay ends the wait.
pub type Continuation = Arc<dyn Fn(&HttpAttempt, u32) -> Option<Duration> + Send + Sync>;

/// An HTTP readiness condition
#[derive(Clone)]
pub struct HttpWait {
    pub url: String,
    pub timeout: Timeout,
    pub continuation: Option<Continuation>,
    pub method: HttpMethod,
    pub content_type: String,
    pub body: Option<String>,
}

impl HttpWait {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Timeout::After(DEFAULT_HTTP_TIMEOUT),
            continuation: None,
            method: HttpMethod::Get,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body: None,
        }
    }

    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Set the method by name; only GET, PUT, POST and DELETE are accepted.
    pub fn method(mut self, method: &str) -> Result<Self> {
        self.method = method.parse()?;
        Ok(self)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn continuation<F>(mut self, continuation: F) -> Self
    where
        F: Fn(&HttpAttempt, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        self.continuation = Some(Arc::new(continuation));
        self
    }
}

impl fmt::Debug for HttpWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWait")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("continuation", &self.continuation.is_some())
            .field("method", &self.method)
            .field("content_type", &self.content_type)
            .field("body", &self.body)
            .finish()
    }
}

pub type ExportCondition = Arc<dyn Fn(&dyn ContainerHandle) -> bool + Send + Sync>;

/// Export of a container filesystem when the group is removed
#[derive(Clone)]
pub struct ExportDirective {
    pub host_path: PathBuf,
    pub explode: bool,
    pub condition: ExportCondition,
}

impl ExportDirective {
    pub fn new(host_path: impl Into<PathBuf>, explode: bool) -> Self {
        Self {
            host_path: host_path.into(),
            explode,
            condition: Arc::new(|_| true),
        }
    }

    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&dyn ContainerHandle) -> bool + Send + Sync + 'static,
    {
        self.condition = Arc::new(condition);
        self
    }

    pub fn applies_to(&self, container: &dyn ContainerHandle) -> bool {
        (self.condition)(container)
    }
}

impl fmt::Debug for ExportDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportDirective")
            .field("host_path", &self.host_path)
            .field("explode", &self.explode)
            .finish_non_exhaustive()
    }
}

/// Hook declarations of one service.
///
/// List fields accumulate across declarations; single fields keep the last
/// declaration. An empty or absent field means no hook of that kind.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfiguration {
    pub name: String,
    pub copy_to_on_start: Vec<CopyPair>,
    pub copy_from_on_dispose: Vec<CopyPair>,
    pub wait_for_port: Option<PortWait>,
    pub wait_for_process: Option<ProcessWait>,
    pub wait_for_http: Vec<HttpWait>,
    pub execute_on_running: Vec<String>,
    pub execute_on_disposing: Vec<String>,
    pub export_on_dispose: Option<ExportDirective>,
}

impl ServiceConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when no hook of any kind is declared
    pub fn is_empty(&self) -> bool {
        self.copy_to_on_start.is_empty()
            && self.copy_from_on_dispose.is_empty()
            && self.wait_for_port.is_none()
            && self.wait_for_process.is_none()
            && self.wait_for_http.is_empty()
            && self.execute_on_running.is_empty()
            && self.execute_on_disposing.is_empty()
            && self.export_on_dispose.is_none()
    }
}
