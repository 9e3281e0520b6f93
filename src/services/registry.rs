use crate::domain::{
    ContainerHandle, CopyPair, ExportDirective, HttpWait, PortSpec, PortWait, ProcessWait,
    ServiceConfiguration, Timeout,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// Hook declarations for every service of a composite service.
///
/// Immutable once built; services keep the order of their first declaration.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationRegistry {
    services: Vec<ServiceConfiguration>,
    index: HashMap<String, usize>,
}

impl ConfigurationRegistry {
    pub fn get(&self, service: &str) -> Option<&ServiceConfiguration> {
        self.index.get(service).map(|&i| &self.services[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceConfiguration> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn entry(&mut self, service: &str) -> &mut ServiceConfiguration {
        let i = match self.index.get(service) {
            Some(&i) => i,
            None => {
                self.services.push(ServiceConfiguration::new(service));
                let i = self.services.len() - 1;
                self.index.insert(service.to_string(), i);
                i
            }
        };
        &mut self.services[i]
    }
}

/// Collects per-service hook declarations.
///
/// ```
/// use hookbox::services::HooksBuilder;
/// use hookbox::domain::Timeout;
///
/// let registry = HooksBuilder::new()
///     .copy_on_start("web", "fixtures/index.html", "/usr/share/nginx/html/index.html")
///     .wait_for_port("web", "80/tcp".parse().unwrap(), Timeout::from_millis(30_000))
///     .execute_on_running("web", ["nginx -t"])
///     .build();
///
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct HooksBuilder {
    registry: ConfigurationRegistry,
}

impl HooksBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_on_start(
        mut self,
        service: &str,
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
    ) -> Self {
        self.registry
            .entry(service)
            .copy_to_on_start
            .push(CopyPair::new(host_path, container_path));
        self
    }

    pub fn copy_on_dispose(
        mut self,
        service: &str,
        container_path: impl Into<String>,
        host_path: impl Into<PathBuf>,
    ) -> Self {
        self.registry
            .entry(service)
            .copy_from_on_dispose
            .push(CopyPair::new(host_path, container_path));
        self
    }

    /// Replaces any earlier port wait of the service
    pub fn wait_for_port(mut self, service: &str, port: PortSpec, timeout: Timeout) -> Self {
        self.registry.entry(service).wait_for_port = Some(PortWait { port, timeout });
        self
    }

    /// Replaces any earlier process wait of the service
    pub fn wait_for_process(
        mut self,
        service: &str,
        process: impl Into<String>,
        timeout: Timeout,
    ) -> Self {
        self.registry.entry(service).wait_for_process = Some(ProcessWait {
            process: process.into(),
            timeout,
        });
        self
    }

    pub fn wait_for_http(mut self, service: &str, wait: HttpWait) -> Self {
        self.registry.entry(service).wait_for_http.push(wait);
        self
    }

    /// Each command is run through the container's shell once it is running
    pub fn execute_on_running<I, S>(mut self, service: &str, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry
            .entry(service)
            .execute_on_running
            .extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn execute_on_disposing<I, S>(mut self, service: &str, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry
            .entry(service)
            .execute_on_disposing
            .extend(commands.into_iter().map(Into::into));
        self
    }

    /// Export the container as a tar archive at `host_path` when removed
    pub fn export_on_dispose(self, service: &str, host_path: impl Into<PathBuf>) -> Self {
        self.export(service, ExportDirective::new(host_path, false))
    }

    /// Export the container as a directory tree at `host_path` when removed
    pub fn export_exploded_on_dispose(self, service: &str, host_path: impl Into<PathBuf>) -> Self {
        self.export(service, ExportDirective::new(host_path, true))
    }

    pub fn export_on_dispose_when<F>(
        self,
        service: &str,
        host_path: impl Into<PathBuf>,
        explode: bool,
        condition: F,
    ) -> Self
    where
        F: Fn(&dyn ContainerHandle) -> bool + Send + Sync + 'static,
    {
        self.export(
            service,
            ExportDirective::new(host_path, explode).when(condition),
        )
    }

    /// Replaces any earlier export of the service
    pub fn export(mut self, service: &str, directive: ExportDirective) -> Self {
        self.registry.entry(service).export_on_dispose = Some(directive);
        self
    }

    pub fn build(self) -> ConfigurationRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_one_configuration_per_service() {
        let registry = HooksBuilder::new()
            .execute_on_running("web", ["echo a"])
            .execute_on_running("db", ["echo b"])
            .execute_on_running("web", ["echo c"])
            .build();

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web", "db"]);
        assert_eq!(
            registry.get("web").unwrap().execute_on_running,
            vec!["echo a", "echo c"]
        );
    }

    #[test]
    fn test_port_wait_last_write_wins() {
        let registry = HooksBuilder::new()
            .wait_for_port("web", PortSpec::tcp(80), Timeout::from_millis(1000))
            .wait_for_port("web", PortSpec::tcp(443), Timeout::from_millis(2000))
            .build();

        let wait = registry.get("web").unwrap().wait_for_port.unwrap();
        assert_eq!(wait.port, PortSpec::tcp(443));
        assert_eq!(wait.timeout, Timeout::from_millis(2000));
    }

    #[test]
    fn test_process_wait_last_write_wins() {
        let registry = HooksBuilder::new()
            .wait_for_process("db", "initdb", Timeout::Unbounded)
            .wait_for_process("db", "postgres", Timeout::from_millis(10))
            .build();

        let wait = registry.get("db").unwrap().wait_for_process.clone().unwrap();
        assert_eq!(wait.process, "postgres");
    }

    #[test]
    fn test_copy_on_start_accumulates() {
        let registry = HooksBuilder::new()
            .copy_on_start("web", "a.conf", "/etc/a.conf")
            .copy_on_start("web", "b.conf", "/etc/b.conf")
            .copy_on_dispose("web", "/var/log", "logs")
            .build();

        let config = registry.get("web").unwrap();
        assert_eq!(config.copy_to_on_start.len(), 2);
        assert_eq!(config.copy_to_on_start[1].host_path, Path::new("b.conf"));
        assert_eq!(config.copy_from_on_dispose[0].container_path, "/var/log");
    }

    #[test]
    fn test_http_waits_accumulate() {
        let registry = HooksBuilder::new()
            .wait_for_http("web", HttpWait::new("http://localhost:8080/health"))
            .wait_for_http("web", HttpWait::new("http://localhost:8080/ready"))
            .build();

        assert_eq!(registry.get("web").unwrap().wait_for_http.len(), 2);
    }

    #[test]
    fn test_export_last_write_wins() {
        let registry = HooksBuilder::new()
            .export_on_dispose("web", "/tmp/web.tar")
            .export_exploded_on_dispose("web", "/tmp/web")
            .build();

        let export = registry.get("web").unwrap().export_on_dispose.clone().unwrap();
        assert!(export.explode);
        assert_eq!(export.host_path, Path::new("/tmp/web"));
    }

    #[test]
    fn test_undeclared_service_is_absent() {
        let registry = HooksBuilder::new().build();
        assert!(registry.is_empty());
        assert!(registry.get("web").is_none());
    }
}
