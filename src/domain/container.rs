use crate::error::HookError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    NotCreated,
}

/// Outcome of a command executed inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub success: bool,
    pub error: String,
    pub exit_code: Option<i32>,
}

impl ExecResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            exit_code: Some(exit_code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Container port qualified by protocol, e.g. `80/tcp`
///
/// A bare number defaults to TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSpec {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortSpec {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }
}

impl FromStr for PortSpec {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (port, protocol) = match s.split_once('/') {
            Some((port, proto)) => {
                let protocol = match proto.to_ascii_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    other => {
                        return Err(HookError::configuration(format!(
                            "unsupported protocol '{other}' in port '{s}'"
                        )));
                    }
                };
                (port, protocol)
            }
            None => (s, Protocol::Tcp),
        };

        let port: u16 = port
            .parse()
            .map_err(|_| HookError::configuration(format!("invalid port '{s}'")))?;
        if port == 0 {
            return Err(HookError::configuration(format!("invalid port '{s}'")));
        }

        Ok(Self { port, protocol })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// How long a wait strategy may block.
///
/// `Unbounded` blocks until the condition holds, possibly forever. It is what
/// `from_millis(u64::MAX)` produces, so callers passing the maximum value get
/// the indefinite wait they asked for rather than an overflowing deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    After(Duration),
    Unbounded,
}

impl Timeout {
    pub fn from_millis(millis: u64) -> Self {
        if millis == u64::MAX {
            Self::Unbounded
        } else {
            Self::After(Duration::from_millis(millis))
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::After(d) => write!(f, "{}ms", d.as_millis()),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_spec_parsing() {
        assert_eq!("80/tcp".parse::<PortSpec>().unwrap(), PortSpec::tcp(80));
        assert_eq!("8080".parse::<PortSpec>().unwrap(), PortSpec::tcp(8080));

        let udp: PortSpec = "53/UDP".parse().unwrap();
        assert_eq!(udp.protocol, Protocol::Udp);
        assert_eq!(udp.to_string(), "53/udp");
    }

    #[test]
    fn test_port_spec_rejects_garbage() {
        assert!("http".parse::<PortSpec>().is_err());
        assert!("0/tcp".parse::<PortSpec>().is_err());
        assert!("80/sctp".parse::<PortSpec>().is_err());
        assert!("70000".parse::<PortSpec>().is_err());
    }

    #[test]
    fn test_max_millis_is_unbounded() {
        assert!(Timeout::from_millis(u64::MAX).is_unbounded());
        assert_eq!(
            Timeout::from_millis(5000),
            Timeout::After(Duration::from_secs(5))
        );
    }
}
