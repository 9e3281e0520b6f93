use super::{PORT_POLL_INTERVAL, Probe, poll};
use crate::domain::{ContainerHandle, PortSpec, Protocol, Timeout};
use crate::error::Result;
use std::net::TcpStream;
use std::time::Duration;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Block until `port` on `container` accepts TCP connections.
///
/// UDP ports cannot be probed by connecting, so a UDP port counts as ready as
/// soon as the engine reports a host mapping for it.
pub fn port<C>(container: &C, port: &PortSpec, timeout: Timeout) -> Result<()>
where
    C: ContainerHandle + ?Sized,
{
    let target = format!("port {port} on {}", container.name());
    info!("Waiting for {target} (timeout {timeout})");

    poll(&target, timeout, PORT_POLL_INTERVAL, |deadline| {
        let addr = match container.host_endpoint(port) {
            Ok(Some(addr)) => addr,
            Ok(None) => return Probe::Pending,
            Err(e) => return Probe::Failed(format!("{e:#}")),
        };

        if port.protocol == Protocol::Udp {
            return Probe::Ready(());
        }

        let connect_timeout = deadline.cap(CONNECT_TIMEOUT).max(Duration::from_millis(1));
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(_) => Probe::Ready(()),
            Err(_) => Probe::Pending,
        }
    })
}
