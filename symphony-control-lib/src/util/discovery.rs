use std::fmt::{Display, Formatter};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use log::{debug, info, warn};
use serde::Serialize;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use crate::config::ControllerConfig;
use crate::util::error::{ControlError, Result};

/// Probe broadcast to find the controller.
const DISCOVER_MESSAGE: &[u8] = &[0x00, 0x01, 0x00, 0xf5];
/// The only reply that identifies a controller.
const VALID_RESPONSE_MESSAGE: &[u8] = b"YES";

/// A controller that answered the discovery probe.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
pub struct DiscoveredController {
    pub ip_address: Ipv4Addr,
}

impl Display for DiscoveredController {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Light Symphony controller at {}", self.ip_address)
    }
}

pub struct Discovery;

impl Discovery {
    /// True only for a payload that is exactly the acknowledgement token.
    pub fn is_acknowledgement(data: &[u8]) -> bool {
        data == VALID_RESPONSE_MESSAGE
    }

    /**
    Broadcasts one discovery probe and waits for a controller to acknowledge it.

    The sender of the first exact `YES` reply is the controller. Other
    datagrams are ignored until the configured timeout runs out. The socket
    lives only for this call and is closed on every exit path.
     */
    pub async fn discover(config: &ControllerConfig) -> Result<Ipv4Addr> {
        let socket = Self::bind_discovery_socket(config.discovery_bind_port)
            .map_err(ControlError::DiscoverySocket)?;
        socket
            .send_to(
                DISCOVER_MESSAGE,
                (config.broadcast_address, config.discovery_port),
            )
            .await
            .map_err(ControlError::DiscoverySocket)?;
        debug!(
            "Sent discovery probe to {}:{}",
            config.broadcast_address, config.discovery_port
        );

        let mut buffer = [0; 1024];
        let timeout_end = Instant::now() + config.discovery_timeout;

        loop {
            let now = Instant::now();
            if now >= timeout_end {
                break;
            }

            match timeout(timeout_end - now, socket.recv_from(&mut buffer)).await {
                Ok(Ok((number_of_bytes, src_addr))) => {
                    let response = &buffer[..number_of_bytes];
                    debug!(
                        "Discovery reply {:?} from {}",
                        String::from_utf8_lossy(response),
                        src_addr
                    );
                    if !Self::is_acknowledgement(response) {
                        continue;
                    }
                    if let SocketAddr::V4(src_addr) = src_addr {
                        info!("Discovered controller at {}", src_addr.ip());
                        return Ok(*src_addr.ip());
                    }
                }
                Ok(Err(e)) => {
                    warn!("Discovery receive failed: {}", e);
                    return Err(ControlError::DiscoverySocket(e));
                }
                Err(_) => break,
            }
        }

        warn!(
            "No controller answered within {:?}",
            config.discovery_timeout
        );
        Err(ControlError::DiscoveryTimeout(config.discovery_timeout))
    }

    /// Broadcast-capable socket on the discovery port. Address reuse lets
    /// several controller handles in one process discover at the same time.
    fn bind_discovery_socket(port: u16) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SockAddr::from(bind_addr))?;

        UdpSocket::from_std(socket.into())
    }

    pub fn pretty_print(controller: &DiscoveredController, command_port: u16) {
        print!("{}", Self::format_table(controller, command_port));
    }

    fn format_table(controller: &DiscoveredController, command_port: u16) -> String {
        let ip = controller.ip_address.to_string();
        let ip_width = ip.len().max("IP Address".len()) + 2;
        let mut table = format!("{:<ip_width$} {}\n", "IP Address", "Command Port");
        table.push_str(&format!(
            "{:<ip_width$} {}\n",
            "-".repeat(ip_width - 2),
            "-".repeat("Command Port".len())
        ));
        table.push_str(&format!("{:<ip_width$} {}\n", ip, command_port));
        table
    }
}
