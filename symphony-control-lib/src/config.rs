use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// UDP port the controller listens on for text commands.
pub const COMMAND_PORT: u16 = 10001;
/// UDP port used for the discovery probe and its reply.
pub const DISCOVER_PORT: u16 = 30718;
/// How long discovery waits for an acknowledgement.
pub const DISCOVER_TIMEOUT: Duration = Duration::from_millis(1000);
/// Pause after every command send, so the controller is not flooded.
pub const COMMAND_DELAY: Duration = Duration::from_millis(500);
/// Broadcast address used for discovery unless configured otherwise.
pub const DEFAULT_BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Where the controller lives and how to talk to it.
///
/// Missing keys fall back to the protocol defaults, so an empty document is a
/// valid configuration that discovers the controller by broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Known controller address. When set, discovery never runs.
    pub ip_address: Option<Ipv4Addr>,
    pub broadcast_address: Ipv4Addr,
    pub command_port: u16,
    /// Destination port of the discovery probe.
    pub discovery_port: u16,
    /// Local port the probe is sent from; the controller answers here.
    pub discovery_bind_port: u16,
    #[serde(
        rename = "discovery_timeout_ms",
        serialize_with = "serialize_duration_millis",
        deserialize_with = "deserialize_duration_millis"
    )]
    pub discovery_timeout: Duration,
    #[serde(
        rename = "command_delay_ms",
        serialize_with = "serialize_duration_millis",
        deserialize_with = "deserialize_duration_millis"
    )]
    pub command_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            ip_address: None,
            broadcast_address: DEFAULT_BROADCAST_ADDRESS,
            command_port: COMMAND_PORT,
            discovery_port: DISCOVER_PORT,
            discovery_bind_port: DISCOVER_PORT,
            discovery_timeout: DISCOVER_TIMEOUT,
            command_delay: COMMAND_DELAY,
        }
    }
}

impl ControllerConfig {
    pub fn with_ip_address(mut self, ip_address: Ipv4Addr) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    pub fn with_broadcast_address(mut self, broadcast_address: Ipv4Addr) -> Self {
        self.broadcast_address = broadcast_address;
        self
    }
}

fn serialize_duration_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis: u64 = Deserialize::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}
