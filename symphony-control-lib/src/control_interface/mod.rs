use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::task::{Context, Poll};

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;

use crate::config::ControllerConfig;
use crate::util::discovery::Discovery;
use crate::util::error::{ControlError, Result};

pub mod command;

pub use command::{Area, CliPowerState, Intensity, LightingCommand};

/// A command waiting in the queue together with where its outcome goes.
struct QueuedCommand {
    command: LightingCommand,
    reply: oneshot::Sender<Result<()>>,
}

/**
Handle to a Light Symphony controller.

Commands are queued in call order and handed to a single worker task, which
sends them one at a time. After each send the worker pauses for
`command_delay` before it reports the outcome and picks up the next command.
The controller address is resolved by discovery the first time it is needed
unless it was configured up front.

Clones share the same queue and worker. The worker exits once every handle is
dropped and the queue has drained.
 */
#[derive(Debug, Clone)]
pub struct ControlInterface {
    sender: mpsc::UnboundedSender<QueuedCommand>,
    address: watch::Receiver<Option<Ipv4Addr>>,
}

impl ControlInterface {
    /// Starts the command worker. Must be called from within a Tokio runtime.
    pub fn new(config: ControllerConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (address_tx, address) = watch::channel(config.ip_address);

        let worker = CommandWorker {
            ip_address: config.ip_address,
            config,
            address_tx,
        };
        tokio::spawn(worker.run(receiver));

        ControlInterface { sender, address }
    }

    /// The controller address, if configured or already discovered.
    pub fn controller_address(&self) -> Option<Ipv4Addr> {
        *self.address.borrow()
    }

    /// Queues a command. It is queued even if the returned future is never awaited.
    pub fn send_command(&self, command: LightingCommand) -> PendingCommand {
        let (reply, receiver) = oneshot::channel();
        if let Err(mpsc::error::SendError(queued)) =
            self.sender.send(QueuedCommand { command, reply })
        {
            let _ = queued.reply.send(Err(ControlError::QueueClosed));
        }
        PendingCommand { receiver }
    }

    /// Turns every area on or off.
    pub fn set_all(&self, on: bool) -> PendingCommand {
        self.send_command(LightingCommand::All { on })
    }

    /// Turns a single area on or off. Fails without queueing if the area is out of range.
    pub fn set_area(&self, area: u8, on: bool) -> Result<PendingCommand> {
        let area = Area::new(area)?;
        Ok(self.send_command(LightingCommand::Area { area, on }))
    }

    /// Sets an area's intensity. The area is validated before the intensity,
    /// and nothing is queued if either is out of range.
    pub fn set_intensity(&self, area: u8, intensity: u8) -> Result<PendingCommand> {
        let area = Area::new(area)?;
        let intensity = Intensity::new(intensity)?;
        Ok(self.send_command(LightingCommand::Intensity { area, intensity }))
    }
}

/// Outcome of a queued command. Resolves exactly once, after the command was
/// sent and the post-send delay has passed, or as soon as discovery fails.
#[derive(Debug)]
#[must_use = "the command is queued either way; await this to learn whether it was sent"]
pub struct PendingCommand {
    receiver: oneshot::Receiver<Result<()>>,
}

impl Future for PendingCommand {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ControlError::QueueClosed)))
    }
}

/// Owns the controller address and drains the queue, one command at a time.
struct CommandWorker {
    config: ControllerConfig,
    ip_address: Option<Ipv4Addr>,
    address_tx: watch::Sender<Option<Ipv4Addr>>,
}

impl CommandWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<QueuedCommand>) {
        while let Some(queued) = receiver.recv().await {
            let result = self.process(&queued.command).await;
            // The caller may have dropped its PendingCommand.
            let _ = queued.reply.send(result);
        }
        debug!("Command queue closed, worker exiting");
    }

    async fn process(&mut self, command: &LightingCommand) -> Result<()> {
        let ip_address = self.resolve_address().await?;

        let result = self.send_datagram(command, ip_address).await;
        if let Err(e) = &result {
            warn!("Failed to send {} to {}: {}", command, ip_address, e);
        }

        sleep(self.config.command_delay).await;
        result
    }

    async fn resolve_address(&mut self) -> Result<Ipv4Addr> {
        if let Some(ip_address) = self.ip_address {
            return Ok(ip_address);
        }

        let ip_address = Discovery::discover(&self.config).await.map_err(|e| {
            warn!("Controller discovery failed: {}", e);
            e
        })?;
        self.ip_address = Some(ip_address);
        self.address_tx.send_replace(Some(ip_address));
        Ok(ip_address)
    }

    async fn send_datagram(&self, command: &LightingCommand, ip_address: Ipv4Addr) -> Result<()> {
        debug!("Sending: {} to {}", command, ip_address);
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(ControlError::Send)?;
        socket
            .send_to(&command.to_datagram(), (ip_address, self.config.command_port))
            .await
            .map_err(ControlError::Send)?;
        Ok(())
    }
}
