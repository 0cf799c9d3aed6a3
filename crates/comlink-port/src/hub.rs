use comlink_frame::{Message, PortId, CONTROL};
use comlink_transport::Transport;
use tracing::{debug, warn};

use crate::command::Commander;
use crate::error::{PortError, Result};
use crate::memory::{MemoryAccess, MemoryMap};
use crate::port::{Outbox, Port, PortConfig};
use crate::registry::InterfaceRegistry;

/// Maximum number of ports a hub can hold (one per [`PortId`] value).
pub const MAX_PORTS: usize = PortId::MAX as usize + 1;

/// Totals for one [`Hub::poll`] tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub bytes_received: usize,
    /// Messages handed to a handler successfully.
    pub messages: usize,
    /// Messages dropped or answered with an ERROR.
    pub rejected: usize,
    pub bytes_sent: usize,
    /// Ports whose transport failed this tick. Their remaining work is
    /// skipped; the other ports are still polled.
    pub failed_ports: usize,
}

impl PollReport {
    pub fn is_idle(&self) -> bool {
        self.bytes_received == 0 && self.bytes_sent == 0
    }
}

/// Owns every port and routes complete messages to interface handlers.
///
/// Routing order for a message:
/// 1. the handler registered for its interface,
/// 2. the built-in [`Commander`] if the interface is 0,
/// 3. otherwise it is dropped.
///
/// Handlers run on the thread calling [`Hub::poll`], one message at a time.
#[derive(Debug)]
pub struct Hub<M = MemoryMap> {
    ports: Vec<Port>,
    registry: InterfaceRegistry,
    commander: Commander<M>,
}

impl Hub<MemoryMap> {
    /// Create a hub whose control interface sees an empty memory map.
    pub fn new() -> Self {
        Self::with_memory(MemoryMap::new())
    }
}

impl Default for Hub<MemoryMap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MemoryAccess> Hub<M> {
    /// Create a hub backed by `memory` for READ_FROM / WRITE_TO.
    pub fn with_memory(memory: M) -> Self {
        Self {
            ports: Vec::new(),
            registry: InterfaceRegistry::new(),
            commander: Commander::new(memory),
        }
    }

    /// Attach a transport as a new port with default configuration.
    pub fn add_port(&mut self, transport: impl Transport + 'static) -> Result<PortId> {
        self.add_port_with_config(transport, PortConfig::default())
    }

    /// Attach a transport as a new port.
    pub fn add_port_with_config(
        &mut self,
        transport: impl Transport + 'static,
        config: PortConfig,
    ) -> Result<PortId> {
        if self.ports.len() >= MAX_PORTS {
            return Err(PortError::TooManyPorts { max: MAX_PORTS });
        }
        let id = self.ports.len() as PortId;
        self.ports.push(Port::with_config(id, transport, config));
        debug!(port = id, "port added");
        Ok(id)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(usize::from(id))
    }

    pub fn port_mut(&mut self, id: PortId) -> Option<&mut Port> {
        self.ports.get_mut(usize::from(id))
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Bind a handler to `interface`. Registering on interface 0 replaces
    /// the built-in memory commands.
    pub fn register_interface<F>(&mut self, interface: u8, callback: F) -> Result<()>
    where
        F: FnMut(&Message, &mut Outbox<'_>) + 'static,
    {
        self.registry.register(interface, callback)?;
        debug!(interface, "interface enabled");
        Ok(())
    }

    pub fn unregister_interface(&mut self, interface: u8) -> Result<()> {
        self.registry.unregister(interface)?;
        debug!(interface, "interface disabled");
        Ok(())
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Queue `msg` on the port named by `msg.port`.
    pub fn put_message(&mut self, msg: &Message) -> Result<()> {
        Outbox::new(&mut self.ports).put_message(msg)
    }

    /// Drain one port's transmit queue into its transport.
    pub fn send(&mut self, port: PortId) -> Result<usize> {
        self.port_mut(port)
            .ok_or(PortError::UnknownPort(port))?
            .send()
    }

    /// Route one message to its handler.
    pub fn dispatch(&mut self, msg: &Message) -> Result<()> {
        let Self {
            ports,
            registry,
            commander,
        } = self;
        let mut outbox = Outbox::new(ports);
        let interface = msg.interface();

        if let Some(callback) = registry.get_mut(interface) {
            callback(msg, &mut outbox);
            return Ok(());
        }
        if interface == CONTROL {
            return commander.handle(msg, &mut outbox);
        }

        warn!(
            port = msg.port,
            interface,
            id = msg.id(),
            "dropping message for disabled interface"
        );
        Err(PortError::InterfaceNotEnabled(interface))
    }

    /// Run one tick over every port: read, dispatch, then send.
    ///
    /// Each port gets up to `max_reads_per_poll` transport reads. Messages
    /// completed by a read are dispatched before the next read, so replies
    /// are queued in arrival order. Dispatch failures are logged and
    /// counted. A transport failure ends that port's turn and is counted in
    /// [`PollReport::failed_ports`]; it never stops the other ports.
    pub fn poll(&mut self) -> Result<PollReport> {
        let mut report = PollReport::default();
        let mut inbox = Vec::new();

        for index in 0..self.ports.len() {
            if let Err(err) = self.poll_port(index, &mut inbox, &mut report) {
                warn!(port = index, %err, "port failed, skipping it this tick");
                inbox.clear();
                report.failed_ports += 1;
            }
        }

        Ok(report)
    }

    fn poll_port(
        &mut self,
        index: usize,
        inbox: &mut Vec<Message>,
        report: &mut PollReport,
    ) -> Result<()> {
        let reads = self.ports[index].config().max_reads_per_poll.max(1);
        for _ in 0..reads {
            let received = self.ports[index].receive(|msg| inbox.push(msg))?;
            report.bytes_received += received.bytes;

            for msg in inbox.drain(..) {
                match self.dispatch(&msg) {
                    Ok(()) => report.messages += 1,
                    Err(err) => {
                        debug!(port = msg.port, %err, "dispatch failed");
                        report.rejected += 1;
                    }
                }
            }

            if received.bytes == 0 {
                break;
            }
        }
        report.bytes_sent += self.ports[index].send()?;
        Ok(())
    }

    /// Memory backend used by the built-in control commands.
    pub fn memory(&self) -> &M {
        self.commander.memory()
    }

    pub fn memory_mut(&mut self) -> &mut M {
        self.commander.memory_mut()
    }
}
