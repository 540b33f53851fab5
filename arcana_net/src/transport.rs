//! renet adapters for [`ReplicationChannel`]: the host runs a netcode server that admits a
//! single guest, the guest runs a client. Both use the reliable ordered channel only.

use std::{
    collections::VecDeque,
    net::{SocketAddr, UdpSocket},
    time::{Duration, Instant, SystemTime},
};

use anyhow::{anyhow, Context};
use arcana_core::session::{ChannelError, ReplicationChannel};
use log::{debug, info, warn};
use renet::{
    transport::{
        ClientAuthentication, NetcodeClientTransport, NetcodeServerTransport,
        ServerAuthentication, ServerConfig,
    },
    ClientId, ConnectionConfig, DefaultChannel, RenetClient, RenetServer, ServerEvent,
};

const PROTOCOL_ID: u64 = 0x4152_4341;

fn since_epoch() -> anyhow::Result<Duration> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("system clock is before 1970")
}

#[derive(Debug, PartialEq, Eq)]
pub enum LinkEvent {
    GuestJoined,
    GuestLeft,
}

pub struct ServerLink {
    server: RenetServer,
    transport: NetcodeServerTransport,
    guest: Option<ClientId>,
    inbox: VecDeque<String>,
    last_updated: Instant,
}

impl ServerLink {
    pub fn bind(port: u16) -> anyhow::Result<Self> {
        let public_addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        let server_config = ServerConfig {
            current_time: since_epoch()?,
            max_clients: 2,
            protocol_id: PROTOCOL_ID,
            public_addresses: vec![public_addr],
            authentication: ServerAuthentication::Unsecure,
        };
        let socket = UdpSocket::bind(public_addr)
            .with_context(|| format!("cannot bind UDP port {}", port))?;
        let transport = NetcodeServerTransport::new(server_config, socket)?;
        Ok(ServerLink {
            server: RenetServer::new(ConnectionConfig::default()),
            transport,
            guest: None,
            inbox: VecDeque::new(),
            last_updated: Instant::now(),
        })
    }

    /// Advances the netcode state and collects whatever the guest sent.
    pub fn update(&mut self) -> anyhow::Result<Vec<LinkEvent>> {
        let now = Instant::now();
        let duration = now - self.last_updated;
        self.last_updated = now;

        self.server.update(duration);
        self.transport
            .update(duration, &mut self.server)
            .map_err(|e| anyhow!("server transport failed: {:?}", e))?;

        let mut events = vec![];
        while let Some(event) = self.server.get_event() {
            match event {
                ServerEvent::ClientConnected { client_id } => {
                    if self.guest.is_some() {
                        warn!("Table is full, turning away client {}", client_id);
                        self.server.disconnect(client_id);
                        continue;
                    }
                    info!("Client {} joined as P2", client_id);
                    self.guest = Some(client_id);
                    events.push(LinkEvent::GuestJoined);
                }
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    if self.guest == Some(client_id) {
                        info!("Client {} left: {}", client_id, reason);
                        self.guest = None;
                        events.push(LinkEvent::GuestLeft);
                    }
                }
            }
        }

        if let Some(guest) = self.guest {
            while let Some(message) = self
                .server
                .receive_message(guest, DefaultChannel::ReliableOrdered)
            {
                match String::from_utf8(message.to_vec()) {
                    Ok(text) => self.inbox.push_back(text),
                    Err(e) => warn!("dropping non-UTF-8 message from guest: {}", e),
                }
            }
        }
        Ok(events)
    }

    pub fn flush(&mut self) {
        self.transport.send_packets(&mut self.server);
    }
}

impl ReplicationChannel for ServerLink {
    fn send(&mut self, text: String) -> Result<(), ChannelError> {
        let guest = self.guest.ok_or(ChannelError::Closed)?;
        debug!("-> {}", text);
        self.server
            .send_message(guest, DefaultChannel::ReliableOrdered, text);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        self.inbox.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.guest.is_some()
    }
}

pub struct ClientLink {
    client: RenetClient,
    transport: NetcodeClientTransport,
    last_updated: Instant,
}

impl ClientLink {
    pub fn connect(server_addr: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("cannot bind a local UDP socket")?;
        let current_time = since_epoch()?;
        let authentication = ClientAuthentication::Unsecure {
            server_addr,
            client_id: current_time.as_millis() as u64,
            user_data: None,
            protocol_id: PROTOCOL_ID,
        };
        let transport = NetcodeClientTransport::new(current_time, authentication, socket)
            .map_err(|e| anyhow!("cannot reach {}: {:?}", server_addr, e))?;
        Ok(ClientLink {
            client: RenetClient::new(ConnectionConfig::default()),
            transport,
            last_updated: Instant::now(),
        })
    }

    pub fn update(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let duration = now - self.last_updated;
        self.last_updated = now;

        self.client.update(duration);
        self.transport
            .update(duration, &mut self.client)
            .map_err(|e| anyhow!("client transport failed: {:?}", e))
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.transport
            .send_packets(&mut self.client)
            .map_err(|e| anyhow!("client transport failed: {:?}", e))
    }

    pub fn is_disconnected(&self) -> bool {
        self.client.is_disconnected()
    }
}

impl ReplicationChannel for ClientLink {
    fn send(&mut self, text: String) -> Result<(), ChannelError> {
        if self.client.is_disconnected() {
            return Err(ChannelError::Closed);
        }
        debug!("-> {}", text);
        self.client
            .send_message(DefaultChannel::ReliableOrdered, text.into_bytes());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        loop {
            let message = self.client.receive_message(DefaultChannel::ReliableOrdered)?;
            match String::from_utf8(message.to_vec()) {
                Ok(text) => return Some(text),
                Err(e) => warn!("dropping non-UTF-8 message from host: {}", e),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }
}
