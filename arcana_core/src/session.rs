use std::{
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    time::Instant,
};

use log::{debug, warn};
use rand::Rng;
use thiserror::Error;

use crate::{
    action::{Action, Seat, TurnAction},
    config::SessionConfig,
    event::Event,
    game_state::GameState,
    message::{AceContext, Envelope, ProtocolError},
    resolver::{Outcome, ResolveError, TurnResolver},
};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("replication channel is closed")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reliable, ordered text pipe between host and guest.
pub trait ReplicationChannel {
    fn send(&mut self, text: String) -> Result<(), ChannelError>;
    fn try_recv(&mut self) -> Option<String>;
    fn is_connected(&self) -> bool;
}

/// In-process channel endpoint. Dropping one side disconnects the other.
pub struct LocalChannel {
    sender: Sender<String>,
    receiver: Receiver<String>,
    connected: bool,
}

impl LocalChannel {
    pub fn pair() -> (LocalChannel, LocalChannel) {
        let (host_tx, guest_rx) = channel();
        let (guest_tx, host_rx) = channel();
        (
            LocalChannel {
                sender: host_tx,
                receiver: host_rx,
                connected: true,
            },
            LocalChannel {
                sender: guest_tx,
                receiver: guest_rx,
                connected: true,
            },
        )
    }
}

impl ReplicationChannel for LocalChannel {
    fn send(&mut self, text: String) -> Result<(), ChannelError> {
        if self.sender.send(text).is_err() {
            self.connected = false;
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        match self.receiver.try_recv() {
            Ok(text) => Some(text),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected = false;
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Guest,
    Local,
}

impl From<Seat> for Recipient {
    fn from(seat: Seat) -> Self {
        match seat {
            Seat::P1 => Recipient::Local,
            Seat::P2 => Recipient::Guest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub recipient: Recipient,
    pub message: Envelope,
}

impl Dispatch {
    fn to(recipient: Recipient, message: Envelope) -> Self {
        Dispatch { recipient, message }
    }
}

/// The authoritative side of a two-player session. The host always sits in `P1`.
pub struct HostSession<R> {
    resolver: TurnResolver<R>,
}

impl<R: Rng> HostSession<R> {
    pub fn new(rng: R, config: SessionConfig) -> Self {
        HostSession {
            resolver: TurnResolver::new(rng, config),
        }
    }

    pub fn from_resolver(resolver: TurnResolver<R>) -> Self {
        HostSession { resolver }
    }

    pub fn state(&self) -> &GameState {
        self.resolver.state()
    }

    pub fn resolver(&self) -> &TurnResolver<R> {
        &self.resolver
    }

    /// A (re)connected guest always gets a full snapshot first.
    pub fn on_connected(&self) -> Vec<Dispatch> {
        self.resync()
    }

    pub fn resync(&self) -> Vec<Dispatch> {
        vec![Dispatch::to(
            Recipient::Guest,
            Envelope::Sync {
                state: self.state().clone(),
            },
        )]
    }

    /// Handles one text message from the guest. Malformed input is logged and dropped.
    pub fn on_text(&mut self, text: &str, now: Instant) -> Vec<Dispatch> {
        match Envelope::decode(text) {
            Ok(Envelope::TurnAction { action }) if action.from == Seat::P2 => {
                let outcomes = self.resolver.handle(action, now);
                self.dispatch(outcomes)
            }
            Ok(Envelope::TurnAction { action }) => {
                warn!("guest tried to act for {}, dropping {}", action.from, action);
                vec![]
            }
            Ok(other) => {
                warn!("{}", ProtocolError::Unexpected(other.kind()));
                vec![]
            }
            Err(error) => {
                warn!("{}", error);
                vec![]
            }
        }
    }

    /// Feeds an action typed at the host's own console.
    ///
    /// Unlike guest input, a rejection of the request itself is returned to the caller.
    pub fn submit_local(
        &mut self,
        action: Action,
        now: Instant,
    ) -> Result<Vec<Dispatch>, ResolveError> {
        let mut outcomes = self
            .resolver
            .handle(TurnAction::new(Seat::P1, action), now)
            .into_iter();
        match outcomes.next() {
            Some(Outcome::Rejected(error)) => Err(error),
            first => Ok(self.dispatch(first.into_iter().chain(outcomes).collect())),
        }
    }

    pub fn expire(&mut self, now: Instant) -> Vec<Dispatch> {
        let outcomes = self.resolver.expire(now);
        self.dispatch(outcomes)
    }

    /// Drains the channel, settles overdue Ace offers and sends everything bound for the
    /// guest. Dispatches for the local player are returned.
    pub fn pump<C: ReplicationChannel>(
        &mut self,
        channel: &mut C,
        now: Instant,
    ) -> Result<Vec<Dispatch>, ChannelError> {
        let mut dispatches = vec![];
        while let Some(text) = channel.try_recv() {
            dispatches.extend(self.on_text(&text, now));
        }
        dispatches.extend(self.expire(now));
        deliver(channel, dispatches)
    }

    fn dispatch(&self, outcomes: Vec<Outcome>) -> Vec<Dispatch> {
        let mut dispatches = vec![];
        for outcome in outcomes {
            match outcome {
                Outcome::Applied(events) => {
                    let message = Envelope::Apply {
                        state: self.state().clone(),
                        events,
                    };
                    dispatches.push(Dispatch::to(Recipient::Guest, message.clone()));
                    dispatches.push(Dispatch::to(Recipient::Local, message));
                }
                Outcome::AceOffered(offer) => dispatches.push(Dispatch::to(
                    offer.target.into(),
                    Envelope::AceOffer {
                        context: AceContext {
                            trigger: offer.trigger,
                            challenge: Some(offer.challenge),
                        },
                    },
                )),
                Outcome::Queued | Outcome::Rejected(_) => {}
            }
        }
        dispatches
    }
}

/// Sends guest-bound dispatches over `channel` and hands back the rest.
pub fn deliver<C: ReplicationChannel>(
    channel: &mut C,
    dispatches: Vec<Dispatch>,
) -> Result<Vec<Dispatch>, ChannelError> {
    let mut local = vec![];
    for dispatch in dispatches {
        match dispatch.recipient {
            Recipient::Guest => {
                debug!("sending {} to guest", dispatch.message.kind());
                channel.send(dispatch.message.encode()?)?;
            }
            Recipient::Local => local.push(dispatch),
        }
    }
    Ok(local)
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuestUpdate {
    Hydrated(Vec<Event>),
    AceOffer(AceContext),
    Ignored,
}

/// Read-only copy of the host's table. Only ever replaced by snapshots.
#[derive(Debug, Default)]
pub struct GuestMirror {
    state: GameState,
    offer: Option<AceContext>,
}

impl GuestMirror {
    pub fn new() -> Self {
        GuestMirror::default()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn pending_offer(&self) -> Option<&AceContext> {
        self.offer.as_ref()
    }

    pub fn on_text(&mut self, text: &str) -> GuestUpdate {
        match Envelope::decode(text) {
            Ok(Envelope::Sync { state }) => {
                self.state = state;
                GuestUpdate::Hydrated(vec![])
            }
            Ok(Envelope::Apply { state, events }) => {
                self.state = state;
                self.offer = None;
                GuestUpdate::Hydrated(events)
            }
            Ok(Envelope::AceOffer { context }) => {
                self.offer = Some(context.clone());
                GuestUpdate::AceOffer(context)
            }
            Ok(other) => {
                warn!("{}", ProtocolError::Unexpected(other.kind()));
                GuestUpdate::Ignored
            }
            Err(error) => {
                warn!("{}", error);
                GuestUpdate::Ignored
            }
        }
    }

    pub fn request(&self, action: Action) -> Envelope {
        Envelope::TurnAction {
            action: TurnAction::new(Seat::P2, action),
        }
    }

    pub fn answer_ace(&mut self, used: bool) -> Envelope {
        let challenge = self.offer.take().and_then(|context| context.challenge);
        self.request(Action::AceReact { used, challenge })
    }
}
