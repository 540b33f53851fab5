pub mod action;
pub mod card;
pub mod config;
pub mod construct;
pub mod event;
pub mod game_state;
pub mod message;
pub mod resolver;
pub mod session;
pub mod utils;

pub use action::{Action, Seat, TurnAction};
pub use game_state::GameState;
pub use message::Envelope;
pub use session::{GuestMirror, HostSession, LocalChannel, ReplicationChannel};
