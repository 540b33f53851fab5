use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    action::{AceTrigger, TurnAction},
    event::Event,
    game_state::GameState,
};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected {0} envelope")]
    Unexpected(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AceContext {
    #[serde(rename = "for")]
    pub trigger: AceTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<u64>,
}

/// Everything that crosses the replication channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Full authoritative replace, sent on connect and on demand.
    Sync { state: GameState },
    /// Same as `Sync`, sent after every resolved action.
    Apply {
        state: GameState,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        events: Vec<Event>,
    },
    TurnAction { action: TurnAction },
    AceOffer { context: AceContext },
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Sync { .. } => "SYNC",
            Envelope::Apply { .. } => "APPLY",
            Envelope::TurnAction { .. } => "TURN_ACTION",
            Envelope::AceOffer { .. } => "ACE_OFFER",
        }
    }
}
