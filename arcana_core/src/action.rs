use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::card::{CardId, Rank};

/// One of the two seats at the table. The host always plays `P1`.
#[derive(
    Debug, PartialEq, Eq, Hash, Copy, Clone, Display, EnumString, Serialize, Deserialize,
)]
pub enum Seat {
    P1,
    P2,
}

impl Seat {
    pub fn index(&self) -> usize {
        match self {
            Seat::P1 => 0,
            Seat::P2 => 1,
        }
    }

    pub fn other(&self) -> Seat {
        match self {
            Seat::P1 => Seat::P2,
            Seat::P2 => Seat::P1,
        }
    }

    pub fn both() -> [Seat; 2] {
        [Seat::P1, Seat::P2]
    }
}

/// Which attacking card an Ace offer is about.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Display, Serialize, Deserialize)]
pub enum AceTrigger {
    A7,
    A9,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "CONSTRUCT")]
    Construct {
        ids: Vec<CardId>,
        #[serde(default)]
        extra_discards: Vec<CardId>,
    },
    #[serde(rename = "ACTION_6")]
    DrawTwo { card_id: CardId },
    #[serde(rename = "ACTION_7")]
    Steal { card_id: CardId },
    #[serde(rename = "ACTION_9")]
    Swap { card_id: CardId, give_id: CardId },
    #[serde(rename = "ACE_REACT")]
    AceReact {
        used: bool,
        #[serde(default)]
        challenge: Option<u64>,
    },
    #[serde(rename = "SIGIL")]
    Sigil { card_id: CardId },
    #[serde(rename = "DISCARD")]
    Discard { card_id: CardId },
}

impl Action {
    /// Rank the played card must have, for single-card actions that require one.
    pub fn required_rank(&self) -> Option<Rank> {
        match self {
            Action::DrawTwo { .. } => Some(Rank::Six),
            Action::Steal { .. } => Some(Rank::Seven),
            Action::Swap { .. } => Some(Rank::Nine),
            _ => None,
        }
    }

    /// Actions the target may block by spending an Ace.
    pub fn ace_trigger(&self) -> Option<AceTrigger> {
        match self {
            Action::Steal { .. } => Some(AceTrigger::A7),
            Action::Swap { .. } => Some(AceTrigger::A9),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "START",
            Action::Construct { .. } => "CONSTRUCT",
            Action::DrawTwo { .. } => "ACTION_6",
            Action::Steal { .. } => "ACTION_7",
            Action::Swap { .. } => "ACTION_9",
            Action::AceReact { .. } => "ACE_REACT",
            Action::Sigil { .. } => "SIGIL",
            Action::Discard { .. } => "DISCARD",
        }
    }
}

/// An action request together with the seat that issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnAction {
    pub from: Seat,
    #[serde(flatten)]
    pub action: Action,
}

impl TurnAction {
    pub fn new(from: Seat, action: Action) -> Self {
        TurnAction { from, action }
    }
}

impl std::fmt::Display for TurnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.from, self.action.name())
    }
}
