use serde::{Deserialize, Serialize};

use crate::{
    action::{AceTrigger, Seat},
    card::{Card, Rank},
    construct::ConstructKind,
};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum DrawReason {
    EndOfTurn,
    SafetyNet,
    DrawTwo,
    Sigil,
    WildBonus,
    Refill,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Event {
    GameStarted,
    Drew(Seat, usize, DrawReason),
    Constructed(Seat, ConstructKind, u32),
    DiamondsRoll { seat: Seat, roll: u32, stolen: u32 },
    SpadesSteal(Seat, usize),
    ExtraTurn(Seat),
    Stole(Seat, bool),
    Swapped(Seat, bool),
    AceOffered(Seat, AceTrigger),
    AceBlocked { defender: Seat, points: u32 },
    AceDeclined(Seat),
    AceTimedOut(Seat),
    SigilPlayed(Seat, Rank, u32),
    Discarded(Seat, Card),
    TurnPassed(Seat),
    Winner(Seat),
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::GameStarted => write!(f, "New game. P1 starts."),
            Event::Drew(seat, n, DrawReason::SafetyNet) => {
                write!(f, "{} drew {} (safety net).", seat, n)
            }
            Event::Drew(seat, n, DrawReason::Refill) => {
                write!(f, "{} refilled to 7 (+{}).", seat, n)
            }
            Event::Drew(seat, n, _) => write!(f, "{} drew {}.", seat, n),
            Event::Constructed(seat, kind, points) => {
                write!(f, "{} played {} for +{}.", seat, kind, points)
            }
            Event::DiamondsRoll { seat, roll, stolen } => write!(
                f,
                "♦ bonus for {}: d6={} → stole {} point(s).",
                seat, roll, stolen
            ),
            Event::SpadesSteal(seat, n) => write!(f, "♠ bonus: {} stole {} card(s).", seat, n),
            Event::ExtraTurn(seat) => write!(f, "{} takes an extra turn.", seat),
            Event::Stole(seat, true) => write!(f, "{} played 7 and stole a random card.", seat),
            Event::Stole(seat, false) => {
                write!(f, "{} played 7 but the opponent had no cards.", seat)
            }
            Event::Swapped(seat, true) => write!(f, "{} played 9 and swapped one card.", seat),
            Event::Swapped(seat, false) => {
                write!(f, "{} played 9 but the opponent had no cards to swap.", seat)
            }
            Event::AceOffered(seat, trigger) => {
                write!(f, "{} may spend an Ace against {}.", seat, trigger)
            }
            Event::AceBlocked { defender, points } => write!(
                f,
                "{} blocked with an Ace: +{} point counter.",
                defender, points
            ),
            Event::AceDeclined(seat) => write!(f, "{} did not use an Ace.", seat),
            Event::AceTimedOut(seat) => write!(f, "{} did not answer the Ace offer in time.", seat),
            Event::SigilPlayed(seat, rank, points) => {
                write!(f, "{} played sigil {}: +{}.", seat, rank, points)
            }
            Event::Discarded(seat, card) => write!(f, "{} discarded {}.", seat, card),
            Event::TurnPassed(seat) => write!(f, "{} to move.", seat),
            Event::Winner(seat) => write!(f, "{} wins!", seat),
        }
    }
}
