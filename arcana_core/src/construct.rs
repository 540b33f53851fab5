//! Scoring of multi-card plays: wild-only combos, pairs, sets and same-suit runs.
//!
//! Evaluation is a pure function of the selected cards' faces. Effects that need the
//! opponent (suit bonus steals, Clubs repeat turns) are only tagged here and carried out by
//! the resolver.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::{
    card::{Card, Suit},
    config::HAND_SIZE,
};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstructKind {
    WildOnly,
    Pair,
    TruePair,
    Set,
    Run,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuitBonus {
    Hearts,
    Diamonds,
    Spades,
    Clubs,
}

impl From<Suit> for SuitBonus {
    fn from(suit: Suit) -> Self {
        match suit {
            Suit::Hearts => SuitBonus::Hearts,
            Suit::Diamonds => SuitBonus::Diamonds,
            Suit::Spades => SuitBonus::Spades,
            Suit::Clubs => SuitBonus::Clubs,
        }
    }
}

/// Extra reward of wild-only constructs.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum WildBonus {
    Draw(usize),
    RefillTo(usize),
}

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum ConstructError {
    #[error("select 2 or more cards for a construct")]
    TooFewCards,
    #[error("need 2-4 wild cards for a wild-only construct, got {0}")]
    WildCount(usize),
    #[error("duplicate rank in run")]
    DuplicateRank,
    #[error("run has {gaps} gap(s) but only {wilds} wild card(s)")]
    UnfilledGaps { gaps: u32, wilds: usize },
    #[error("not a valid pair/set/run")]
    NotAConstruct,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Construct {
    pub kind: ConstructKind,
    pub points: u32,
    pub suit: Option<Suit>,
    pub suit_bonus: Option<SuitBonus>,
    pub wilds_used: usize,
    pub bonus: Option<WildBonus>,
}

impl Construct {
    fn new(kind: ConstructKind, points: u32, suit: Option<Suit>, wilds_used: usize) -> Self {
        Construct {
            kind,
            points,
            suit,
            suit_bonus: None,
            wilds_used,
            bonus: None,
        }
    }

    /// Cards outside the construct the player has to discard to pay for wild cards.
    pub fn required_extra_discards(&self) -> usize {
        match self.kind {
            ConstructKind::WildOnly => 0,
            _ => self.wilds_used,
        }
    }

    fn with_suit_bonus(mut self) -> Self {
        if let Some(suit) = self.suit {
            let bonus = SuitBonus::from(suit);
            if bonus == SuitBonus::Hearts {
                self.points += 2;
            }
            self.suit_bonus = Some(bonus);
        }
        self
    }

    fn with_wild_penalty(mut self) -> Self {
        self.points = self.points.saturating_sub(self.wilds_used as u32);
        self
    }
}

pub fn evaluate(cards: &[Card]) -> Result<Construct, ConstructError> {
    if cards.len() < 2 {
        return Err(ConstructError::TooFewCards);
    }
    let (wilds, naturals): (Vec<&Card>, Vec<&Card>) = cards.iter().partition(|c| c.is_wild());
    let wild_count = wilds.len();
    let n = cards.len();

    if naturals.is_empty() {
        return wild_only(wild_count);
    }

    let common_suit = shared(naturals.iter().filter_map(|c| c.suit()));
    let common_rank = shared(naturals.iter().filter_map(|c| c.rank()));

    if n == 2 && wild_count == 0 && common_rank.is_some() {
        return Ok(match common_suit {
            Some(suit) => {
                Construct::new(ConstructKind::TruePair, 5, Some(suit), 0).with_suit_bonus()
            }
            None => Construct::new(ConstructKind::Pair, 2, None, 0),
        });
    }

    if let Some(rank) = common_rank {
        if n >= 3 && (wild_count == 0 || naturals.len() >= 2) {
            let r = rank.value();
            let points = if wild_count == 0 {
                match n {
                    3 => 2 * r + 2,
                    4 if naturals.iter().filter_map(|c| c.suit()).unique().count() == 4 => 4 * r,
                    4 => 3 * r,
                    _ => 3 * r + 2,
                }
            } else if n == 4 {
                3 * r
            } else {
                3 * r + 2
            };
            let set = Construct::new(ConstructKind::Set, points, common_suit, wild_count);
            let set = if common_suit.is_some() && (wild_count == 0 || n >= 6) {
                set.with_suit_bonus()
            } else {
                set
            };
            return Ok(set.with_wild_penalty());
        }
    }

    if let Some(suit) = common_suit {
        if n >= 3 {
            return run(&naturals, suit, wild_count);
        }
    }

    Err(ConstructError::NotAConstruct)
}

/// The value every item shares, if any.
fn shared<T: PartialEq + Copy>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    values.all(|v| v == first).then_some(first)
}

fn wild_only(count: usize) -> Result<Construct, ConstructError> {
    let (points, bonus) = match count {
        2 => (4, None),
        3 => (7, Some(WildBonus::Draw(3))),
        4 => (15, Some(WildBonus::RefillTo(HAND_SIZE))),
        other => return Err(ConstructError::WildCount(other)),
    };
    Ok(Construct {
        bonus,
        ..Construct::new(ConstructKind::WildOnly, points, None, count)
    })
}

fn run(naturals: &[&Card], suit: Suit, wild_count: usize) -> Result<Construct, ConstructError> {
    let values = naturals
        .iter()
        .filter_map(|c| c.rank())
        .map(|r| r.value())
        .sorted()
        .collect_vec();
    let mut gaps = 0;
    for (low, high) in values.iter().tuple_windows() {
        if high == low {
            return Err(ConstructError::DuplicateRank);
        }
        gaps += high - low - 1;
    }
    if gaps as usize > wild_count {
        return Err(ConstructError::UnfilledGaps {
            gaps,
            wilds: wild_count,
        });
    }
    let n = naturals.len() + wild_count;
    let points = values.iter().sum::<u32>() + n as u32;
    let run = Construct::new(ConstructKind::Run, points, Some(suit), wild_count);
    if wild_count == 0 {
        Ok(run.with_suit_bonus())
    } else {
        Ok(run.with_wild_penalty())
    }
}
