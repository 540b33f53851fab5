use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{EnumMessage, IntoEnumIterator};
use strum_macros::{Display, EnumIter, EnumMessage, EnumString};

pub type CardId = u32;

/// Number of cards in a full pool: two standard decks plus four wild cards.
pub const POOL_SIZE: usize = 108;

#[derive(
    Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Display, EnumIter, EnumString,
    Serialize, Deserialize,
)]
pub enum Suit {
    #[strum(to_string = "♠", serialize = "S")]
    Spades,
    #[strum(to_string = "♥", serialize = "H")]
    Hearts,
    #[strum(to_string = "♦", serialize = "D")]
    Diamonds,
    #[strum(to_string = "♣", serialize = "C")]
    Clubs,
}

#[derive(
    Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Display, EnumIter, EnumString,
    Serialize, Deserialize,
)]
pub enum Rank {
    #[strum(serialize = "A")]
    Ace,
    #[strum(serialize = "2")]
    Two,
    #[strum(serialize = "3")]
    Three,
    #[strum(serialize = "4")]
    Four,
    #[strum(serialize = "5")]
    Five,
    #[strum(serialize = "6")]
    Six,
    #[strum(serialize = "7")]
    Seven,
    #[strum(serialize = "8")]
    Eight,
    #[strum(serialize = "9")]
    Nine,
    #[strum(serialize = "10")]
    Ten,
    #[strum(serialize = "J")]
    Jack,
    #[strum(serialize = "Q")]
    Queen,
    #[strum(serialize = "K")]
    King,
}

impl Rank {
    /// Numeric value used for scoring: A=1 .. K=13.
    pub fn value(&self) -> u32 {
        *self as u32 + 1
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "face", rename_all = "lowercase")]
pub enum Face {
    Standard { rank: Rank, suit: Suit },
    Wild,
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(flatten)]
    pub face: Face,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Display, EnumIter, EnumMessage)]
pub enum CardRole {
    #[strum(
        message = "Substitutes any rank in a set or fills a gap in a run (-1 point and one extra discard per wild). Two to four wild cards alone score 4, 7 (+draw 3) or 15 (+refill to 7)."
    )]
    Wild,
    #[strum(
        message = "When an opponent plays a 7 or a 9 against you, you may discard an Ace to block it and take 1 point from them."
    )]
    Ace,
    #[strum(message = "6: draw two cards. 7: steal a random card. 9: give a card and take a random one.")]
    Action,
    #[strum(message = "J: +2 and draw 1. Q: +3 and draw 1. K: +5 and draw 2.")]
    Sigil,
    #[strum(message = "Play in pairs, sets or same-suit runs.")]
    Normal,
}

impl CardRole {
    pub fn rules() -> String {
        CardRole::iter().map(|r| r.rule()).join("\n")
    }

    pub fn rule(&self) -> String {
        format!("{}: {}", self, self.get_message().unwrap_or("No rule"))
    }
}

impl Card {
    pub fn standard(id: CardId, rank: Rank, suit: Suit) -> Self {
        Card {
            id,
            face: Face::Standard { rank, suit },
        }
    }

    pub fn wild(id: CardId) -> Self {
        Card {
            id,
            face: Face::Wild,
        }
    }

    /// Two 52-card decks followed by four wild cards, ids 1..=108, unshuffled.
    pub fn pool() -> Vec<Card> {
        let mut cards = Vec::with_capacity(POOL_SIZE);
        let mut id: CardId = 1;
        for _ in 0..2 {
            for suit in Suit::iter() {
                for rank in Rank::iter() {
                    cards.push(Card::standard(id, rank, suit));
                    id += 1;
                }
            }
            for _ in 0..2 {
                cards.push(Card::wild(id));
                id += 1;
            }
        }
        cards
    }

    pub fn is_wild(&self) -> bool {
        self.face == Face::Wild
    }

    pub fn rank(&self) -> Option<Rank> {
        match self.face {
            Face::Standard { rank, .. } => Some(rank),
            Face::Wild => None,
        }
    }

    pub fn suit(&self) -> Option<Suit> {
        match self.face {
            Face::Standard { suit, .. } => Some(suit),
            Face::Wild => None,
        }
    }

    pub fn has_rank(&self, rank: Rank) -> bool {
        self.rank() == Some(rank)
    }

    pub fn role(&self) -> CardRole {
        match self.rank() {
            None => CardRole::Wild,
            Some(Rank::Ace) => CardRole::Ace,
            Some(Rank::Six | Rank::Seven | Rank::Nine) => CardRole::Action,
            Some(Rank::Jack | Rank::Queen | Rank::King) => CardRole::Sigil,
            Some(_) => CardRole::Normal,
        }
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.face {
            Face::Standard { rank, suit } => write!(f, "{}{}", rank, suit),
            Face::Wild => write!(f, "★"),
        }
    }
}
