use std::str::FromStr;

use arcana_core::{
    action::{Action, Seat},
    card::{CardId, CardRole},
    event::Event,
    game_state::GameState,
    message::AceContext,
    resolver::PendingChallenge,
};
use itertools::Itertools;

static RULES: &str = "
*** Arcana ***
Two players race to 60 points. On your turn do exactly one thing: play a construct (a pair,
a set of one rank, or a same-suit run), play an action card (6, 7 or 9), play a sigil
(J, Q or K) or discard a card. You draw one card after every turn, and three more whenever
your turn starts with one card or fewer.
A construct whose natural cards all share a suit earns a suit bonus: Hearts +2 points,
Diamonds steals 1-3 points on a d6, Spades steals two random cards, Clubs grants another
turn (at most twice in a row).";

static HELP: &str = "
- [start]: deal a new game (host only)
- [sync]: push the full table to the guest again
- [construct <ids..> / <extra ids..>]: play a construct, paying one extra discard per wild
- [six <id>] / [seven <id>] / [nine <id> <give id>]: play an action card
- [sigil <id>]: play a J, Q or K
- [discard <id>]: discard a card
- [ace yes|no]: answer an Ace offer
- [show] / [rules] / [help] / [quit]";

#[derive(Debug, PartialEq)]
pub enum Command {
    Quit,
    Help,
    Rules,
    Show,
    Sync,
    Ace(bool),
    Play(Action),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseCommandError;

fn ids<'a>(words: impl Iterator<Item = &'a str>) -> Result<Vec<CardId>, ParseCommandError> {
    words
        .map(|w| CardId::from_str(w).map_err(|_| ParseCommandError))
        .collect()
}

fn one_id<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<CardId, ParseCommandError> {
    match (words.next(), words.next()) {
        (Some(word), None) => CardId::from_str(word).map_err(|_| ParseCommandError),
        _ => Err(ParseCommandError),
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseCommandError);
        };
        match verb {
            "q" | "quit" => Ok(Command::Quit),
            "h" | "help" => Ok(Command::Help),
            "r" | "rules" => Ok(Command::Rules),
            "s" | "show" => Ok(Command::Show),
            "sync" => Ok(Command::Sync),
            "start" => Ok(Command::Play(Action::Start)),
            "ace" => match (words.next(), words.next()) {
                (Some("yes" | "y"), None) => Ok(Command::Ace(true)),
                (Some("no" | "n"), None) => Ok(Command::Ace(false)),
                _ => Err(ParseCommandError),
            },
            "construct" | "c" => {
                let rest = words.collect_vec();
                let (cards, extra) = match rest.iter().position(|&w| w == "/") {
                    Some(split) => (&rest[..split], &rest[split + 1..]),
                    None => (&rest[..], &[][..]),
                };
                Ok(Command::Play(Action::Construct {
                    ids: ids(cards.iter().copied())?,
                    extra_discards: ids(extra.iter().copied())?,
                }))
            }
            "six" => Ok(Command::Play(Action::DrawTwo {
                card_id: one_id(words)?,
            })),
            "seven" => Ok(Command::Play(Action::Steal {
                card_id: one_id(words)?,
            })),
            "nine" => match ids(words)?.as_slice() {
                &[card_id, give_id] => Ok(Command::Play(Action::Swap { card_id, give_id })),
                _ => Err(ParseCommandError),
            },
            "sigil" => Ok(Command::Play(Action::Sigil {
                card_id: one_id(words)?,
            })),
            "d" | "discard" => Ok(Command::Play(Action::Discard {
                card_id: one_id(words)?,
            })),
            _ => Err(ParseCommandError),
        }
    }
}

pub fn help() -> &'static str {
    HELP
}

pub fn rules() -> String {
    format!("{}\n\n{}", RULES, CardRole::rules())
}

/// The table as seen from `me`: the opponent's hand is only counted.
pub fn render(state: &GameState, me: Seat) -> String {
    if !state.started && state.deck.is_empty() {
        return "Waiting for the host to start a game.".to_string();
    }
    let opponent = me.other();
    let hand = state
        .player(me)
        .hand()
        .iter()
        .map(|c| format!("[{}] {}", c.id, c))
        .join("  ");
    let turn = if !state.started {
        "Game over.".to_string()
    } else if state.turn == me {
        "Your move.".to_string()
    } else {
        format!("Waiting for {}.", opponent)
    };
    format!(
        "{me}: {} pts | {opponent}: {} pts, {} cards | deck {} | discard {}\nYour hand: {}\n{}",
        state.player(me).score(),
        state.player(opponent).score(),
        state.player(opponent).hand().len(),
        state.deck.len(),
        state.discard.len(),
        hand,
        turn,
    )
}

pub fn print_events(events: &[Event]) {
    for event in events {
        println!("  {}", event);
    }
}

pub fn ace_prompt(context: &AceContext) -> String {
    format!(
        "Your opponent played a {}. Block it with an Ace? [ace yes] / [ace no]",
        &context.trigger.to_string()[1..]
    )
}

/// Shown when `me` submitted a command that now waits behind an Ace offer.
pub fn queued_notice(pending: &PendingChallenge, me: Seat) -> String {
    if pending.target == me {
        "Answer the Ace offer first with [ace yes] / [ace no]; your command is queued.".to_string()
    } else {
        format!(
            "Waiting for {} to answer the Ace offer; your command is queued.",
            pending.target
        )
    }
}
