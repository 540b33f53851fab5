use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    action::Seat,
    card::{Card, CardId, Rank, POOL_SIZE},
    config::{HAND_SIZE, WIN_SCORE},
    utils::VecExtensions,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    hand: Vec<Card>,
    score: u32,
}

impl PlayerState {
    pub fn new() -> Self {
        PlayerState::default()
    }

    pub fn hand(&self) -> &Vec<Card> {
        &self.hand
    }

    pub fn hand_mut(&mut self) -> &mut Vec<Card> {
        &mut self.hand
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.hand.iter().find(|c| c.id == id)
    }

    pub fn holds(&self, id: CardId) -> bool {
        self.card(id).is_some()
    }

    pub fn has_ace(&self) -> bool {
        self.hand.iter().any(|c| c.has_rank(Rank::Ace))
    }
}

/// The whole shared table. Replicated wholesale from host to guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub deck: Vec<Card>,
    pub discard: Vec<Card>,
    pub players: [PlayerState; 2],
    pub turn: Seat,
    pub bonus_chain: u8,
    pub started: bool,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            deck: vec![],
            discard: vec![],
            players: [PlayerState::new(), PlayerState::new()],
            turn: Seat::P1,
            bonus_chain: 0,
            started: false,
        }
    }
}

impl GameState {
    /// Fresh game: full reshuffle, seven cards to each seat, P1 to move.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Card::pool();
        deck.shuffle(rng);
        let mut state = GameState {
            deck,
            started: true,
            ..GameState::default()
        };
        for seat in Seat::both() {
            state.draw_cards(seat, HAND_SIZE);
        }
        state
    }

    pub fn player(&self, seat: Seat) -> &PlayerState {
        &self.players[seat.index()]
    }

    pub fn player_mut(&mut self, seat: Seat) -> &mut PlayerState {
        &mut self.players[seat.index()]
    }

    /// Draws up to `count` cards from the top of the deck; returns how many were drawn.
    pub fn draw_cards(&mut self, seat: Seat, count: usize) -> usize {
        let take = count.min(self.deck.len());
        for _ in 0..take {
            if let Some(card) = self.deck.pop() {
                self.players[seat.index()].hand.push(card);
            }
        }
        take
    }

    pub fn discard_card(&mut self, seat: Seat, id: CardId) -> Option<Card> {
        let card = self.players[seat.index()]
            .hand
            .remove_first_where(|c| c.id == id)?;
        self.discard.push(card);
        Some(card)
    }

    /// Moves a specific card from one hand to the other.
    pub fn give_card(&mut self, from: Seat, to: Seat, id: CardId) -> Option<Card> {
        let card = self.players[from.index()]
            .hand
            .remove_first_where(|c| c.id == id)?;
        self.players[to.index()].hand.push(card);
        Some(card)
    }

    /// Moves a uniformly random card from `from`'s hand into `to`'s hand.
    pub fn steal_random_card<R: Rng + ?Sized>(
        &mut self,
        from: Seat,
        to: Seat,
        rng: &mut R,
    ) -> Option<Card> {
        let card = self.players[from.index()].hand.take_random(rng)?;
        self.players[to.index()].hand.push(card);
        Some(card)
    }

    /// Discards the first Ace in the seat's hand.
    pub fn spend_ace(&mut self, seat: Seat) -> Option<Card> {
        let card = self.players[seat.index()]
            .hand
            .remove_first_where(|c| c.has_rank(Rank::Ace))?;
        self.discard.push(card);
        Some(card)
    }

    /// Zero-sum transfer of at most `points`, clamped so `from` never goes below zero.
    /// Returns the amount actually moved.
    pub fn transfer_points(&mut self, from: Seat, to: Seat, points: u32) -> u32 {
        let moved = points.min(self.players[from.index()].score);
        self.players[from.index()].score -= moved;
        self.players[to.index()].score += moved;
        moved
    }

    pub fn card_count(&self) -> usize {
        self.deck.len()
            + self.discard.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// Every card of the pool is in exactly one of deck, discard or a hand.
    pub fn is_conserved(&self) -> bool {
        let ids: HashSet<CardId> = self
            .deck
            .iter()
            .chain(self.discard.iter())
            .chain(self.players.iter().flat_map(|p| p.hand.iter()))
            .map(|c| c.id)
            .collect();
        self.card_count() == POOL_SIZE && ids.len() == POOL_SIZE
    }

    pub fn game_over(&self) -> bool {
        self.players.iter().any(|p| p.score >= WIN_SCORE)
    }

    /// Seat with the higher score once the game is over; the acting seat wins a tie.
    pub fn winner(&self, actor: Seat) -> Option<Seat> {
        if !self.game_over() {
            return None;
        }
        let other = actor.other();
        if self.player(other).score > self.player(actor).score {
            Some(other)
        } else {
            Some(actor)
        }
    }
}
