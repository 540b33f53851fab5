//! Host-side turn resolution.
//!
//! The resolver is the only code that mutates the authoritative [`GameState`]. Requests are
//! handled strictly one at a time; a 7 or 9 aimed at a player holding an Ace parks the
//! action in a [`PendingChallenge`] and every other request is queued until the matching
//! `ACE_REACT` (or the reply deadline) settles it.

use std::{
    collections::{HashSet, VecDeque},
    time::Instant,
};

use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;

use crate::{
    action::{AceTrigger, Action, Seat, TurnAction},
    card::{Card, CardId, CardRole, Rank},
    config::{SessionConfig, MAX_BONUS_CHAIN, MAX_QUEUED_REQUESTS, SAFETY_NET_DRAW},
    construct::{evaluate, ConstructError, SuitBonus, WildBonus},
    event::{DrawReason, Event},
    game_state::GameState,
};

#[derive(Debug, PartialEq, Error)]
pub enum ResolveError {
    #[error("the game has not started")]
    NotStarted,
    #[error("the game is over")]
    GameOver,
    #[error("it is {0}'s turn")]
    NotYourTurn(Seat),
    #[error("invalid construct: {0}")]
    Validation(#[from] ConstructError),
    #[error("construct needs {expected} extra discard(s), got {got}")]
    ExtraDiscardMismatch { expected: usize, got: usize },
    #[error("rejected by host: {0}")]
    AuthorityMismatch(String),
    #[error("no Ace offer is pending")]
    NoPendingChallenge,
    #[error("too many requests are waiting on an Ace offer")]
    QueueFull,
}

/// A 7 or 9 that the target may still block.
#[derive(Debug, Clone, PartialEq)]
pub enum Attack {
    Steal { card_id: CardId },
    Swap { card_id: CardId, give_id: CardId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingChallenge {
    pub id: u64,
    pub actor: Seat,
    pub target: Seat,
    pub attack: Attack,
    pub trigger: AceTrigger,
    /// `None` when the reply window does not fit in an `Instant`; such an offer never expires.
    pub deadline: Option<Instant>,
}

impl PendingChallenge {
    /// Only an `ACE_REACT` from the target (for this challenge, when it names one) settles it.
    pub fn accepts(&self, request: &TurnAction) -> bool {
        match request.action {
            Action::AceReact { challenge, .. } => {
                request.from == self.target && challenge.map_or(true, |id| id == self.id)
            }
            _ => false,
        }
    }

    pub fn offer(&self) -> AceOffer {
        AceOffer {
            challenge: self.id,
            target: self.target,
            trigger: self.trigger,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AceOffer {
    pub challenge: u64,
    pub target: Seat,
    pub trigger: AceTrigger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverState {
    Idle,
    AwaitingAceReply(PendingChallenge),
    GameOver,
}

#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// State changed; the events describe how.
    Applied(Vec<Event>),
    /// Resolution is suspended until the target answers.
    AceOffered(AceOffer),
    /// Parked behind a pending Ace offer.
    Queued,
    Rejected(ResolveError),
}

pub struct TurnResolver<R> {
    state: GameState,
    phase: ResolverState,
    queue: VecDeque<TurnAction>,
    rng: R,
    config: SessionConfig,
    last_challenge: u64,
}

impl<R: Rng> TurnResolver<R> {
    pub fn new(rng: R, config: SessionConfig) -> Self {
        Self::with_state(GameState::default(), rng, config)
    }

    pub fn with_state(state: GameState, rng: R, config: SessionConfig) -> Self {
        let phase = if state.started || !state.game_over() {
            ResolverState::Idle
        } else {
            ResolverState::GameOver
        };
        TurnResolver {
            state,
            phase,
            queue: VecDeque::new(),
            rng,
            config,
            last_challenge: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> &ResolverState {
        &self.phase
    }

    pub fn pending(&self) -> Option<&PendingChallenge> {
        match &self.phase {
            ResolverState::AwaitingAceReply(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Feeds one request through the single serialized resolution path.
    ///
    /// Returns one outcome for the request itself, followed by outcomes for queued
    /// requests that became resolvable.
    pub fn handle(&mut self, request: TurnAction, now: Instant) -> Vec<Outcome> {
        let accepted = self.pending().map(|pending| pending.accepts(&request));
        let outcome = match accepted {
            Some(true) => {
                let used = matches!(request.action, Action::AceReact { used: true, .. });
                self.settle_challenge(used, false)
            }
            Some(false) if self.queue.len() >= MAX_QUEUED_REQUESTS => {
                warn!("ignoring {}: {}", request, ResolveError::QueueFull);
                return vec![Outcome::Rejected(ResolveError::QueueFull)];
            }
            Some(false) => {
                debug!("queueing {} behind pending Ace offer", request);
                self.queue.push_back(request);
                return vec![Outcome::Queued];
            }
            None => self.resolve(request, now),
        };
        let mut outcomes = vec![outcome];
        self.drain_queue(now, &mut outcomes);
        outcomes
    }

    /// Settles an overdue Ace offer as declined.
    pub fn expire(&mut self, now: Instant) -> Vec<Outcome> {
        match self.pending() {
            Some(pending) if pending.deadline.map_or(false, |deadline| now >= deadline) => {
                warn!(
                    "Ace offer {} to {} timed out, assuming declined",
                    pending.id, pending.target
                );
                let mut outcomes = vec![self.settle_challenge(false, true)];
                self.drain_queue(now, &mut outcomes);
                outcomes
            }
            _ => vec![],
        }
    }

    fn drain_queue(&mut self, now: Instant, outcomes: &mut Vec<Outcome>) {
        while self.pending().is_none() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            outcomes.push(self.resolve(request, now));
        }
    }

    fn resolve(&mut self, request: TurnAction, now: Instant) -> Outcome {
        let described = request.to_string();
        match self.apply(request, now) {
            Ok(outcome) => {
                if let Outcome::Applied(events) = &outcome {
                    for event in events {
                        info!("{}", event);
                    }
                }
                outcome
            }
            Err(error) => {
                warn!("ignoring {}: {}", described, error);
                Outcome::Rejected(error)
            }
        }
    }

    fn apply(&mut self, request: TurnAction, now: Instant) -> Result<Outcome, ResolveError> {
        let actor = request.from;
        let required = request.action.required_rank();
        let trigger = request.action.ace_trigger();
        let mut events = vec![];
        match request.action {
            Action::Start => {
                if actor != Seat::P1 {
                    return Err(ResolveError::AuthorityMismatch(
                        "only the host may start a game".to_string(),
                    ));
                }
                self.start(&mut events);
            }
            Action::AceReact { .. } => return Err(ResolveError::NoPendingChallenge),
            Action::Construct { ids, extra_discards } => {
                self.ensure_turn(actor)?;
                self.construct(actor, &ids, &extra_discards, &mut events)?;
            }
            Action::DrawTwo { card_id } => {
                self.ensure_turn(actor)?;
                self.require_card(actor, card_id, |c| c.rank() == required)?;
                self.state.discard_card(actor, card_id);
                let drawn = self.state.draw_cards(actor, 2);
                events.push(Event::Drew(actor, drawn, DrawReason::DrawTwo));
                self.finish_turn(actor, false, &mut events);
            }
            Action::Steal { card_id } => {
                self.ensure_turn(actor)?;
                self.require_card(actor, card_id, |c| c.rank() == required)?;
                return Ok(self.attack(actor, Attack::Steal { card_id }, trigger, now));
            }
            Action::Swap { card_id, give_id } => {
                self.ensure_turn(actor)?;
                self.require_card(actor, card_id, |c| c.rank() == required)?;
                if give_id == card_id {
                    return Err(ResolveError::AuthorityMismatch(
                        "the card to give must differ from the 9".to_string(),
                    ));
                }
                self.require_card(actor, give_id, |_| true)?;
                return Ok(self.attack(
                    actor,
                    Attack::Swap { card_id, give_id },
                    trigger,
                    now,
                ));
            }
            Action::Sigil { card_id } => {
                self.ensure_turn(actor)?;
                let card = self.require_card(actor, card_id, |c| c.role() == CardRole::Sigil)?;
                let (points, draws) = match card.rank() {
                    Some(Rank::Jack) => (2, 1),
                    Some(Rank::Queen) => (3, 1),
                    _ => (5, 2),
                };
                self.state.discard_card(actor, card_id);
                self.state.player_mut(actor).add_score(points);
                if let Some(rank) = card.rank() {
                    events.push(Event::SigilPlayed(actor, rank, points));
                }
                let drawn = self.state.draw_cards(actor, draws);
                events.push(Event::Drew(actor, drawn, DrawReason::Sigil));
                self.finish_turn(actor, false, &mut events);
            }
            Action::Discard { card_id } => {
                self.ensure_turn(actor)?;
                let card = self.require_card(actor, card_id, |_| true)?;
                self.state.discard_card(actor, card_id);
                events.push(Event::Discarded(actor, card));
                self.finish_turn(actor, false, &mut events);
            }
        }
        Ok(Outcome::Applied(events))
    }

    fn start(&mut self, events: &mut Vec<Event>) {
        self.state = GameState::new(&mut self.rng);
        self.phase = ResolverState::Idle;
        events.push(Event::GameStarted);
    }

    fn ensure_turn(&self, actor: Seat) -> Result<(), ResolveError> {
        if self.phase == ResolverState::GameOver {
            return Err(ResolveError::GameOver);
        }
        if !self.state.started {
            return Err(ResolveError::NotStarted);
        }
        if actor != self.state.turn {
            return Err(ResolveError::NotYourTurn(self.state.turn));
        }
        Ok(())
    }

    fn require_card<P>(&self, seat: Seat, id: CardId, predicate: P) -> Result<Card, ResolveError>
    where
        P: Fn(&Card) -> bool,
    {
        match self.state.player(seat).card(id) {
            Some(card) if predicate(card) => Ok(*card),
            Some(card) => Err(ResolveError::AuthorityMismatch(format!(
                "{} cannot be played that way",
                card
            ))),
            None => Err(ResolveError::AuthorityMismatch(format!(
                "card {} is not in {}'s hand",
                id, seat
            ))),
        }
    }

    fn construct(
        &mut self,
        actor: Seat,
        ids: &[CardId],
        extra_discards: &[CardId],
        events: &mut Vec<Event>,
    ) -> Result<(), ResolveError> {
        let mut seen = HashSet::new();
        if !ids.iter().chain(extra_discards).all(|id| seen.insert(*id)) {
            return Err(ResolveError::AuthorityMismatch(
                "a card was selected twice".to_string(),
            ));
        }
        let cards = ids
            .iter()
            .map(|&id| self.require_card(actor, id, |_| true))
            .collect::<Result<Vec<_>, _>>()?;
        let construct = evaluate(&cards)?;
        let expected = construct.required_extra_discards();
        if extra_discards.len() != expected {
            return Err(ResolveError::ExtraDiscardMismatch {
                expected,
                got: extra_discards.len(),
            });
        }
        for &id in extra_discards {
            self.require_card(actor, id, |_| true)?;
        }

        for &id in ids.iter().chain(extra_discards) {
            self.state.discard_card(actor, id);
        }
        self.state.player_mut(actor).add_score(construct.points);
        events.push(Event::Constructed(actor, construct.kind, construct.points));

        match construct.bonus {
            Some(WildBonus::Draw(count)) => {
                let drawn = self.state.draw_cards(actor, count);
                events.push(Event::Drew(actor, drawn, DrawReason::WildBonus));
            }
            Some(WildBonus::RefillTo(size)) => {
                let need = size.saturating_sub(self.state.player(actor).hand().len());
                if need > 0 {
                    let drawn = self.state.draw_cards(actor, need);
                    events.push(Event::Drew(actor, drawn, DrawReason::Refill));
                }
            }
            None => {}
        }

        let target = actor.other();
        let mut extra_turn = false;
        match construct.suit_bonus {
            None | Some(SuitBonus::Hearts) => {}
            Some(SuitBonus::Diamonds) => {
                let roll = self.rng.gen_range(1..=6);
                let steal = match roll {
                    1 | 2 => 1,
                    3 | 4 => 2,
                    _ => 3,
                };
                let stolen = self.state.transfer_points(target, actor, steal);
                events.push(Event::DiamondsRoll {
                    seat: actor,
                    roll,
                    stolen,
                });
            }
            Some(SuitBonus::Spades) => {
                let stolen = (0..2)
                    .filter_map(|_| self.state.steal_random_card(target, actor, &mut self.rng))
                    .count();
                events.push(Event::SpadesSteal(actor, stolen));
            }
            Some(SuitBonus::Clubs) => extra_turn = true,
        }

        self.finish_turn(actor, extra_turn, events);
        Ok(())
    }

    /// Plays a 7 or 9 right away, or parks it when the target could block it.
    fn attack(
        &mut self,
        actor: Seat,
        attack: Attack,
        trigger: Option<AceTrigger>,
        now: Instant,
    ) -> Outcome {
        let target = actor.other();
        let Some(trigger) = trigger.filter(|_| self.state.player(target).has_ace()) else {
            let mut events = vec![];
            self.perform(actor, &attack, &mut events);
            return Outcome::Applied(events);
        };
        self.last_challenge += 1;
        let deadline = now.checked_add(self.config.ace_reply_timeout);
        if deadline.is_none() {
            warn!("Ace offer {} has no representable deadline", self.last_challenge);
        }
        let pending = PendingChallenge {
            id: self.last_challenge,
            actor,
            target,
            attack,
            trigger,
            deadline,
        };
        let offer = pending.offer();
        info!("{}", Event::AceOffered(target, offer.trigger));
        self.phase = ResolverState::AwaitingAceReply(pending);
        Outcome::AceOffered(offer)
    }

    fn perform(&mut self, actor: Seat, attack: &Attack, events: &mut Vec<Event>) {
        let target = actor.other();
        match *attack {
            Attack::Steal { card_id } => {
                self.state.discard_card(actor, card_id);
                let stolen = self
                    .state
                    .steal_random_card(target, actor, &mut self.rng)
                    .is_some();
                events.push(Event::Stole(actor, stolen));
            }
            Attack::Swap { card_id, give_id } => {
                self.state.discard_card(actor, card_id);
                self.state.give_card(actor, target, give_id);
                let swapped = self
                    .state
                    .steal_random_card(target, actor, &mut self.rng)
                    .is_some();
                events.push(Event::Swapped(actor, swapped));
            }
        }
        self.finish_turn(actor, false, events);
    }

    fn settle_challenge(&mut self, used: bool, timed_out: bool) -> Outcome {
        let pending = match std::mem::replace(&mut self.phase, ResolverState::Idle) {
            ResolverState::AwaitingAceReply(pending) => pending,
            other => {
                self.phase = other;
                return Outcome::Rejected(ResolveError::NoPendingChallenge);
            }
        };
        let mut events = vec![];
        if timed_out {
            events.push(Event::AceTimedOut(pending.target));
        }
        if used && self.state.spend_ace(pending.target).is_some() {
            let points = self.state.transfer_points(pending.actor, pending.target, 1);
            events.push(Event::AceBlocked {
                defender: pending.target,
                points,
            });
            self.finish_turn(pending.actor, false, &mut events);
        } else {
            if !timed_out {
                events.push(Event::AceDeclined(pending.target));
            }
            self.perform(pending.actor, &pending.attack, &mut events);
        }
        for event in &events {
            info!("{}", event);
        }
        Outcome::Applied(events)
    }

    fn finish_turn(&mut self, actor: Seat, extra_turn: bool, events: &mut Vec<Event>) {
        let drawn = self.state.draw_cards(actor, 1);
        if drawn > 0 {
            events.push(Event::Drew(actor, drawn, DrawReason::EndOfTurn));
        }

        if extra_turn && self.state.bonus_chain < MAX_BONUS_CHAIN {
            self.state.bonus_chain += 1;
            events.push(Event::ExtraTurn(actor));
        } else {
            self.state.bonus_chain = 0;
            self.state.turn = actor.other();
            events.push(Event::TurnPassed(self.state.turn));
        }

        let current = self.state.turn;
        if self.state.player(current).hand().len() <= 1 {
            let drawn = self.state.draw_cards(current, SAFETY_NET_DRAW);
            events.push(Event::Drew(current, drawn, DrawReason::SafetyNet));
        }

        if let Some(winner) = self.state.winner(actor) {
            self.state.started = false;
            self.phase = ResolverState::GameOver;
            events.push(Event::Winner(winner));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        card::{Card, Rank, Suit},
        construct::ConstructKind,
        game_state::PlayerState,
    };

    fn c(id: CardId, rank: Rank, suit: Suit) -> Card {
        Card::standard(id, rank, suit)
    }

    /// A started table with the given hands; every other card of the pool sits in the deck.
    fn table(p1: Vec<Card>, p2: Vec<Card>) -> GameState {
        let used: HashSet<CardId> = p1.iter().chain(p2.iter()).map(|c| c.id).collect();
        let deck = Card::pool()
            .into_iter()
            .filter(|c| !used.contains(&c.id))
            .collect();
        let mut players = [PlayerState::new(), PlayerState::new()];
        *players[0].hand_mut() = p1;
        *players[1].hand_mut() = p2;
        GameState {
            deck,
            discard: vec![],
            players,
            turn: Seat::P1,
            bonus_chain: 0,
            started: true,
        }
    }

    fn resolver(state: GameState) -> TurnResolver<StdRng> {
        TurnResolver::with_state(state, StdRng::seed_from_u64(5), SessionConfig::default())
    }

    fn act(seat: Seat, action: Action) -> TurnAction {
        TurnAction::new(seat, action)
    }

    fn filler(first_id: CardId, n: u32) -> Vec<Card> {
        (0..n).map(|i| c(first_id + i, Rank::Eight, Suit::Diamonds)).collect()
    }

    #[test]
    fn start_should_deal_and_leave_94_in_deck() {
        let mut r = TurnResolver::new(StdRng::seed_from_u64(1), SessionConfig::default());
        let outcomes = r.handle(act(Seat::P1, Action::Start), Instant::now());
        assert_eq!(outcomes, vec![Outcome::Applied(vec![Event::GameStarted])]);
        assert_eq!(r.state().deck.len(), 94);
        assert!(r.state().is_conserved());
    }

    #[test]
    fn guest_should_not_be_able_to_start() {
        let mut r = TurnResolver::new(StdRng::seed_from_u64(1), SessionConfig::default());
        let outcomes = r.handle(act(Seat::P2, Action::Start), Instant::now());
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(ResolveError::AuthorityMismatch(_))
        ));
        assert!(!r.state().started);
    }

    #[test]
    fn actions_before_start_should_be_rejected() {
        let mut r = TurnResolver::new(StdRng::seed_from_u64(1), SessionConfig::default());
        let outcomes = r.handle(act(Seat::P1, Action::Discard { card_id: 1 }), Instant::now());
        assert_eq!(outcomes, vec![Outcome::Rejected(ResolveError::NotStarted)]);
    }

    #[test]
    fn out_of_turn_request_should_be_rejected() {
        let mut r = resolver(table(filler(1, 7), vec![c(60, Rank::Two, Suit::Clubs)]));
        let outcomes = r.handle(act(Seat::P2, Action::Discard { card_id: 60 }), Instant::now());
        assert_eq!(
            outcomes,
            vec![Outcome::Rejected(ResolveError::NotYourTurn(Seat::P1))]
        );
        assert_eq!(r.state().player(Seat::P2).hand().len(), 1);
    }

    #[test]
    fn construct_should_score_discard_and_pass_turn() {
        let mut p1 = vec![
            c(70, Rank::Seven, Suit::Spades),
            c(71, Rank::Seven, Suit::Hearts),
            c(72, Rank::Seven, Suit::Clubs),
        ];
        p1.extend(filler(1, 4));
        let mut r = resolver(table(p1, filler(20, 7)));
        let outcomes = r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![70, 71, 72],
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        match &outcomes[0] {
            Outcome::Applied(events) => {
                assert_eq!(events[0], Event::Constructed(Seat::P1, ConstructKind::Set, 16))
            }
            other => panic!("unexpected {:?}", other),
        }
        let state = r.state();
        assert_eq!(state.player(Seat::P1).score(), 16);
        assert_eq!(state.player(Seat::P1).hand().len(), 5);
        assert_eq!(state.discard.len(), 3);
        assert_eq!(state.turn, Seat::P2);
        assert!(state.is_conserved());
    }

    #[test]
    fn invalid_construct_should_leave_hand_untouched() {
        let p1 = vec![
            c(70, Rank::Two, Suit::Spades),
            c(71, Rank::Nine, Suit::Hearts),
            c(72, Rank::Seven, Suit::Clubs),
        ];
        let before = table(p1, filler(20, 7));
        let mut r = resolver(before.clone());
        let outcomes = r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![70, 71, 72],
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        assert_eq!(
            outcomes,
            vec![Outcome::Rejected(ResolveError::Validation(
                ConstructError::NotAConstruct
            ))]
        );
        assert_eq!(r.state(), &before);
    }

    #[test]
    fn wild_construct_without_extra_discards_should_be_rejected() {
        let wild = Card::pool().into_iter().find(|c| c.is_wild()).unwrap();
        let mut p1 = vec![
            c(10, Rank::Ten, Suit::Spades),
            c(11, Rank::Ten, Suit::Hearts),
            c(12, Rank::Ten, Suit::Clubs),
            wild,
        ];
        p1.extend(filler(1, 3));
        let before = table(p1, filler(20, 7));
        let mut r = resolver(before.clone());
        let construct = |extra_discards| {
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![10, 11, 12, wild.id],
                    extra_discards,
                },
            )
        };
        let outcomes = r.handle(construct(vec![]), Instant::now());
        assert_eq!(
            outcomes,
            vec![Outcome::Rejected(ResolveError::ExtraDiscardMismatch {
                expected: 1,
                got: 0
            })]
        );
        assert_eq!(r.state(), &before);

        r.handle(construct(vec![1]), Instant::now());
        assert_eq!(r.state().player(Seat::P1).score(), 29);
        assert_eq!(r.state().discard.len(), 5);
        assert!(r.state().is_conserved());
    }

    #[test]
    fn three_wilds_should_draw_three() {
        let wilds: Vec<Card> = Card::pool().into_iter().filter(|c| c.is_wild()).take(3).collect();
        let ids = wilds.iter().map(|c| c.id).collect();
        let mut p1 = wilds;
        p1.extend(filler(1, 2));
        let mut r = resolver(table(p1, filler(20, 7)));
        r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids,
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        // 2 left + 3 bonus + 1 end of turn
        assert_eq!(r.state().player(Seat::P1).hand().len(), 6);
        assert_eq!(r.state().player(Seat::P1).score(), 7);
    }

    #[test]
    fn four_wilds_should_refill_hand_to_seven() {
        let wilds: Vec<Card> = Card::pool().into_iter().filter(|c| c.is_wild()).collect();
        let ids: Vec<CardId> = wilds.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![53, 54, 107, 108]);
        let mut p1 = wilds;
        p1.extend(filler(1, 1));
        let mut r = resolver(table(p1, filler(20, 7)));
        let outcomes = r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids,
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        match &outcomes[0] {
            Outcome::Applied(events) => {
                assert_eq!(
                    events[0],
                    Event::Constructed(Seat::P1, ConstructKind::WildOnly, 15)
                );
                assert_eq!(events[1], Event::Drew(Seat::P1, 6, DrawReason::Refill));
            }
            other => panic!("unexpected {:?}", other),
        }
        // refilled to 7, then the end of turn draw
        assert_eq!(r.state().player(Seat::P1).hand().len(), 8);
        assert_eq!(r.state().player(Seat::P1).score(), 15);
        assert!(r.state().is_conserved());
    }

    fn diamonds_pair_against(target_score: u32) -> (TurnResolver<StdRng>, u32, u32) {
        let mut p1 = vec![c(2, Rank::Two, Suit::Diamonds), c(15, Rank::Two, Suit::Diamonds)];
        p1.extend(filler(30, 3));
        let mut state = table(p1, filler(60, 5));
        state.player_mut(Seat::P2).add_score(target_score);
        let mut r = resolver(state);
        let outcomes = r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![2, 15],
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        let rolled = match &outcomes[0] {
            Outcome::Applied(events) => events.iter().find_map(|e| match *e {
                Event::DiamondsRoll { seat, roll, stolen } => {
                    assert_eq!(seat, Seat::P1);
                    Some((roll, stolen))
                }
                _ => None,
            }),
            other => panic!("unexpected {:?}", other),
        };
        let (roll, stolen) = rolled.unwrap();
        (r, roll, stolen)
    }

    #[test]
    fn diamonds_bonus_should_steal_by_d6_roll() {
        let (r, roll, stolen) = diamonds_pair_against(10);
        assert!((1..=6).contains(&roll));
        let expected = match roll {
            1 | 2 => 1,
            3 | 4 => 2,
            _ => 3,
        };
        assert_eq!(stolen, expected);
        assert_eq!(r.state().player(Seat::P1).score(), 5 + expected);
        assert_eq!(r.state().player(Seat::P2).score(), 10 - expected);
    }

    #[test]
    fn diamonds_bonus_should_not_take_more_than_the_target_has() {
        let (r, roll, stolen) = diamonds_pair_against(1);
        assert!((1..=6).contains(&roll));
        assert_eq!(stolen, 1);
        assert_eq!(r.state().player(Seat::P1).score(), 6);
        assert_eq!(r.state().player(Seat::P2).score(), 0);

        let (r, _, stolen) = diamonds_pair_against(0);
        assert_eq!(stolen, 0);
        assert_eq!(r.state().player(Seat::P1).score(), 5);
    }

    fn spades_pair_against(p2: Vec<Card>) -> (TurnResolver<StdRng>, Vec<Event>) {
        let mut p1 = vec![c(2, Rank::Two, Suit::Spades), c(15, Rank::Two, Suit::Spades)];
        p1.extend(filler(30, 3));
        let mut r = resolver(table(p1, p2));
        let mut outcomes = r.handle(
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![2, 15],
                    extra_discards: vec![],
                },
            ),
            Instant::now(),
        );
        match outcomes.remove(0) {
            Outcome::Applied(events) => (r, events),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn spades_bonus_should_steal_two_cards() {
        let (r, events) = spades_pair_against(filler(60, 5));
        assert_eq!(events[1], Event::SpadesSteal(Seat::P1, 2));
        // 3 left + 2 stolen + 1 end of turn
        assert_eq!(r.state().player(Seat::P1).hand().len(), 6);
        assert_eq!(r.state().player(Seat::P2).hand().len(), 3);
        assert!(r.state().is_conserved());
    }

    #[test]
    fn spades_bonus_should_stop_when_target_runs_out() {
        let (r, events) = spades_pair_against(vec![c(60, Rank::Three, Suit::Hearts)]);
        assert_eq!(events[1], Event::SpadesSteal(Seat::P1, 1));
        assert!(r.state().player(Seat::P1).holds(60));
        assert!(events.contains(&Event::Drew(Seat::P2, 3, DrawReason::SafetyNet)));
        assert_eq!(r.state().player(Seat::P2).hand().len(), 3);
        assert!(r.state().is_conserved());
    }

    #[test]
    fn action_card_of_the_wrong_rank_should_be_rejected() {
        let mut p1 = vec![
            c(6, Rank::Six, Suit::Spades),
            c(7, Rank::Seven, Suit::Spades),
            Card::wild(53),
        ];
        p1.extend(filler(1, 2));
        let mut r = resolver(table(p1, filler(20, 5)));
        let now = Instant::now();
        for action in [
            Action::DrawTwo { card_id: 7 },
            Action::Steal { card_id: 6 },
            Action::Swap {
                card_id: 53,
                give_id: 1,
            },
        ] {
            let outcomes = r.handle(act(Seat::P1, action), now);
            assert!(matches!(
                outcomes[0],
                Outcome::Rejected(ResolveError::AuthorityMismatch(_))
            ));
        }
        assert_eq!(r.state().player(Seat::P1).hand().len(), 5);
        assert_eq!(r.state().turn, Seat::P1);
    }

    #[test]
    fn steal_without_ace_should_resolve_immediately() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 3));
        let mut r = resolver(table(p1, vec![c(60, Rank::Two, Suit::Clubs)]));
        let outcomes = r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), Instant::now());
        assert!(matches!(outcomes[0], Outcome::Applied(_)));
        let state = r.state();
        assert!(state.player(Seat::P1).holds(60));
        // target had 0 cards at the start of its turn: safety net
        assert_eq!(state.player(Seat::P2).hand().len(), 3);
        assert_eq!(state.turn, Seat::P2);
    }

    #[test]
    fn steal_against_ace_should_wait_for_reply_and_block() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let mut state = table(p1, p2);
        state.player_mut(Seat::P1).add_score(10);
        let mut r = resolver(state);
        let now = Instant::now();

        let outcomes = r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);
        assert_eq!(
            outcomes,
            vec![Outcome::AceOffered(AceOffer {
                challenge: 1,
                target: Seat::P2,
                trigger: AceTrigger::A7
            })]
        );
        assert!(r.pending().is_some());

        r.handle(
            act(
                Seat::P2,
                Action::AceReact {
                    used: true,
                    challenge: Some(1),
                },
            ),
            now,
        );
        let state = r.state();
        assert_eq!(state.player(Seat::P1).score(), 9);
        assert_eq!(state.player(Seat::P2).score(), 1);
        assert!(!state.player(Seat::P2).has_ace());
        assert_eq!(state.player(Seat::P2).hand().len(), 4);
        assert_eq!(state.turn, Seat::P2);
        assert_eq!(r.phase(), &ResolverState::Idle);
        assert!(state.is_conserved());
    }

    #[test]
    fn declined_ace_should_let_swap_proceed() {
        let mut p1 = vec![c(90, Rank::Nine, Suit::Spades), c(91, Rank::Two, Suit::Spades)];
        p1.extend(filler(1, 3));
        let p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        let mut r = resolver(table(p1, p2));
        let now = Instant::now();
        r.handle(
            act(
                Seat::P1,
                Action::Swap {
                    card_id: 90,
                    give_id: 91,
                },
            ),
            now,
        );
        let outcomes = r.handle(
            act(
                Seat::P2,
                Action::AceReact {
                    used: false,
                    challenge: None,
                },
            ),
            now,
        );
        match &outcomes[0] {
            Outcome::Applied(events) => {
                assert_eq!(events[0], Event::AceDeclined(Seat::P2));
                assert_eq!(events[1], Event::Swapped(Seat::P1, true));
            }
            other => panic!("unexpected {:?}", other),
        }
        let state = r.state();
        assert!(state.discard.iter().any(|c| c.id == 90));
        // one card left after the swap, then the safety net
        assert_eq!(state.player(Seat::P2).hand().len(), 4);
        assert!(state.is_conserved());
    }

    #[test]
    fn requests_during_pending_offer_should_be_queued() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts), c(81, Rank::Two, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let mut r = resolver(table(p1, p2));
        let now = Instant::now();
        r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);

        let queued = r.handle(act(Seat::P2, Action::Discard { card_id: 81 }), now);
        assert_eq!(queued, vec![Outcome::Queued]);
        assert_eq!(r.queued(), 1);
        assert!(r.state().player(Seat::P2).holds(81));

        let outcomes = r.handle(
            act(
                Seat::P2,
                Action::AceReact {
                    used: true,
                    challenge: None,
                },
            ),
            now,
        );
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[1], Outcome::Applied(_)));
        assert!(!r.state().player(Seat::P2).holds(81));
        assert_eq!(r.state().turn, Seat::P1);
        assert_eq!(r.queued(), 0);
    }

    #[test]
    fn reply_from_the_attacker_should_not_settle_the_offer() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let mut r = resolver(table(p1, p2));
        let now = Instant::now();
        r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);
        let outcomes = r.handle(
            act(
                Seat::P1,
                Action::AceReact {
                    used: true,
                    challenge: None,
                },
            ),
            now,
        );
        assert_eq!(outcomes, vec![Outcome::Queued]);
        assert!(r.pending().is_some());
    }

    #[test]
    fn expired_offer_should_resolve_as_declined() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let mut r = resolver(table(p1, p2));
        let now = Instant::now();
        r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);

        assert!(r.expire(now + Duration::from_secs(1)).is_empty());
        let outcomes = r.expire(now + SessionConfig::default().ace_reply_timeout);
        match &outcomes[0] {
            Outcome::Applied(events) => {
                assert_eq!(events[0], Event::AceTimedOut(Seat::P2));
                assert_eq!(events[1], Event::Stole(Seat::P1, true));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(r.pending().is_none());
        assert!(r.state().player(Seat::P2).has_ace() || r.state().player(Seat::P1).has_ace());
    }

    #[test]
    fn queue_behind_offer_should_be_bounded() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let mut r = resolver(table(p1, p2));
        let now = Instant::now();
        r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);

        for _ in 0..MAX_QUEUED_REQUESTS {
            let outcomes = r.handle(act(Seat::P2, Action::Discard { card_id: 20 }), now);
            assert_eq!(outcomes, vec![Outcome::Queued]);
        }
        let overflow = r.handle(act(Seat::P1, Action::Discard { card_id: 1 }), now);
        assert_eq!(overflow, vec![Outcome::Rejected(ResolveError::QueueFull)]);
        assert_eq!(r.queued(), MAX_QUEUED_REQUESTS);

        // the target's reply still gets through a full queue
        let outcomes = r.handle(
            act(
                Seat::P2,
                Action::AceReact {
                    used: false,
                    challenge: None,
                },
            ),
            now,
        );
        assert_eq!(outcomes.len(), MAX_QUEUED_REQUESTS + 1);
        assert_eq!(r.queued(), 0);
    }

    #[test]
    fn huge_reply_window_should_never_expire() {
        let mut p1 = vec![c(70, Rank::Seven, Suit::Spades)];
        p1.extend(filler(1, 4));
        let mut p2 = vec![c(80, Rank::Ace, Suit::Hearts)];
        p2.extend(filler(20, 4));
        let config = SessionConfig {
            ace_reply_timeout: Duration::from_secs(u64::MAX),
        };
        let mut r = TurnResolver::with_state(table(p1, p2), StdRng::seed_from_u64(5), config);
        let now = Instant::now();

        let outcomes = r.handle(act(Seat::P1, Action::Steal { card_id: 70 }), now);
        assert!(matches!(outcomes[0], Outcome::AceOffered(_)));
        assert_eq!(r.pending().map(|p| p.deadline), Some(None));
        assert!(r.expire(now + Duration::from_secs(86_400)).is_empty());
        assert!(r.pending().is_some());
    }

    #[test]
    fn ace_react_without_offer_should_be_rejected() {
        let mut r = resolver(table(filler(1, 5), filler(20, 5)));
        let outcomes = r.handle(
            act(
                Seat::P2,
                Action::AceReact {
                    used: true,
                    challenge: None,
                },
            ),
            Instant::now(),
        );
        assert_eq!(
            outcomes,
            vec![Outcome::Rejected(ResolveError::NoPendingChallenge)]
        );
    }

    #[test]
    fn clubs_bonus_should_chain_at_most_twice() {
        let mut p1 = vec![
            c(1, Rank::Two, Suit::Clubs),
            c(2, Rank::Two, Suit::Clubs),
            c(3, Rank::Three, Suit::Clubs),
            c(4, Rank::Three, Suit::Clubs),
            c(5, Rank::Four, Suit::Clubs),
            c(6, Rank::Four, Suit::Clubs),
        ];
        p1.extend(filler(60, 3));
        let mut r = resolver(table(p1, filler(20, 7)));
        let now = Instant::now();
        let pair = |a, b| {
            act(
                Seat::P1,
                Action::Construct {
                    ids: vec![a, b],
                    extra_discards: vec![],
                },
            )
        };

        r.handle(pair(1, 2), now);
        assert_eq!((r.state().turn, r.state().bonus_chain), (Seat::P1, 1));
        r.handle(pair(3, 4), now);
        assert_eq!((r.state().turn, r.state().bonus_chain), (Seat::P1, 2));
        r.handle(pair(5, 6), now);
        assert_eq!((r.state().turn, r.state().bonus_chain), (Seat::P2, 0));
        assert_eq!(r.state().player(Seat::P1).score(), 15);
    }

    #[test]
    fn sigil_king_should_score_five_and_draw_two() {
        let mut p1 = vec![c(13, Rank::King, Suit::Spades)];
        p1.extend(filler(1, 3));
        let mut r = resolver(table(p1, filler(20, 7)));
        r.handle(act(Seat::P1, Action::Sigil { card_id: 13 }), Instant::now());
        assert_eq!(r.state().player(Seat::P1).score(), 5);
        assert_eq!(r.state().player(Seat::P1).hand().len(), 3 + 2 + 1);
    }

    #[test]
    fn sigil_should_require_a_face_card() {
        let mut r = resolver(table(filler(1, 4), filler(20, 7)));
        let outcomes = r.handle(act(Seat::P1, Action::Sigil { card_id: 1 }), Instant::now());
        assert!(matches!(
            outcomes[0],
            Outcome::Rejected(ResolveError::AuthorityMismatch(_))
        ));
    }

    #[test]
    fn reaching_sixty_should_end_the_game() {
        let mut p1 = vec![c(13, Rank::King, Suit::Spades)];
        p1.extend(filler(1, 3));
        let mut state = table(p1, filler(20, 7));
        state.player_mut(Seat::P1).add_score(56);
        let mut r = resolver(state);
        let outcomes = r.handle(act(Seat::P1, Action::Sigil { card_id: 13 }), Instant::now());
        match &outcomes[0] {
            Outcome::Applied(events) => {
                assert_eq!(events.last(), Some(&Event::Winner(Seat::P1)))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(r.phase(), &ResolverState::GameOver);
        assert!(!r.state().started);
        let after = r.handle(act(Seat::P2, Action::Discard { card_id: 20 }), Instant::now());
        assert_eq!(after, vec![Outcome::Rejected(ResolveError::GameOver)]);
    }

    #[test]
    fn empty_deck_should_not_fail_draws() {
        let mut p1 = vec![c(6, Rank::Six, Suit::Spades)];
        p1.extend(filler(1, 3));
        let mut state = table(p1, filler(20, 7));
        let rest = std::mem::take(&mut state.deck);
        state.discard = rest;
        let mut r = resolver(state);
        let outcomes = r.handle(act(Seat::P1, Action::DrawTwo { card_id: 6 }), Instant::now());
        assert!(matches!(outcomes[0], Outcome::Applied(_)));
        assert_eq!(r.state().player(Seat::P1).hand().len(), 3);
        assert!(r.state().is_conserved());
    }
}
