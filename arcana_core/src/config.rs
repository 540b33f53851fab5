use std::time::Duration;

/// Score at which the game ends.
pub const WIN_SCORE: u32 = 60;
/// Cards dealt to each player on START, and the target of the 4-wild refill.
pub const HAND_SIZE: usize = 7;
/// Cards drawn when a player starts a turn holding at most one card.
pub const SAFETY_NET_DRAW: usize = 3;
/// Maximum number of consecutive repeat turns granted by the Clubs bonus.
pub const MAX_BONUS_CHAIN: u8 = 2;
/// Requests that may wait behind a pending Ace offer before further ones are rejected.
pub const MAX_QUEUED_REQUESTS: usize = 8;

pub const DEFAULT_ACE_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How long the host waits for an Ace reply before treating it as declined.
    pub ace_reply_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            ace_reply_timeout: DEFAULT_ACE_REPLY_TIMEOUT,
        }
    }
}
