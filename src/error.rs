//! Error taxonomy for tournament operations.
//!
//! Every variant is recoverable and returned to the caller. A failed write
//! after the in-memory mutation succeeded is not an error at all: it is
//! carried as a warning on [`Committed`].

use serde::Serialize;

pub type TournamentResult<T> = Result<T, TournamentError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TournamentError {
    #[error("Need at least 2 prompts to start, found {found}")]
    InsufficientPrompts { found: usize },

    #[error("Registration is only open in the waiting room (tournament is {status})")]
    NotInWaitingState { status: String },

    #[error("You have already voted in this matchup")]
    DuplicateVote,

    #[error("Time's up! Voting for this matchup has ended")]
    VotingClosed,

    #[error("Invalid ballot code: {0}")]
    InvalidCode(String),

    #[error("No participant with alias '{0}'")]
    UnknownParticipant(String),

    #[error("Identity does not match participant '{0}'")]
    IdentityMismatch(String),

    #[error("This session is already registered as '{0}'")]
    AlreadyRegistered(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("Bracket is inconsistent: {0}")]
    InconsistentBracket(String),

    #[error("Tournament '{0}' has not been selected")]
    UnknownTournament(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Game has already been started (tournament is {status})")]
    AlreadyStarted { status: String },

    #[error("Game has not been started yet")]
    NotStarted,

    #[error("Game is over, reset to play again")]
    GameOver,

    #[error("No matchup is open for voting")]
    NoActiveMatchup,
}

impl TournamentError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            TournamentError::InsufficientPrompts { .. } => "INSUFFICIENT_PROMPTS",
            TournamentError::NotInWaitingState { .. } => "NOT_IN_WAITING_STATE",
            TournamentError::DuplicateVote => "DUPLICATE_VOTE",
            TournamentError::VotingClosed => "VOTING_CLOSED",
            TournamentError::InvalidCode(_) => "INVALID_CODE",
            TournamentError::UnknownParticipant(_) => "UNKNOWN_PARTICIPANT",
            TournamentError::IdentityMismatch(_) => "IDENTITY_MISMATCH",
            TournamentError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            TournamentError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            TournamentError::InconsistentBracket(_) => "INCONSISTENT_BRACKET",
            TournamentError::UnknownTournament(_) => "UNKNOWN_TOURNAMENT",
            TournamentError::InvalidInput(_) => "INVALID_INPUT",
            TournamentError::AlreadyStarted { .. } => "ALREADY_STARTED",
            TournamentError::NotStarted => "NOT_STARTED",
            TournamentError::GameOver => "GAME_OVER",
            TournamentError::NoActiveMatchup => "NO_ACTIVE_MATCHUP",
        }
    }
}

/// Result of a mutating operation whose primary effect happened.
///
/// `warning` is set when the effect could not be made durable (snapshot
/// save or audit write failed).
#[derive(Debug, Clone, Serialize)]
pub struct Committed<T> {
    #[serde(flatten)]
    pub value: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Committed<T> {
    pub fn durable(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.warning.is_none()
    }

    /// Attach a durability warning, keeping the first one if several writes failed
    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        if self.warning.is_none() {
            self.warning = warning;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(TournamentError::DuplicateVote.code(), "DUPLICATE_VOTE");
        assert_eq!(
            TournamentError::InsufficientPrompts { found: 1 }.code(),
            "INSUFFICIENT_PROMPTS"
        );
    }

    #[test]
    fn test_committed_keeps_first_warning() {
        let c = Committed::durable(1)
            .with_warning(Some("first".into()))
            .with_warning(Some("second".into()));
        assert!(!c.is_durable());
        assert_eq!(c.warning.as_deref(), Some("first"));
    }
}
