use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PromptId = String;
pub type Alias = String;
pub type IdentityKey = String;
pub type TournamentName = String;

/// Id of the placeholder prompt that fills the empty slot of a bye
pub const BYE_PROMPT_ID: &str = "BYE_ID";
pub const BYE_PROMPT_TEXT: &str = "BYE (Auto-Win)";
/// Ballot code of the bye slot; never accepted as a vote
pub const BYE_CODE: &str = "BYE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub id: PromptId,
    pub text: String,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            text: text.into(),
        }
    }

    pub fn bye() -> Self {
        Self {
            id: BYE_PROMPT_ID.to_string(),
            text: BYE_PROMPT_TEXT.to_string(),
        }
    }

    pub fn is_bye(&self) -> bool {
        self.id == BYE_PROMPT_ID
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Matchup {
    pub prompt_a: Prompt,
    pub prompt_b: Prompt,
    pub votes_a: u32,
    pub votes_b: u32,
    pub winner: Option<Prompt>,
    pub code_a: String,
    pub code_b: String,
    #[serde(default)]
    pub voters: Vec<Alias>,
    #[serde(default)]
    pub voting_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_end_time: Option<DateTime<Utc>>,
}

impl Matchup {
    /// Open head-to-head between two prompts
    pub fn pair(prompt_a: Prompt, prompt_b: Prompt, code_a: String, code_b: String) -> Self {
        Self {
            prompt_a,
            prompt_b,
            votes_a: 0,
            votes_b: 0,
            winner: None,
            code_a,
            code_b,
            voters: Vec::new(),
            voting_start_time: None,
            voting_end_time: None,
        }
    }

    /// Pre-resolved slot for the unpaired prompt of an odd-sized round
    pub fn bye(prompt: Prompt, code_a: String) -> Self {
        Self {
            prompt_a: prompt.clone(),
            prompt_b: Prompt::bye(),
            votes_a: 1,
            votes_b: 0,
            winner: Some(prompt),
            code_a,
            code_b: BYE_CODE.to_string(),
            voters: Vec::new(),
            voting_start_time: None,
            voting_end_time: None,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.prompt_b.is_bye()
    }

    pub fn is_resolved(&self) -> bool {
        self.winner.is_some()
    }
}

/// Matchups in bracket position order
pub type Round = Vec<Matchup>;

/// A round is complete once every matchup in it has a winner
pub fn round_is_complete(round: &[Matchup]) -> bool {
    round.iter().all(Matchup::is_resolved)
}

/// The one matchup currently open for voting.
///
/// Mirrors the stored matchup at `bracket[round][matchup_index_in_round]`;
/// vote counts and voters are always written to both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveMatchup {
    pub prompt_a: Prompt,
    pub prompt_b: Prompt,
    pub votes_a: u32,
    pub votes_b: u32,
    pub code_a: String,
    pub code_b: String,
    pub voters: Vec<Alias>,
    pub round: usize,
    pub matchup_index_in_round: usize,
    pub voting_start_time: DateTime<Utc>,
    pub voting_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    Setup,
    Waiting,
    Voting,
    RoundOver,
    GameOver,
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TournamentStatus::Setup => "setup",
            TournamentStatus::Waiting => "waiting",
            TournamentStatus::Voting => "voting",
            TournamentStatus::RoundOver => "round_over",
            TournamentStatus::GameOver => "game_over",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub first_name: String,
    pub last_name: String,
    pub alias: Alias,
    pub identity_key: IdentityKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TournamentState {
    pub status: TournamentStatus,
    pub current_round: usize,
    pub current_matchup_index: usize,
    pub prompts: Vec<Prompt>,
    pub bracket: Vec<Round>,
    pub active_matchup: Option<ActiveMatchup>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Set when the game ends
    #[serde(default)]
    pub champion: Option<Prompt>,
}

impl TournamentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participant_by_alias(&self, alias: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.alias == alias)
    }

    pub fn participant_by_key(&self, key: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity_key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bye_matchup_is_pre_resolved() {
        let prompt = Prompt::new("Cats");
        let m = Matchup::bye(prompt.clone(), "A1".to_string());

        assert!(m.is_bye());
        assert_eq!(m.winner, Some(prompt));
        assert_eq!(m.votes_a, 1);
        assert_eq!(m.code_b, BYE_CODE);
    }

    #[test]
    fn test_round_completeness() {
        let a = Prompt::new("A");
        let b = Prompt::new("B");
        let mut round = vec![
            Matchup::pair(a.clone(), b, "A1".into(), "B1".into()),
            Matchup::bye(Prompt::new("C"), "A2".into()),
        ];
        assert!(!round_is_complete(&round));

        round[0].winner = Some(a);
        assert!(round_is_complete(&round));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TournamentStatus::RoundOver).unwrap();
        assert_eq!(json, "\"round_over\"");
        assert_eq!(TournamentStatus::GameOver.to_string(), "game_over");
    }
}
