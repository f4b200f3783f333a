use super::controller::{self, Advance};
use super::matchup::{self, VoteTally};
use super::participant;
use super::snapshot::TournamentSnapshot;
use super::AppState;
use crate::error::{Committed, TournamentError, TournamentResult};
use crate::prompts::prompts_from_texts;
use crate::sink::{TournamentResults, TournamentSummary};
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const MAX_TOURNAMENT_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveMatchupView {
    pub prompt_a: Prompt,
    pub prompt_b: Prompt,
    pub code_a: String,
    pub code_b: String,
    pub votes_a: u32,
    pub votes_b: u32,
    pub voter_count: usize,
    pub round: usize,
    pub matchup_index_in_round: usize,
    pub voting_start_time: DateTime<Utc>,
    pub voting_end_time: DateTime<Utc>,
    pub current_user_has_voted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ParticipantView {
    pub alias: Alias,
    pub first_name: String,
    pub last_name: String,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            alias: p.alias.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
        }
    }
}

/// What a client sees of a tournament
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TournamentView {
    pub tournament: TournamentName,
    pub status: TournamentStatus,
    pub current_round: usize,
    pub current_matchup_index: usize,
    pub prompt_count: usize,
    pub participant_count: usize,
    pub bracket: Vec<Round>,
    pub active_matchup: Option<ActiveMatchupView>,
    pub champion: Option<Prompt>,
    /// The caller, when their identity key is registered
    pub participant: Option<ParticipantView>,
    pub server_now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoteReceipt {
    pub code: String,
    pub chosen: Prompt,
    pub votes_a: u32,
    pub votes_b: u32,
    pub current_user_has_voted: bool,
}

impl From<VoteTally> for VoteReceipt {
    fn from(t: VoteTally) -> Self {
        Self {
            code: t.code,
            chosen: t.chosen,
            votes_a: t.votes_a,
            votes_b: t.votes_b,
            current_user_has_voted: true,
        }
    }
}

/// A loaded state with any lazy expiry already applied
struct Loaded {
    state: TournamentState,
    warning: Option<String>,
    /// The matchup that expired while loading, if any
    expired: Option<ActiveMatchup>,
}

fn validate_name(name: &str) -> TournamentResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_TOURNAMENT_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TournamentError::InvalidInput(format!(
            "tournament name '{}' must be 1-{} characters of letters, digits, '-' or '_'",
            name, MAX_TOURNAMENT_NAME_LEN
        )))
    }
}

fn view(
    name: &str,
    state: &TournamentState,
    identity_key: Option<&str>,
    now: DateTime<Utc>,
) -> TournamentView {
    let participant = identity_key.and_then(|k| state.participant_by_key(k));
    let active_matchup = state.active_matchup.as_ref().map(|a| ActiveMatchupView {
        prompt_a: a.prompt_a.clone(),
        prompt_b: a.prompt_b.clone(),
        code_a: a.code_a.clone(),
        code_b: a.code_b.clone(),
        votes_a: a.votes_a,
        votes_b: a.votes_b,
        voter_count: a.voters.len(),
        round: a.round,
        matchup_index_in_round: a.matchup_index_in_round,
        voting_start_time: a.voting_start_time,
        voting_end_time: a.voting_end_time,
        current_user_has_voted: participant.is_some_and(|p| a.voters.contains(&p.alias)),
    });

    TournamentView {
        tournament: name.to_string(),
        status: state.status,
        current_round: state.current_round,
        current_matchup_index: state.current_matchup_index,
        prompt_count: state.prompts.len(),
        participant_count: state.participants.len(),
        bracket: state.bracket.clone(),
        active_matchup,
        champion: state.champion.clone(),
        participant: participant.map(ParticipantView::from),
        server_now: now,
    }
}

impl AppState {
    /// Load a snapshot. Corrupt or invalid snapshots are discarded and
    /// replaced by a fresh setup state.
    async fn load_state(&self, name: &str) -> TournamentResult<Option<TournamentState>> {
        match self.store.load(name).await {
            Ok(Some(snapshot)) => match snapshot.validate(name) {
                Ok(()) => Ok(Some(snapshot.state)),
                Err(reason) => {
                    tracing::warn!("Discarding invalid snapshot for '{}': {}", name, reason);
                    self.discard_snapshot(name).await;
                    Ok(Some(TournamentState::new()))
                }
            },
            Ok(None) => Ok(None),
            Err(crate::store::StoreError::Corrupt(reason)) => {
                tracing::warn!("Discarding corrupt snapshot for '{}': {}", name, reason);
                self.discard_snapshot(name).await;
                Ok(Some(TournamentState::new()))
            }
            Err(e) => Err(TournamentError::PersistenceFailure(e.to_string())),
        }
    }

    async fn discard_snapshot(&self, name: &str) {
        if let Err(e) = self.store.delete(name).await {
            tracing::warn!("Failed to delete snapshot for '{}': {}", name, e);
        }
    }

    async fn require_state(&self, name: &str) -> TournamentResult<TournamentState> {
        self.load_state(name)
            .await?
            .ok_or_else(|| TournamentError::UnknownTournament(name.to_string()))
    }

    /// Save the snapshot; a failure comes back as a durability warning
    async fn persist(&self, name: &str, state: &TournamentState) -> Option<String> {
        let snapshot = TournamentSnapshot::new(name, state.clone());
        match self.store.save(&snapshot).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to save snapshot for '{}': {}", name, e);
                Some(format!("recorded but not saved: {}", e))
            }
        }
    }

    async fn fetch_prompts(&self, name: &str) -> Vec<Prompt> {
        match self.prompts.fetch(name).await {
            Ok(texts) => {
                let prompts = prompts_from_texts(texts);
                tracing::info!("Loaded {} prompts for '{}'", prompts.len(), name);
                prompts
            }
            Err(e) => {
                tracing::warn!("Failed to load prompts for '{}': {}", name, e);
                Vec::new()
            }
        }
    }

    /// Hand the final bracket to the results sink
    async fn export_summary(
        &self,
        name: &str,
        state: &TournamentState,
        champion: Prompt,
    ) -> Option<String> {
        let summary = TournamentSummary::from_state(name, state, champion, self.clock.now());
        match self.sink.write_summary(&summary).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to export results for '{}': {}", name, e);
                Some(format!("Results not exported: {}", e))
            }
        }
    }

    /// Persist after progression and export the summary if the game just ended
    async fn commit_progress(
        &self,
        name: &str,
        state: &TournamentState,
        advance: Option<&Advance>,
    ) -> Option<String> {
        let mut warning = self.persist(name, state).await;
        if let Some(Advance::Champion(champion)) = advance {
            let export_warning = self.export_summary(name, state, champion.clone()).await;
            warning = warning.or(export_warning);
        }
        warning
    }

    /// Load and apply lazy expiry before serving a request
    async fn load_for_request(&self, name: &str) -> TournamentResult<Loaded> {
        let state = self.require_state(name).await?;
        Ok(self.advance_if_expired(name, state).await)
    }

    /// Run a due deadline transition and persist it
    async fn advance_if_expired(&self, name: &str, mut state: TournamentState) -> Loaded {
        let now = self.clock.now();
        let before = state.active_matchup.clone();
        let duration = self.voting_duration;

        let result = self.with_rng(|rng| controller::auto_advance(&mut state, now, duration, rng));
        let Some(result) = result else {
            return Loaded {
                state,
                warning: None,
                expired: None,
            };
        };

        let advance = match result {
            Ok(advance) => Some(advance),
            Err(e) => {
                // Stalled in round_over; still serve the request
                tracing::error!("Automatic advance for '{}' stalled: {}", name, e);
                None
            }
        };
        let warning = self.commit_progress(name, &state, advance.as_ref()).await;

        Loaded {
            state,
            warning,
            expired: before,
        }
    }

    /// Load or create a tournament. Prompts are reloaded while it is still in setup.
    pub async fn select_tournament(&self, name: &str) -> TournamentResult<Committed<TournamentView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;

        let (mut state, expiry_warning) = match self.load_state(name).await? {
            Some(state) => {
                let loaded = self.advance_if_expired(name, state).await;
                (loaded.state, loaded.warning)
            }
            None => {
                tracing::info!("Creating tournament '{}'", name);
                (TournamentState::new(), None)
            }
        };

        if state.status == TournamentStatus::Setup {
            state.prompts = self.fetch_prompts(name).await;
        }

        let warning = self.persist(name, &state).await;
        Ok(Committed::durable(view(name, &state, None, self.clock.now()))
            .with_warning(expiry_warning)
            .with_warning(warning))
    }

    /// Build round 1 and open the waiting room
    pub async fn start_game(&self, name: &str) -> TournamentResult<Committed<TournamentView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let mut state = self.require_state(name).await?;

        if state.status != TournamentStatus::Setup {
            return Err(TournamentError::AlreadyStarted {
                status: state.status.to_string(),
            });
        }
        if state.prompts.is_empty() {
            state.prompts = self.fetch_prompts(name).await;
        }

        let round = self.with_rng(|rng| super::bracket::build_first_round(&state.prompts, rng))?;
        state.bracket = vec![round];
        state.status = TournamentStatus::Waiting;
        state.current_round = 0;
        state.current_matchup_index = 0;
        state.active_matchup = None;
        state.champion = None;
        tracing::info!("Tournament '{}' is in the waiting room", name);

        let warning = self.persist(name, &state).await;
        Ok(Committed::durable(view(name, &state, None, self.clock.now())).with_warning(warning))
    }

    /// Moderator advance: close voting early or open the next matchup
    pub async fn launch_next(&self, name: &str) -> TournamentResult<Committed<TournamentView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let mut state = self.require_state(name).await?;
        let now = self.clock.now();
        let duration = self.voting_duration;

        let result = self.with_rng(|rng| controller::launch_next(&mut state, now, duration, rng));
        match result {
            Ok(advance) => {
                let warning = self.commit_progress(name, &state, Some(&advance)).await;
                Ok(Committed::durable(view(name, &state, None, now)).with_warning(warning))
            }
            Err(TournamentError::InconsistentBracket(reason)) => {
                // Keep the round_over stall so the moderator can retry
                let reason = match self.persist(name, &state).await {
                    Some(warning) => format!("{} (round_over {})", reason, warning),
                    None => reason,
                };
                Err(TournamentError::InconsistentBracket(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Wipe one tournament: state, participants and exported results
    pub async fn reset_game(&self, name: &str) -> TournamentResult<Committed<TournamentView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;

        let mut state = TournamentState::new();
        state.prompts = self.fetch_prompts(name).await;

        let mut warning = self.persist(name, &state).await;
        if let Err(e) = self.sink.clear(name).await {
            tracing::warn!("Failed to clear results for '{}': {}", name, e);
            warning = warning.or(Some(format!("Results not cleared: {}", e)));
        }
        tracing::info!("Tournament '{}' reset", name);

        Ok(Committed::durable(view(name, &state, None, self.clock.now())).with_warning(warning))
    }

    pub async fn register(
        &self,
        name: &str,
        identity_key: &str,
        first_name: &str,
        last_name: &str,
    ) -> TournamentResult<Committed<ParticipantView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let Loaded {
            mut state, warning, ..
        } = self.load_for_request(name).await?;

        let participant = self.with_rng(|rng| {
            participant::register(&mut state, identity_key, first_name, last_name, rng)
        })?;

        let save_warning = self.persist(name, &state).await;
        Ok(Committed::durable(ParticipantView::from(&participant))
            .with_warning(warning)
            .with_warning(save_warning))
    }

    pub async fn confirm_identity(
        &self,
        name: &str,
        identity_key: &str,
        first_name: &str,
        last_name: &str,
        alias: &str,
    ) -> TournamentResult<Committed<ParticipantView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let Loaded {
            mut state, warning, ..
        } = self.load_for_request(name).await?;

        let participant =
            participant::confirm_identity(&mut state, identity_key, first_name, last_name, alias)?;

        let save_warning = self.persist(name, &state).await;
        Ok(Committed::durable(ParticipantView::from(&participant))
            .with_warning(warning)
            .with_warning(save_warning))
    }

    /// Current state for the caller, after any due automatic advance
    pub async fn get_state(
        &self,
        name: &str,
        identity_key: Option<&str>,
    ) -> TournamentResult<Committed<TournamentView>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let Loaded { state, warning, .. } = self.load_for_request(name).await?;

        Ok(Committed::durable(view(name, &state, identity_key, self.clock.now()))
            .with_warning(warning))
    }

    pub async fn vote(
        &self,
        name: &str,
        identity_key: &str,
        alias: &str,
        code: &str,
    ) -> TournamentResult<Committed<VoteReceipt>> {
        validate_name(name)?;
        let _guard = self.lock_tournament(name).await;
        let Loaded {
            mut state,
            warning,
            expired,
        } = self.load_for_request(name).await?;

        participant::authorize_voter(&state, identity_key, alias)?;

        if let Some(expired) = expired {
            if code == expired.code_a || code == expired.code_b {
                tracing::warn!("Vote by {} for {} arrived after the deadline", alias, code);
                return Err(TournamentError::VotingClosed);
            }
        }

        let now = self.clock.now();
        let tally = matchup::cast_vote(&mut state, alias, code, now).inspect_err(|e| {
            tracing::warn!("Vote by {} for {} rejected: {}", alias, code, e);
        })?;

        let save_warning = self.persist(name, &state).await;
        let audit_warning = match self
            .sink
            .record_vote(name, alias, tally.round + 1, &tally.chosen.text)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to record audit row for {}: {}", alias, e);
                Some(format!("Vote counted but audit row not written: {}", e))
            }
        };

        Ok(Committed::durable(VoteReceipt::from(tally))
            .with_warning(save_warning)
            .with_warning(audit_warning)
            .with_warning(warning))
    }

    /// Exported ledger and summary for a tournament
    pub async fn results(&self, name: &str) -> TournamentResult<TournamentResults> {
        validate_name(name)?;
        self.sink
            .results(name)
            .await
            .map_err(|e| TournamentError::PersistenceFailure(e.to_string()))
    }
}
