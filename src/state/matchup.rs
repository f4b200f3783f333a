//! Lifecycle of the single open matchup: arm, take votes, resolve.
//!
//! The active matchup is a projection of one stored matchup in the bracket.
//! Every change made here lands on both copies in the same call.

use crate::error::{TournamentError, TournamentResult};
use crate::types::{ActiveMatchup, Matchup, Prompt, TournamentState, TournamentStatus};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

/// Outcome of an accepted vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteTally {
    pub code: String,
    pub round: usize,
    pub chosen: Prompt,
    pub votes_a: u32,
    pub votes_b: u32,
}

fn stored_matchup_mut(
    state: &mut TournamentState,
    round: usize,
    index: usize,
) -> TournamentResult<&mut Matchup> {
    state
        .bracket
        .get_mut(round)
        .and_then(|r| r.get_mut(index))
        .ok_or_else(|| {
            TournamentError::InconsistentBracket(format!(
                "matchup {} of round {} not found",
                index + 1,
                round + 1
            ))
        })
}

/// Open `bracket[round][index]` for voting until `now + duration`.
///
/// Counts and voters are copied from the stored matchup, so re-arming a
/// matchup that already has votes keeps them.
pub fn arm(
    state: &mut TournamentState,
    round: usize,
    index: usize,
    now: DateTime<Utc>,
    duration: Duration,
) -> TournamentResult<ActiveMatchup> {
    let end = now + duration;
    let stored = stored_matchup_mut(state, round, index)?;
    stored.voting_start_time = Some(now);
    stored.voting_end_time = Some(end);

    let active = ActiveMatchup {
        prompt_a: stored.prompt_a.clone(),
        prompt_b: stored.prompt_b.clone(),
        votes_a: stored.votes_a,
        votes_b: stored.votes_b,
        code_a: stored.code_a.clone(),
        code_b: stored.code_b.clone(),
        voters: stored.voters.clone(),
        round,
        matchup_index_in_round: index,
        voting_start_time: now,
        voting_end_time: end,
    };

    tracing::info!(
        "Armed R{} M{}: '{}' vs '{}', voting ends {}",
        round + 1,
        index + 1,
        active.prompt_a.text,
        active.prompt_b.text,
        end.to_rfc3339()
    );

    state.active_matchup = Some(active.clone());
    Ok(active)
}

/// Whether the open matchup's deadline has passed
pub fn is_expired(state: &TournamentState, now: DateTime<Utc>) -> bool {
    state.status == TournamentStatus::Voting
        && state
            .active_matchup
            .as_ref()
            .is_some_and(|a| now >= a.voting_end_time)
}

/// Record one vote from `voter_alias` for the prompt behind `code`
pub fn cast_vote(
    state: &mut TournamentState,
    voter_alias: &str,
    code: &str,
    now: DateTime<Utc>,
) -> TournamentResult<VoteTally> {
    if state.status != TournamentStatus::Voting {
        return Err(TournamentError::NoActiveMatchup);
    }
    let active = state
        .active_matchup
        .as_ref()
        .ok_or(TournamentError::NoActiveMatchup)?;

    if now >= active.voting_end_time {
        return Err(TournamentError::VotingClosed);
    }
    if active.voters.iter().any(|v| v == voter_alias) {
        return Err(TournamentError::DuplicateVote);
    }

    let for_a = if code == active.code_a {
        true
    } else if code == active.code_b && !active.prompt_b.is_bye() {
        false
    } else {
        return Err(TournamentError::InvalidCode(code.to_string()));
    };

    let (round, index) = (active.round, active.matchup_index_in_round);
    let stored = stored_matchup_mut(state, round, index)?;
    if for_a {
        stored.votes_a += 1;
    } else {
        stored.votes_b += 1;
    }
    stored.voters.push(voter_alias.to_string());
    let (votes_a, votes_b) = (stored.votes_a, stored.votes_b);
    let voters = stored.voters.clone();

    let active = state
        .active_matchup
        .as_mut()
        .ok_or(TournamentError::NoActiveMatchup)?;
    active.votes_a = votes_a;
    active.votes_b = votes_b;
    active.voters = voters;

    let chosen = if for_a {
        active.prompt_a.clone()
    } else {
        active.prompt_b.clone()
    };

    tracing::debug!(
        "Vote for {} by {}: A={} B={} ({} voters)",
        code,
        voter_alias,
        votes_a,
        votes_b,
        active.voters.len()
    );

    Ok(VoteTally {
        code: code.to_string(),
        round,
        chosen,
        votes_a,
        votes_b,
    })
}

/// Decide the open matchup and write the result into the bracket.
///
/// A bye always goes to prompt A. Otherwise the higher count wins and an
/// exact tie is a coin flip.
pub fn resolve<R: Rng + ?Sized>(state: &mut TournamentState, rng: &mut R) -> TournamentResult<Prompt> {
    let active = state
        .active_matchup
        .clone()
        .ok_or(TournamentError::NoActiveMatchup)?;

    let winner = if active.prompt_b.is_bye() {
        active.prompt_a.clone()
    } else if active.votes_a > active.votes_b {
        active.prompt_a.clone()
    } else if active.votes_b > active.votes_a {
        active.prompt_b.clone()
    } else {
        let pick = if rng.random_bool(0.5) {
            active.prompt_a.clone()
        } else {
            active.prompt_b.clone()
        };
        tracing::info!(
            "Tie ('{}' {} vs '{}' {}), tie-breaker picked '{}'",
            active.prompt_a.text,
            active.votes_a,
            active.prompt_b.text,
            active.votes_b,
            pick.text
        );
        pick
    };

    let stored = stored_matchup_mut(state, active.round, active.matchup_index_in_round)?;
    stored.winner = Some(winner.clone());
    stored.votes_a = active.votes_a;
    stored.votes_b = active.votes_b;

    tracing::info!(
        "Winner of R{} M{} is '{}'",
        active.round + 1,
        active.matchup_index_in_round + 1,
        winner.text
    );
    Ok(winner)
}
