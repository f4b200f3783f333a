//! Round and matchup progression.
//!
//! `setup -> waiting -> voting <-> round_over -> game_over`. Expiry is lazy:
//! nothing runs in the background, the next request that sees a passed
//! deadline performs the transition.

use super::bracket::{build_next_round, NextRound};
use super::matchup::{arm, is_expired, resolve};
use crate::error::{TournamentError, TournamentResult};
use crate::types::{round_is_complete, Matchup, Prompt, TournamentState, TournamentStatus};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Where progression landed
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// `bracket[round][index]` is now open for voting
    Armed { round: usize, index: usize },
    /// The game is over
    Champion(Prompt),
}

/// Open the next unresolved matchup, building the next round when needed
pub fn prepare_next(
    state: &mut TournamentState,
    now: DateTime<Utc>,
    duration: Duration,
) -> TournamentResult<Advance> {
    let current = state.current_round;
    let round = state.bracket.get(current).ok_or_else(|| {
        TournamentError::InconsistentBracket(format!("round {} does not exist", current + 1))
    })?;

    if let Some(index) = first_unresolved(round, state.current_matchup_index) {
        return open(state, current, index, now, duration);
    }

    if !round_is_complete(round) {
        return Err(TournamentError::InconsistentBracket(format!(
            "round {} has unresolved matchups before index {}",
            current + 1,
            state.current_matchup_index + 1
        )));
    }

    if round.len() == 1 {
        if let Some(champion) = round[0].winner.clone() {
            finish(state, champion.clone());
            return Ok(Advance::Champion(champion));
        }
    }

    match build_next_round(round, current + 1)? {
        NextRound::GameOver(champion) => {
            finish(state, champion.clone());
            Ok(Advance::Champion(champion))
        }
        NextRound::Round(next) => {
            let index = first_unresolved(&next, 0).ok_or_else(|| {
                TournamentError::InconsistentBracket(format!(
                    "round {} has nothing to vote on",
                    current + 2
                ))
            })?;
            state.bracket.push(next);
            state.current_round = current + 1;
            open(state, current + 1, index, now, duration)
        }
    }
}

/// Resolve the open matchup and move on
pub fn close_and_advance<R: Rng + ?Sized>(
    state: &mut TournamentState,
    now: DateTime<Utc>,
    duration: Duration,
    rng: &mut R,
) -> TournamentResult<Advance> {
    if let Err(e) = resolve(state, rng) {
        let e = match e {
            TournamentError::NoActiveMatchup => TournamentError::InconsistentBracket(
                "voting without an active matchup".to_string(),
            ),
            other => other,
        };
        return Err(stall(state, e));
    }
    state.status = TournamentStatus::RoundOver;

    prepare_next(state, now, duration).map_err(|e| stall(state, e))
}

/// Explicit moderator advance
pub fn launch_next<R: Rng + ?Sized>(
    state: &mut TournamentState,
    now: DateTime<Utc>,
    duration: Duration,
    rng: &mut R,
) -> TournamentResult<Advance> {
    match state.status {
        TournamentStatus::Setup => Err(TournamentError::NotStarted),
        TournamentStatus::GameOver => Err(TournamentError::GameOver),
        TournamentStatus::Voting => {
            tracing::info!("Moderator closing voting early");
            close_and_advance(state, now, duration, rng)
        }
        TournamentStatus::Waiting | TournamentStatus::RoundOver => {
            prepare_next(state, now, duration).map_err(|e| stall(state, e))
        }
    }
}

/// Run the deadline transition if the open matchup has expired.
///
/// Returns `None` when nothing was due. A stalled bracket is logged and
/// left in `round_over`; readers still get a consistent state.
pub fn auto_advance<R: Rng + ?Sized>(
    state: &mut TournamentState,
    now: DateTime<Utc>,
    duration: Duration,
    rng: &mut R,
) -> Option<TournamentResult<Advance>> {
    if !is_expired(state, now) {
        return None;
    }
    tracing::info!("Voting deadline passed, advancing automatically");
    Some(close_and_advance(state, now, duration, rng))
}

fn first_unresolved(round: &[Matchup], from: usize) -> Option<usize> {
    round
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, m)| !m.is_resolved())
        .map(|(i, _)| i)
}

fn open(
    state: &mut TournamentState,
    round: usize,
    index: usize,
    now: DateTime<Utc>,
    duration: Duration,
) -> TournamentResult<Advance> {
    arm(state, round, index, now, duration)?;
    state.current_matchup_index = index;
    state.status = TournamentStatus::Voting;
    Ok(Advance::Armed { round, index })
}

fn finish(state: &mut TournamentState, champion: Prompt) {
    tracing::info!("Game over, champion is '{}'", champion.text);
    state.status = TournamentStatus::GameOver;
    state.active_matchup = None;
    state.champion = Some(champion);
}

fn stall(state: &mut TournamentState, error: TournamentError) -> TournamentError {
    tracing::error!(
        "Tournament stuck in round {} at matchup {}: {}",
        state.current_round + 1,
        state.current_matchup_index + 1,
        error
    );
    state.status = TournamentStatus::RoundOver;
    state.active_matchup = None;
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::bracket::build_first_round;
    use crate::state::matchup::cast_vote;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn voting() -> Duration {
        Duration::seconds(20)
    }

    fn waiting_state(texts: &[&str], rng: &mut StdRng) -> TournamentState {
        let prompts: Vec<Prompt> = texts.iter().map(|t| Prompt::new(*t)).collect();
        let round = build_first_round(&prompts, rng).unwrap();
        TournamentState {
            status: TournamentStatus::Waiting,
            prompts,
            bracket: vec![round],
            ..TournamentState::new()
        }
    }

    #[test]
    fn test_launch_from_setup_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = TournamentState::new();
        assert_eq!(
            launch_next(&mut state, Utc::now(), voting(), &mut rng),
            Err(TournamentError::NotStarted)
        );
    }

    #[test]
    fn test_launch_from_waiting_arms_first_matchup() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = waiting_state(&["A", "B", "C", "D"], &mut rng);
        let now = Utc::now();

        let advance = launch_next(&mut state, now, voting(), &mut rng).unwrap();
        assert_eq!(advance, Advance::Armed { round: 0, index: 0 });
        assert_eq!(state.status, TournamentStatus::Voting);
        assert_eq!(
            state.active_matchup.as_ref().unwrap().voting_end_time,
            now + voting()
        );
    }

    #[test]
    fn test_two_prompts_play_to_champion() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = waiting_state(&["A", "B"], &mut rng);
        let now = Utc::now();

        launch_next(&mut state, now, voting(), &mut rng).unwrap();
        let code_a = state.active_matchup.as_ref().unwrap().code_a.clone();
        let expected = state.active_matchup.as_ref().unwrap().prompt_a.clone();
        cast_vote(&mut state, "voter", &code_a, now).unwrap();

        let advance = launch_next(&mut state, now, voting(), &mut rng).unwrap();
        assert_eq!(advance, Advance::Champion(expected.clone()));
        assert_eq!(state.status, TournamentStatus::GameOver);
        assert_eq!(state.champion, Some(expected));
        assert!(state.active_matchup.is_none());

        assert_eq!(
            launch_next(&mut state, now, voting(), &mut rng),
            Err(TournamentError::GameOver)
        );
    }

    #[test]
    fn test_skips_bye_and_builds_next_round() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = waiting_state(&["A", "B", "C"], &mut rng);
        let now = Utc::now();

        launch_next(&mut state, now, voting(), &mut rng).unwrap();
        let active = state.active_matchup.clone().unwrap();
        assert!(!active.prompt_b.is_bye());
        cast_vote(&mut state, "v1", &active.code_a, now).unwrap();

        let advance = launch_next(&mut state, now, voting(), &mut rng).unwrap();
        assert_eq!(advance, Advance::Armed { round: 1, index: 0 });
        assert_eq!(state.current_round, 1);
        assert_eq!(state.bracket.len(), 2);

        let final_match = &state.bracket[1][0];
        assert_eq!(final_match.prompt_a, active.prompt_a);
        assert_eq!(Some(&final_match.prompt_b), state.bracket[0][1].winner.as_ref());
    }

    #[test]
    fn test_auto_advance_only_when_expired() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = waiting_state(&["A", "B", "C", "D"], &mut rng);
        let now = Utc::now();
        launch_next(&mut state, now, voting(), &mut rng).unwrap();

        assert!(auto_advance(&mut state, now + Duration::seconds(10), voting(), &mut rng).is_none());

        let later = now + Duration::seconds(25);
        let advance = auto_advance(&mut state, later, voting(), &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(advance, Advance::Armed { round: 0, index: 1 });
        assert!(state.bracket[0][0].winner.is_some());

        // Second read at the same instant sees a fresh deadline
        assert!(auto_advance(&mut state, later, voting(), &mut rng).is_none());
        assert_eq!(state.current_matchup_index, 1);
    }

    #[test]
    fn test_inconsistent_bracket_stalls_in_round_over() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = Prompt::new("A");
        let b = Prompt::new("B");
        let mut state = TournamentState {
            status: TournamentStatus::RoundOver,
            current_matchup_index: 1,
            bracket: vec![vec![
                Matchup::pair(a.clone(), b.clone(), "A1".into(), "B1".into()),
                Matchup::pair(b, a, "A2".into(), "B2".into()),
            ]],
            ..TournamentState::new()
        };
        state.bracket[0][1].winner = Some(state.bracket[0][1].prompt_a.clone());

        let result = launch_next(&mut state, Utc::now(), voting(), &mut rng);
        assert!(matches!(result, Err(TournamentError::InconsistentBracket(_))));
        assert_eq!(state.status, TournamentStatus::RoundOver);
        assert!(state.active_matchup.is_none());
    }

    #[test]
    fn test_missing_round_stalls() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = TournamentState {
            status: TournamentStatus::Waiting,
            ..TournamentState::new()
        };
        let result = launch_next(&mut state, Utc::now(), voting(), &mut rng);
        assert!(matches!(result, Err(TournamentError::InconsistentBracket(_))));
        assert_eq!(state.status, TournamentStatus::RoundOver);
    }
}
