//! Participant registration and display aliases.
//!
//! Votes are deduplicated by alias, so a participant who comes back from a
//! new session rebinds their identity key and keeps their vote history.

use crate::error::{TournamentError, TournamentResult};
use crate::types::{Participant, TournamentState, TournamentStatus};
use rand::seq::IndexedRandom;
use rand::Rng;

const ADJECTIVES: [&str; 20] = [
    "Brave", "Calm", "Clever", "Daring", "Eager", "Fancy", "Gentle", "Happy", "Jolly", "Kind",
    "Lively", "Lucky", "Mighty", "Nimble", "Proud", "Quick", "Quiet", "Silly", "Swift", "Witty",
];

const COLORS: [&str; 20] = [
    "Amber", "Azure", "Black", "Blue", "Bronze", "Coral", "Crimson", "Gold", "Gray", "Green",
    "Indigo", "Ivory", "Lime", "Orange", "Pink", "Purple", "Red", "Silver", "Teal", "White",
];

const ANIMALS: [&str; 20] = [
    "Badger", "Bear", "Beaver", "Crane", "Dolphin", "Eagle", "Falcon", "Fox", "Gecko", "Heron",
    "Koala", "Lemur", "Lynx", "Otter", "Owl", "Panda", "Puffin", "Rabbit", "Tiger", "Wolf",
];

const MAX_ALIAS_ATTEMPTS: usize = 100;

fn random_alias<R: Rng + ?Sized>(rng: &mut R) -> String {
    // Lists are non-empty constants
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Brave");
    let color = COLORS.choose(rng).copied().unwrap_or("Blue");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("Fox");
    format!("{} {} {}", adjective, color, animal)
}

/// Generate "Adjective Color Animal", unique among `taken`
pub fn generate_alias<R: Rng + ?Sized>(taken: &[&str], rng: &mut R) -> String {
    for _ in 0..MAX_ALIAS_ATTEMPTS {
        let alias = random_alias(rng);
        if !taken.contains(&alias.as_str()) {
            return alias;
        }
    }

    tracing::warn!(
        "No free alias after {} attempts, falling back to numbered alias",
        MAX_ALIAS_ATTEMPTS
    );
    loop {
        let alias = format!("{} {}", random_alias(rng), rng.random_range(0..1000));
        if !taken.contains(&alias.as_str()) {
            return alias;
        }
    }
}

fn clean_name(field: &str, value: &str) -> TournamentResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TournamentError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Register the caller under a fresh alias. Only open in the waiting room.
pub fn register<R: Rng + ?Sized>(
    state: &mut TournamentState,
    identity_key: &str,
    first_name: &str,
    last_name: &str,
    rng: &mut R,
) -> TournamentResult<Participant> {
    if state.status != TournamentStatus::Waiting {
        return Err(TournamentError::NotInWaitingState {
            status: state.status.to_string(),
        });
    }
    if identity_key.trim().is_empty() {
        return Err(TournamentError::InvalidInput(
            "identity key is required".to_string(),
        ));
    }
    let first_name = clean_name("first name", first_name)?;
    let last_name = clean_name("last name", last_name)?;

    if let Some(existing) = state.participant_by_key(identity_key) {
        return Err(TournamentError::AlreadyRegistered(existing.alias.clone()));
    }

    let taken: Vec<&str> = state.participants.iter().map(|p| p.alias.as_str()).collect();
    let alias = generate_alias(&taken, rng);

    let participant = Participant {
        first_name,
        last_name,
        alias,
        identity_key: identity_key.to_string(),
    };
    tracing::info!("Registered participant '{}'", participant.alias);
    state.participants.push(participant.clone());
    Ok(participant)
}

/// Rebind `identity_key` to the participant matching name and alias
pub fn confirm_identity(
    state: &mut TournamentState,
    identity_key: &str,
    first_name: &str,
    last_name: &str,
    alias: &str,
) -> TournamentResult<Participant> {
    if identity_key.trim().is_empty() {
        return Err(TournamentError::InvalidInput(
            "identity key is required".to_string(),
        ));
    }
    let alias = alias.trim();

    let index = state
        .participants
        .iter()
        .position(|p| p.alias.eq_ignore_ascii_case(alias))
        .ok_or_else(|| TournamentError::UnknownParticipant(alias.to_string()))?;

    let candidate = &state.participants[index];
    if !candidate.first_name.eq_ignore_ascii_case(first_name.trim())
        || !candidate.last_name.eq_ignore_ascii_case(last_name.trim())
    {
        tracing::warn!("Identity confirmation failed for '{}': name mismatch", candidate.alias);
        return Err(TournamentError::IdentityMismatch(candidate.alias.clone()));
    }

    if let Some(other) = state
        .participants
        .iter()
        .enumerate()
        .find(|(i, p)| *i != index && p.identity_key == identity_key)
        .map(|(_, p)| p)
    {
        return Err(TournamentError::AlreadyRegistered(other.alias.clone()));
    }

    let participant = &mut state.participants[index];
    participant.identity_key = identity_key.to_string();
    tracing::info!("Rebound identity for '{}'", participant.alias);
    Ok(participant.clone())
}

/// Participant behind `identity_key`, checked against the alias they vote as
pub fn authorize_voter<'a>(
    state: &'a TournamentState,
    identity_key: &str,
    alias: &str,
) -> TournamentResult<&'a Participant> {
    let participant = state
        .participant_by_alias(alias)
        .ok_or_else(|| TournamentError::UnknownParticipant(alias.to_string()))?;
    if participant.identity_key != identity_key {
        return Err(TournamentError::IdentityMismatch(alias.to_string()));
    }
    Ok(participant)
}
