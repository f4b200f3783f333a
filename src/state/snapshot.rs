//! Persisted tournament snapshots.
//!
//! One snapshot per tournament name holds the full state; every mutating
//! operation replaces it wholesale.

use crate::types::{TournamentName, TournamentState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for snapshot compatibility
/// Version 1: initial layout
/// Version 2: added champion and participants
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentSnapshot {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub tournament: TournamentName,
    pub state: TournamentState,
}

impl TournamentSnapshot {
    pub fn new(tournament: impl Into<TournamentName>, state: TournamentState) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            tournament: tournament.into(),
            state,
        }
    }

    /// Validate a loaded snapshot before trusting it
    pub fn validate(&self, expected_name: &str) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        if self.tournament != expected_name {
            return Err(format!(
                "Snapshot belongs to '{}', expected '{}'",
                self.tournament, expected_name
            ));
        }

        if let Some(ref active) = self.state.active_matchup {
            let exists = self
                .state
                .bracket
                .get(active.round)
                .and_then(|r| r.get(active.matchup_index_in_round))
                .is_some();
            if !exists {
                return Err(format!(
                    "Active matchup R{} M{} not found in bracket",
                    active.round + 1,
                    active.matchup_index_in_round + 1
                ));
            }
        }

        Ok(())
    }
}
