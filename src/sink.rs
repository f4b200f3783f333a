//! Results export: a per-vote audit ledger and the final bracket summary.

use crate::types::{Prompt, TournamentState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Results file is corrupt: {0}")]
    Corrupt(String),

    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Who voted for what, one row per alias and one column per round
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoteLedger {
    pub rows: BTreeMap<String, BTreeMap<usize, String>>,
}

impl VoteLedger {
    /// Record a choice in the 1-based `round` column; later choices in the
    /// same round are appended comma-separated
    pub fn record(&mut self, alias: &str, round: usize, choice: &str) {
        let cell = self
            .rows
            .entry(alias.to_string())
            .or_default()
            .entry(round)
            .or_default();
        if cell.is_empty() {
            cell.push_str(choice);
        } else {
            cell.push_str(", ");
            cell.push_str(choice);
        }
    }

    pub fn cell(&self, alias: &str, round: usize) -> Option<&str> {
        self.rows
            .get(alias)
            .and_then(|r| r.get(&round))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchupResult {
    /// 1-based
    pub round: usize,
    pub prompt_a: String,
    pub prompt_b: String,
    pub votes_a: u32,
    pub votes_b: u32,
    pub winner: Option<String>,
}

/// Written once when the game ends
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TournamentSummary {
    pub tournament: String,
    pub champion: Prompt,
    pub finished_at: DateTime<Utc>,
    pub matchups: Vec<MatchupResult>,
}

impl TournamentSummary {
    pub fn from_state(
        tournament: &str,
        state: &TournamentState,
        champion: Prompt,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let matchups = state
            .bracket
            .iter()
            .enumerate()
            .flat_map(|(r, round)| {
                round.iter().map(move |m| MatchupResult {
                    round: r + 1,
                    prompt_a: m.prompt_a.text.clone(),
                    prompt_b: m.prompt_b.text.clone(),
                    votes_a: m.votes_a,
                    votes_b: m.votes_b,
                    winner: m.winner.as_ref().map(|w| w.text.clone()),
                })
            })
            .collect();

        Self {
            tournament: tournament.to_string(),
            champion,
            finished_at,
            matchups,
        }
    }
}

/// Everything exported for one tournament
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TournamentResults {
    pub ledger: VoteLedger,
    pub summary: Option<TournamentSummary>,
}

/// Trait that all results sinks must implement
#[async_trait]
pub trait ResultsSink: Send + Sync {
    /// Append one vote to the audit ledger (`round` is 1-based)
    async fn record_vote(
        &self,
        tournament: &str,
        alias: &str,
        round: usize,
        choice: &str,
    ) -> SinkResult<()>;

    async fn write_summary(&self, summary: &TournamentSummary) -> SinkResult<()>;

    /// Drop ledger and summary for one tournament
    async fn clear(&self, tournament: &str) -> SinkResult<()>;

    async fn results(&self, tournament: &str) -> SinkResult<TournamentResults>;
}

#[derive(Debug, Default)]
pub struct MemoryResultsSink {
    results: RwLock<HashMap<String, TournamentResults>>,
}

impl MemoryResultsSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultsSink for MemoryResultsSink {
    async fn record_vote(
        &self,
        tournament: &str,
        alias: &str,
        round: usize,
        choice: &str,
    ) -> SinkResult<()> {
        self.results
            .write()
            .await
            .entry(tournament.to_string())
            .or_default()
            .ledger
            .record(alias, round, choice);
        Ok(())
    }

    async fn write_summary(&self, summary: &TournamentSummary) -> SinkResult<()> {
        self.results
            .write()
            .await
            .entry(summary.tournament.clone())
            .or_default()
            .summary = Some(summary.clone());
        Ok(())
    }

    async fn clear(&self, tournament: &str) -> SinkResult<()> {
        self.results.write().await.remove(tournament);
        Ok(())
    }

    async fn results(&self, tournament: &str) -> SinkResult<TournamentResults> {
        Ok(self
            .results
            .read()
            .await
            .get(tournament)
            .cloned()
            .unwrap_or_default())
    }
}

/// `<dir>/<name>.results.json`, rewritten on every change
#[derive(Debug)]
pub struct JsonFileResultsSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileResultsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, tournament: &str) -> PathBuf {
        self.dir.join(format!("{}.results.json", tournament))
    }

    async fn read(&self, tournament: &str) -> SinkResult<TournamentResults> {
        match tokio::fs::read_to_string(self.path_for(tournament)).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| SinkError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TournamentResults::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, tournament: &str, results: &TournamentResults) -> SinkResult<()> {
        let raw = serde_json::to_string_pretty(results)
            .map_err(|e| SinkError::Serialize(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(tournament);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultsSink for JsonFileResultsSink {
    async fn record_vote(
        &self,
        tournament: &str,
        alias: &str,
        round: usize,
        choice: &str,
    ) -> SinkResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut results = self.read(tournament).await?;
        results.ledger.record(alias, round, choice);
        self.write(tournament, &results).await
    }

    async fn write_summary(&self, summary: &TournamentSummary) -> SinkResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut results = self.read(&summary.tournament).await?;
        results.summary = Some(summary.clone());
        self.write(&summary.tournament, &results).await
    }

    async fn clear(&self, tournament: &str) -> SinkResult<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(tournament)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn results(&self, tournament: &str) -> SinkResult<TournamentResults> {
        let _guard = self.write_lock.lock().await;
        self.read(tournament).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Matchup;

    #[test]
    fn test_ledger_joins_same_round_choices() {
        let mut ledger = VoteLedger::default();
        ledger.record("Brave Red Fox", 1, "Pizza");
        ledger.record("Brave Red Fox", 1, "Tacos");
        ledger.record("Brave Red Fox", 2, "Pizza");

        assert_eq!(ledger.cell("Brave Red Fox", 1), Some("Pizza, Tacos"));
        assert_eq!(ledger.cell("Brave Red Fox", 2), Some("Pizza"));
        assert_eq!(ledger.cell("Brave Red Fox", 3), None);
    }

    #[test]
    fn test_summary_lists_every_matchup() {
        let a = Prompt::new("A");
        let b = Prompt::new("B");
        let c = Prompt::new("C");
        let mut first = Matchup::pair(a.clone(), b, "A1".into(), "B1".into());
        first.votes_a = 3;
        first.votes_b = 2;
        first.winner = Some(a.clone());
        let mut last = Matchup::pair(a.clone(), c.clone(), "A1_R2".into(), "B1_R2".into());
        last.winner = Some(a.clone());

        let state = TournamentState {
            bracket: vec![vec![first, Matchup::bye(c, "A2".into())], vec![last]],
            ..TournamentState::new()
        };
        let summary = TournamentSummary::from_state("t", &state, a, Utc::now());

        assert_eq!(summary.matchups.len(), 3);
        assert_eq!(summary.matchups[0].votes_a, 3);
        assert_eq!(summary.matchups[1].prompt_b, "BYE (Auto-Win)");
        assert_eq!(summary.matchups[2].round, 2);
        assert_eq!(summary.champion.text, "A");
    }

    #[tokio::test]
    async fn test_memory_sink_clear_is_per_tournament() {
        let sink = MemoryResultsSink::new();
        sink.record_vote("one", "x", 1, "A").await.unwrap();
        sink.record_vote("two", "x", 1, "B").await.unwrap();

        sink.clear("one").await.unwrap();
        assert!(sink.results("one").await.unwrap().ledger.rows.is_empty());
        assert_eq!(
            sink.results("two").await.unwrap().ledger.cell("x", 1),
            Some("B")
        );
    }

    #[tokio::test]
    async fn test_file_sink_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileResultsSink::new(dir.path());
        sink.record_vote("t", "Calm Blue Owl", 1, "Pizza").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["t.results.json".to_string()]);
    }

    #[tokio::test]
    async fn test_file_sink_reads_during_writes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = std::sync::Arc::new(JsonFileResultsSink::new(dir.path()));

        let writer = {
            let sink = sink.clone();
            tokio::spawn(async move {
                for round in 1..=50 {
                    sink.record_vote("t", "Calm Blue Owl", round, "Pizza")
                        .await
                        .unwrap();
                }
            })
        };
        for _ in 0..50 {
            sink.results("t").await.unwrap();
        }
        writer.await.unwrap();

        let results = sink.results("t").await.unwrap();
        assert_eq!(results.ledger.rows["Calm Blue Owl"].len(), 50);
    }

    #[tokio::test]
    async fn test_file_sink_persists_ledger_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileResultsSink::new(dir.path());

        sink.record_vote("t", "Calm Blue Owl", 1, "Pizza").await.unwrap();
        sink.record_vote("t", "Calm Blue Owl", 1, "Tacos").await.unwrap();
        let summary = TournamentSummary {
            tournament: "t".to_string(),
            champion: Prompt::new("Pizza"),
            finished_at: Utc::now(),
            matchups: Vec::new(),
        };
        sink.write_summary(&summary).await.unwrap();

        let reopened = JsonFileResultsSink::new(dir.path());
        let results = reopened.results("t").await.unwrap();
        assert_eq!(results.ledger.cell("Calm Blue Owl", 1), Some("Pizza, Tacos"));
        assert_eq!(results.summary, Some(summary));

        reopened.clear("t").await.unwrap();
        assert_eq!(reopened.results("t").await.unwrap(), TournamentResults::default());
    }
}
