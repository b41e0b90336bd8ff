//! Persisted snapshot records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::transcript::{Transcript, Turn, TurnRole};

/// Full transcript snapshot taken after one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Groups records written by the same run; empty for stores that predate it
    #[serde(default)]
    pub run_id: String,
    pub iteration: u32,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub user_prompt: String,
    /// Older stores name this `conversation_history`
    #[serde(alias = "conversation_history", deserialize_with = "deserialize_turns")]
    pub transcript: Vec<Turn>,
}

/// RFC 3339, or a naive ISO 8601 timestamp read as UTC
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
}

/// Turns without an `index` are numbered by position; empty reasoning becomes `None`
fn deserialize_turns<'de, D>(deserializer: D) -> Result<Vec<Turn>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut turns = Vec::<Turn>::deserialize(deserializer)?;
    for (position, turn) in turns.iter_mut().enumerate() {
        if turn.index == 0 {
            turn.index = position as u32 + 1;
        }
        if turn.reasoning.as_deref() == Some("") {
            turn.reasoning = None;
        }
    }
    Ok(turns)
}

impl RunRecord {
    /// Snapshot `transcript` as it stands now
    pub fn new(run_id: impl Into<String>, iteration: u32, transcript: &Transcript) -> Self {
        Self {
            run_id: run_id.into(),
            iteration,
            timestamp: Utc::now(),
            user_prompt: transcript.user_prompt().to_string(),
            transcript: transcript.snapshot(),
        }
    }

    /// The newest turn in this snapshot
    pub fn latest_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }
}

/// New run identifier: UTC start time with millisecond precision
pub fn generate_run_id() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Per-run rollup of a store's records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub user_prompt: String,
    pub records: usize,
    pub last_iteration: u32,
    pub critiques: usize,
    pub started: DateTime<Utc>,
}

/// Group records by run, in the order each run first appears
pub fn summarize_runs(records: &[RunRecord]) -> Vec<RunSummary> {
    let mut summaries: Vec<RunSummary> = Vec::new();

    for record in records {
        let critiques = record
            .transcript
            .iter()
            .filter(|t| t.role == TurnRole::Critic)
            .count();

        match summaries.iter_mut().find(|s| s.run_id == record.run_id) {
            Some(summary) => {
                summary.records += 1;
                summary.last_iteration = summary.last_iteration.max(record.iteration);
                summary.critiques = summary.critiques.max(critiques);
            }
            None => summaries.push(RunSummary {
                run_id: record.run_id.clone(),
                user_prompt: record.user_prompt.clone(),
                records: 1,
                last_iteration: record.iteration,
                critiques,
                started: record.timestamp,
            }),
        }
    }

    summaries
}
