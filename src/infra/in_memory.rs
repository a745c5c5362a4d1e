//! In-memory port implementations for development and testing.

use crate::app::ports::{AnnotatedListPort, CandidateSourcePort, MatchingOraclePort};
use crate::error::{Result, SyncError};
use crate::types::{
    AnnotatedEntry, CandidateRecord, CreatedEntry, MatchDecision, NewAnnotatedEntry,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Annotated list held in memory. Created entries become visible to the next
/// `fetch_all`, like the remote service.
#[derive(Default)]
pub struct InMemoryAnnotatedList {
    entries: Mutex<Vec<AnnotatedEntry>>,
    remote_conflicts: Mutex<HashSet<String>>,
    failing_keys: Mutex<HashSet<String>>,
    fetch_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemoryAnnotatedList {
    pub fn new(entries: Vec<AnnotatedEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Answer "already exists" for this key, as if another curator added it
    /// after our snapshot was taken
    pub fn with_remote_conflict(self, key: &str) -> Self {
        lock(&self.remote_conflicts).insert(key.to_string());
        self
    }

    /// Reject creation of this key with a server error
    pub fn with_create_failure(self, key: &str) -> Self {
        lock(&self.failing_keys).insert(key.to_string());
        self
    }

    pub fn entries(&self) -> Vec<AnnotatedEntry> {
        lock(&self.entries).clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnotatedListPort for InMemoryAnnotatedList {
    async fn fetch_all(&self) -> Result<Vec<AnnotatedEntry>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries())
    }

    async fn create(&self, entry: &NewAnnotatedEntry) -> Result<CreatedEntry> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let key = entry.identity_key();

        if lock(&self.remote_conflicts).contains(&key) {
            return Err(SyncError::AlreadyExists { key });
        }
        if lock(&self.failing_keys).contains(&key) {
            return Err(SyncError::CreateFailed {
                status: 500,
                message: format!("rejected {key}"),
            });
        }

        let mut entries = lock(&self.entries);
        let id = entries.len() + 1;
        entries.push(AnnotatedEntry {
            id: Some(serde_json::Value::from(id)),
            scientific_name: Some(entry.scientific_name.clone()),
            scientific_name_authorship: entry.scientific_name_authorship.clone(),
        });
        debug!("Created in-memory annotated entry {} with id {}", key, id);

        Ok(CreatedEntry {
            remote_id: Some(id.to_string()),
        })
    }
}

/// Oracle answering from a fixed table of names. Unknown names get
/// `default_decision`.
pub struct StaticOracle {
    decisions: HashMap<String, MatchDecision>,
    default_decision: MatchDecision,
    calls: Mutex<Vec<String>>,
}

impl StaticOracle {
    pub fn new(default_decision: MatchDecision) -> Self {
        Self {
            decisions: HashMap::new(),
            default_decision,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_decision(mut self, name: &str, decision: MatchDecision) -> Self {
        self.decisions.insert(name.to_string(), decision);
        self
    }

    /// Names looked up, in call order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl MatchingOraclePort for StaticOracle {
    async fn is_authority_resolved(&self, name: &str, _authorship: Option<&str>) -> MatchDecision {
        lock(&self.calls).push(name.to_string());
        self.decisions
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_decision.clone())
    }
}

/// Candidate source over a fixed, already ordered list
pub struct StaticCandidateSource {
    candidates: Vec<CandidateRecord>,
}

impl StaticCandidateSource {
    pub fn new(candidates: Vec<CandidateRecord>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSourcePort for StaticCandidateSource {
    async fn list_candidates(&self) -> Result<Vec<CandidateRecord>> {
        Ok(self.candidates.clone())
    }
}
