use crate::app::ports::{AnnotatedListPort, CandidateSourcePort, MatchingOraclePort};
use crate::constants::DEFAULT_MAX_ITEMS;
use crate::error::{Result, SyncError};
use crate::report::{ReportEntry, SyncReport};
use crate::types::{AnnotatedEntry, CandidateRecord, LookupFailure, MatchDecision, SyncOutcome};
use metrics::{counter, gauge, histogram};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Options for a single reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of creation attempts. `None` is unbounded.
    pub max_items: Option<u32>,
    /// Evaluate and report without writing to the annotated list
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_items: Some(DEFAULT_MAX_ITEMS),
            dry_run: false,
        }
    }
}

/// Remaining creation attempts for a run
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    remaining: Option<u32>,
}

impl Budget {
    pub fn new(max_items: Option<u32>) -> Self {
        Self {
            remaining: max_items,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }
}

/// Identity keys already present in the annotated list. Read-only once built.
#[derive(Debug, Default)]
pub struct ExistingIndex {
    keys: HashSet<String>,
}

impl ExistingIndex {
    pub fn from_entries(entries: &[AnnotatedEntry]) -> Self {
        Self {
            keys: entries.iter().map(AnnotatedEntry::identity_key).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Reconciles candidate names against the annotated list, one candidate at a
/// time in source order.
pub struct SyncUseCase {
    list: Arc<dyn AnnotatedListPort>,
    oracle: Arc<dyn MatchingOraclePort>,
    source: Arc<dyn CandidateSourcePort>,
}

impl SyncUseCase {
    pub fn new(
        list: Arc<dyn AnnotatedListPort>,
        oracle: Arc<dyn MatchingOraclePort>,
        source: Arc<dyn CandidateSourcePort>,
    ) -> Self {
        Self {
            list,
            oracle,
            source,
        }
    }

    /// Run one pass. Only run-level failures (authentication, listing the
    /// annotated list, listing candidates) are returned as errors; partial
    /// progress before such a failure stays applied.
    #[instrument(skip(self), fields(dry_run = options.dry_run, max_items = ?options.max_items))]
    pub async fn run(&self, options: RunOptions) -> Result<SyncReport> {
        let t_run = Instant::now();
        let mut report = SyncReport::new(options);
        counter!("names_sync_runs_total", "dry_run" => options.dry_run.to_string()).increment(1);

        info!("Fetching annotated list");
        let existing = self.list.fetch_all().await?;
        let index = ExistingIndex::from_entries(&existing);
        gauge!("names_sync_existing_entries").set(existing.len() as f64);
        info!(
            "Indexed {} annotated list entries ({} distinct keys)",
            existing.len(),
            index.len()
        );
        report.existing_entries = existing.len();

        info!("Fetching candidate names");
        let candidates = self.source.list_candidates().await?;
        report.candidates_total = candidates.len();
        info!("Evaluating {} candidate names", candidates.len());

        let mut budget = Budget::new(options.max_items);
        if budget.is_exhausted() {
            report.halt_on_budget(candidates.len());
        }

        for (position, candidate) in candidates.iter().enumerate() {
            if report.budget_exhausted {
                break;
            }

            let key = candidate.identity_key();
            let (outcome, detail) = self
                .reconcile(candidate, &key, &index, options.dry_run, &mut budget)
                .await?;
            counter!("names_sync_candidates_total", "outcome" => outcome.as_str()).increment(1);

            report.record(ReportEntry {
                key,
                scientific_name: candidate.scientific_name.clone(),
                scientific_name_authorship: candidate.scientific_name_authorship.clone(),
                outcome,
                detail,
            });

            if budget.is_exhausted() {
                let unevaluated = candidates.len() - position - 1;
                info!("Reached max items, stopping ({} candidates not evaluated)", unevaluated);
                report.halt_on_budget(unevaluated);
            }
        }

        report.finish();
        histogram!("names_sync_run_duration_seconds").record(t_run.elapsed().as_secs_f64());
        info!(
            "Run finished: {} evaluated, {} created, {} not evaluated",
            report.entries.len(),
            report.count(SyncOutcome::Created),
            report.unevaluated
        );
        Ok(report)
    }

    async fn reconcile(
        &self,
        candidate: &CandidateRecord,
        key: &str,
        index: &ExistingIndex,
        dry_run: bool,
        budget: &mut Budget,
    ) -> Result<(SyncOutcome, Option<String>)> {
        if index.contains(key) {
            debug!("Key {} already in annotated list", key);
            return Ok((SyncOutcome::SkippedAlreadyListed, None));
        }

        let decision = self
            .oracle
            .is_authority_resolved(
                &candidate.scientific_name,
                candidate.scientific_name_authorship.as_deref(),
            )
            .await;

        match decision {
            MatchDecision::LookupFailed(failure) => {
                match &failure {
                    LookupFailure::ContractViolation { .. } => {
                        error!(key = %key, "Matching oracle broke its contract: {}", failure)
                    }
                    LookupFailure::Transport(_) => {
                        warn!(key = %key, "Error while querying the matching oracle: {}", failure)
                    }
                }
                return Ok((SyncOutcome::SkippedLookupError, Some(failure.to_string())));
            }
            MatchDecision::ExactMatch => {
                info!("Key {} has exact match in the authority, skipping", key);
                return Ok((SyncOutcome::SkippedHasAuthorityMatch, None));
            }
            MatchDecision::NoMatch => {}
        }

        info!("Trying to add {} to the annotated list", key);
        if dry_run {
            budget.consume();
            info!("Dry run, not adding {}", key);
            return Ok((SyncOutcome::Created, Some("dry run".to_string())));
        }

        match self.list.create(&candidate.to_new_entry()).await {
            Ok(created) => {
                budget.consume();
                info!("Added {} to the annotated list", key);
                Ok((
                    SyncOutcome::Created,
                    created.remote_id.map(|id| format!("remote id {id}")),
                ))
            }
            Err(SyncError::AlreadyExists { .. }) => {
                budget.consume();
                info!("Key {} already exists according to the annotated list API", key);
                Ok((SyncOutcome::SkippedAlreadyExistsRemote, None))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(key = %key, "Failed to add entry to the annotated list: {}", e);
                Ok((SyncOutcome::SkippedCreateFailed, Some(e.to_string())))
            }
        }
    }
}
