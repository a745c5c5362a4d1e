use crate::app::sync_use_case::RunOptions;
use crate::error::Result;
use crate::types::SyncOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Outcome of one evaluated candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub key: String,
    pub scientific_name: String,
    pub scientific_name_authorship: Option<String>,
    pub outcome: SyncOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate result of a reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub max_items: Option<u32>,
    pub existing_entries: usize,
    pub candidates_total: usize,
    pub entries: Vec<ReportEntry>,
    /// Candidates left untouched once the budget ran out
    pub unevaluated: usize,
    pub budget_exhausted: bool,
}

impl SyncReport {
    pub fn new(options: RunOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run: options.dry_run,
            max_items: options.max_items,
            existing_entries: 0,
            candidates_total: 0,
            entries: Vec::new(),
            unevaluated: 0,
            budget_exhausted: false,
        }
    }

    pub fn record(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn halt_on_budget(&mut self, unevaluated: usize) {
        self.budget_exhausted = true;
        self.unevaluated = unevaluated;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, outcome: SyncOutcome) -> usize {
        if outcome == SyncOutcome::SkippedBudgetExhausted {
            return self.unevaluated;
        }
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// Per-outcome counts. Unevaluated candidates appear as
    /// `SkippedBudgetExhausted`.
    pub fn tally(&self) -> BTreeMap<SyncOutcome, usize> {
        let mut tally = BTreeMap::new();
        for entry in &self.entries {
            *tally.entry(entry.outcome).or_insert(0) += 1;
        }
        if self.unevaluated > 0 {
            tally.insert(SyncOutcome::SkippedBudgetExhausted, self.unevaluated);
        }
        tally
    }

    /// Keys that were created (or would have been, in a dry run)
    pub fn created(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.outcome == SyncOutcome::Created)
            .map(|e| e.key.as_str())
            .collect()
    }

    /// Persist the report as pretty JSON, returning the written path
    pub fn write_json(&self, output_dir: &Path) -> Result<String> {
        fs::create_dir_all(output_dir)?;

        let timestamp = self.started_at.format("%Y%m%d_%H%M%S");
        let filename = format!("names_sync_{timestamp}.json");
        let filepath = output_dir.join(filename);

        let json_content = serde_json::to_string_pretty(self)?;
        fs::write(&filepath, json_content)?;

        Ok(filepath.to_string_lossy().to_string())
    }
}
