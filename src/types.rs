use crate::key::identity_key;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dataset contributing records to a candidate name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    #[serde(rename = "uuid")]
    pub id: String,
    pub url: String,
}

/// One aggregated group of occurrence records whose name has no authority link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub scientific_name: String,
    pub scientific_name_authorship: Option<String>,
    pub scientific_name_id: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub record_count: u64,
    /// Ordered by descending contribution
    pub datasets: Vec<DatasetRef>,
}

impl CandidateRecord {
    pub fn identity_key(&self) -> String {
        identity_key(
            Some(&self.scientific_name),
            self.scientific_name_authorship.as_deref(),
        )
    }

    /// Payload submitted to the annotated list when this name needs curation.
    /// Fields are sent as observed, without trimming.
    pub fn to_new_entry(&self) -> NewAnnotatedEntry {
        NewAnnotatedEntry {
            scientific_name: self.scientific_name.clone(),
            scientific_name_authorship: self.scientific_name_authorship.clone(),
            phylum: self.phylum.clone(),
            class: self.class.clone(),
            order: self.order.clone(),
            family: self.family.clone(),
            genus: self.genus.clone(),
            record_count: self.record_count,
            datasets: self.datasets.clone(),
        }
    }
}

/// A row already present in the remote annotated list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedEntry {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub scientific_name_authorship: Option<String>,
}

impl AnnotatedEntry {
    pub fn identity_key(&self) -> String {
        identity_key(
            self.scientific_name.as_deref(),
            self.scientific_name_authorship.as_deref(),
        )
    }
}

/// Body of an annotated list creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotatedEntry {
    pub scientific_name: String,
    pub scientific_name_authorship: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub record_count: u64,
    pub datasets: Vec<DatasetRef>,
}

impl NewAnnotatedEntry {
    pub fn identity_key(&self) -> String {
        identity_key(
            Some(&self.scientific_name),
            self.scientific_name_authorship.as_deref(),
        )
    }
}

/// Result of a successful creation. The remote identity is whatever `id` the
/// service echoes back, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatedEntry {
    pub remote_id: Option<String>,
}

/// Why an authority lookup produced no decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// Transport, status or parse fault
    Transport(String),
    /// The oracle answered with more than one result group for one name
    ContractViolation { groups: usize },
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::Transport(message) => write!(f, "lookup failed: {message}"),
            LookupFailure::ContractViolation { groups } => write!(
                f,
                "oracle contract violation: {groups} result groups for a single name"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    ExactMatch,
    NoMatch,
    LookupFailed(LookupFailure),
}

/// What happened to one candidate during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    SkippedAlreadyListed,
    SkippedHasAuthorityMatch,
    SkippedLookupError,
    Created,
    SkippedAlreadyExistsRemote,
    SkippedCreateFailed,
    SkippedBudgetExhausted,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::SkippedAlreadyListed => "skipped_already_listed",
            SyncOutcome::SkippedHasAuthorityMatch => "skipped_has_authority_match",
            SyncOutcome::SkippedLookupError => "skipped_lookup_error",
            SyncOutcome::Created => "created",
            SyncOutcome::SkippedAlreadyExistsRemote => "skipped_already_exists_remote",
            SyncOutcome::SkippedCreateFailed => "skipped_create_failed",
            SyncOutcome::SkippedBudgetExhausted => "skipped_budget_exhausted",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total record count as delivered by the source: an integer, or a numeric
/// string when the row went through a text export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Integer(i64),
    Text(String),
}

/// One row of the non-matching names query, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    #[serde(default, rename = "scientificname", alias = "scientificName")]
    pub scientific_name: Option<String>,
    #[serde(default, rename = "scientificnameauthorship", alias = "scientificNameAuthorship")]
    pub scientific_name_authorship: Option<String>,
    #[serde(default, rename = "scientificnameid", alias = "scientificNameID")]
    pub scientific_name_id: Option<String>,
    #[serde(default)]
    pub genus: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub phylum: Option<String>,
    #[serde(default)]
    pub records: Option<RawCount>,
    /// `id;url` pairs joined by `|`
    #[serde(default)]
    pub datasets: Option<String>,
}
