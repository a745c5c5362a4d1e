use crate::error::Result;
use crate::types::{
    AnnotatedEntry, CandidateRecord, CreatedEntry, MatchDecision, NewAnnotatedEntry, SourceRow,
};
use async_trait::async_trait;

/// The remote curated list of reviewed names
#[async_trait]
pub trait AnnotatedListPort: Send + Sync {
    /// Every entry in the list, in retrieval order. Any failure is fatal for
    /// the caller since a partial list would cause duplicate creations.
    async fn fetch_all(&self) -> Result<Vec<AnnotatedEntry>>;

    /// Submit one entry. A conflicting entry is reported as
    /// [`SyncError::AlreadyExists`](crate::error::SyncError::AlreadyExists).
    async fn create(&self, entry: &NewAnnotatedEntry) -> Result<CreatedEntry>;
}

/// Taxonomic authority lookup
#[async_trait]
pub trait MatchingOraclePort: Send + Sync {
    /// Never fails: transport and contract faults come back as
    /// [`MatchDecision::LookupFailed`].
    async fn is_authority_resolved(&self, name: &str, authorship: Option<&str>) -> MatchDecision;
}

/// Ordered candidate names, highest record count first
#[async_trait]
pub trait CandidateSourcePort: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<CandidateRecord>>;
}

/// Raw rows of the non-matching names query
#[async_trait]
pub trait RowSourcePort: Send + Sync {
    /// Stable description of where rows come from, used to key the cache
    fn describe(&self) -> String;

    async fn fetch_rows(&self) -> Result<Vec<SourceRow>>;
}
