use crate::app::ports::{CandidateSourcePort, RowSourcePort};
use crate::constants::CANDIDATE_CACHE_NAME;
use crate::error::{Result, SyncError};
use crate::infra::candidate_cache::CandidateCache;
use crate::types::{CandidateRecord, DatasetRef, RawCount, SourceRow};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Split `id;url|id;url` into dataset references, keeping order. Each part is
/// split on its first `;`; a part without one keeps an empty URL.
pub fn parse_datasets(datasets: &str) -> Vec<DatasetRef> {
    if datasets.trim().is_empty() {
        return Vec::new();
    }
    datasets
        .split('|')
        .map(|part| match part.split_once(';') {
            Some((id, url)) => DatasetRef {
                id: id.to_string(),
                url: url.to_string(),
            },
            None => {
                warn!("Dataset reference without URL: {}", part);
                DatasetRef {
                    id: part.to_string(),
                    url: String::new(),
                }
            }
        })
        .collect()
}

fn parse_count(records: Option<RawCount>, row: usize) -> Result<u64> {
    let invalid = |message: String| SyncError::InvalidRow { row, message };
    match records {
        None => Err(invalid("records is missing".to_string())),
        Some(RawCount::Integer(n)) => {
            u64::try_from(n).map_err(|_| invalid(format!("records is negative: {n}")))
        }
        Some(RawCount::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(format!("records '{text}' is not a count: {e}"))),
    }
}

/// Validate one query row. A missing name becomes the empty string and is
/// otherwise accepted.
pub fn candidate_from_row(row: SourceRow, index: usize) -> Result<CandidateRecord> {
    let record_count = parse_count(row.records, index)?;
    let datasets = row.datasets.as_deref().map(parse_datasets).unwrap_or_default();

    Ok(CandidateRecord {
        scientific_name: row.scientific_name.unwrap_or_default(),
        scientific_name_authorship: row.scientific_name_authorship,
        scientific_name_id: row.scientific_name_id,
        phylum: row.phylum,
        class: row.class,
        order: row.order,
        family: row.family,
        genus: row.genus,
        record_count,
        datasets,
    })
}

/// Candidate names from a row source, optionally served from a cache within a
/// freshness window
pub struct CandidateSourceAdapter {
    rows: Box<dyn RowSourcePort>,
    cache: Option<CandidateCache>,
    freshness: Duration,
    query: Option<String>,
}

impl CandidateSourceAdapter {
    pub fn new(rows: Box<dyn RowSourcePort>) -> Self {
        Self {
            rows,
            cache: None,
            freshness: Duration::ZERO,
            query: None,
        }
    }

    pub fn with_cache(mut self, cache: CandidateCache, freshness: Duration) -> Self {
        self.cache = Some(cache);
        self.freshness = freshness;
        self
    }

    /// Include a query override in the cache key so edited queries miss
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.rows.describe().as_bytes());
        if let Some(query) = &self.query {
            hasher.update(b"\n");
            hasher.update(query.as_bytes());
        }
        format!("{}:{}", CANDIDATE_CACHE_NAME, hex::encode(hasher.finalize()))
    }

    fn cached(&self, cache: &CandidateCache, key: &str) -> Option<Vec<CandidateRecord>> {
        match cache.get(key) {
            Ok(Some(value)) => match serde_json::from_str(&value) {
                Ok(candidates) => Some(candidates),
                Err(e) => {
                    warn!("Ignoring unreadable cached candidates: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Candidate cache read failed: {}", e);
                None
            }
        }
    }

    async fn fetch_fresh(&self) -> Result<Vec<CandidateRecord>> {
        let rows = self.rows.fetch_rows().await?;
        let mut candidates = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| candidate_from_row(row, index))
            .collect::<Result<Vec<_>>>()?;
        // stable, so ties keep source order
        candidates.sort_by(|a, b| b.record_count.cmp(&a.record_count));
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateSourcePort for CandidateSourceAdapter {
    #[instrument(skip(self))]
    async fn list_candidates(&self) -> Result<Vec<CandidateRecord>> {
        let key = self.cache_key();

        if let Some(cache) = &self.cache {
            if let Some(candidates) = self.cached(cache, &key) {
                info!("Fetching non matching names from local cache ({} names)", candidates.len());
                return Ok(candidates);
            }
        }

        info!("Fetching non matching names from {}", self.rows.describe());
        let candidates = self.fetch_fresh().await?;

        if let Some(cache) = &self.cache {
            let stored = serde_json::to_string(&candidates)
                .map_err(SyncError::from)
                .and_then(|value| cache.set(&key, &value, self.freshness));
            if let Err(e) = stored {
                warn!("Candidate cache write failed: {}", e);
            }
        }

        Ok(candidates)
    }
}
