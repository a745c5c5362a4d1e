//! Matching oracle backed by the WoRMS `AphiaRecordsByMatchNames` REST call.

use crate::app::ports::MatchingOraclePort;
use crate::constants::EXACT_MATCH_TYPE;
use crate::error::{Result, SyncError};
use crate::infra::http_client::error_body;
use crate::infra::rate_limiter::RateLimiter;
use crate::types::{LookupFailure, MatchDecision};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

/// One candidate authority record in a match group
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AphiaMatch {
    #[serde(rename = "AphiaID", default)]
    pub aphia_id: Option<i64>,
    #[serde(default)]
    pub scientificname: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub match_type: Option<String>,
}

/// Response body: one group per submitted name. A group is `null` when the
/// name matched nothing.
pub type MatchGroups = Vec<Option<Vec<AphiaMatch>>>;

pub struct WormsOracle {
    client: reqwest::Client,
    endpoint: String,
    limiter: RateLimiter,
}

impl WormsOracle {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            limiter: RateLimiter::unlimited(),
        }
    }

    pub fn with_rate_limit(mut self, requests_per_min: Option<u64>) -> Self {
        self.limiter = RateLimiter::per_minute(requests_per_min);
        self
    }

    /// Lookup URL for one name. The name is percent-encoded exactly once and
    /// the search is never restricted to marine taxa.
    pub fn match_names_url(&self, name: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/AphiaRecordsByMatchNames", self.endpoint),
            &[("scientificnames[]", name), ("marine_only", "false")],
        )
        .map_err(|e| SyncError::Lookup(format!("invalid oracle URL: {e}")))
    }

    /// Raw match groups for `name`; `None` when the oracle has nothing
    #[instrument(skip(self))]
    pub async fn fetch_match_groups(&self, name: &str) -> Result<Option<MatchGroups>> {
        let url = self.match_names_url(name)?;
        self.limiter.acquire().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("No authority records for {}", name);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::Lookup(format!(
                "status {}: {}",
                status.as_u16(),
                error_body(response).await
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let groups: Option<MatchGroups> = serde_json::from_str(&body)?;
        Ok(groups)
    }
}

/// Decide whether a name resolves without curation.
///
/// More than one group for a single name breaks the oracle's contract and is
/// reported as such. Within the group, any entry with match type `exact`
/// qualifies when `authorship` is absent or equals the entry's authority
/// string exactly (no trimming or case folding).
pub fn evaluate_match_groups(groups: Option<MatchGroups>, authorship: Option<&str>) -> MatchDecision {
    let groups = match groups {
        Some(groups) => groups,
        None => return MatchDecision::NoMatch,
    };
    if groups.len() > 1 {
        return MatchDecision::LookupFailed(LookupFailure::ContractViolation {
            groups: groups.len(),
        });
    }

    let exact = groups
        .into_iter()
        .flatten()
        .flatten()
        .any(|entry| {
            entry.match_type.as_deref() == Some(EXACT_MATCH_TYPE)
                && authorship.map_or(true, |a| entry.authority.as_deref() == Some(a))
        });

    if exact {
        MatchDecision::ExactMatch
    } else {
        MatchDecision::NoMatch
    }
}

#[async_trait]
impl MatchingOraclePort for WormsOracle {
    async fn is_authority_resolved(&self, name: &str, authorship: Option<&str>) -> MatchDecision {
        match self.fetch_match_groups(name).await {
            Ok(groups) => evaluate_match_groups(groups, authorship),
            Err(e) => MatchDecision::LookupFailed(LookupFailure::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(match_type: &str, authority: Option<&str>) -> AphiaMatch {
        AphiaMatch {
            aphia_id: Some(141433),
            scientificname: Some("Abra alba".to_string()),
            authority: authority.map(str::to_string),
            match_type: Some(match_type.to_string()),
        }
    }

    #[test]
    fn absent_response_is_no_match() {
        assert_eq!(evaluate_match_groups(None, None), MatchDecision::NoMatch);
        assert_eq!(evaluate_match_groups(Some(vec![]), None), MatchDecision::NoMatch);
        assert_eq!(evaluate_match_groups(Some(vec![None]), None), MatchDecision::NoMatch);
    }

    #[test]
    fn exact_match_without_authorship() {
        let groups = vec![Some(vec![entry("phonetic", None), entry("exact", Some("(W. Wood, 1802)"))])];
        assert_eq!(evaluate_match_groups(Some(groups), None), MatchDecision::ExactMatch);
    }

    #[test]
    fn authorship_must_equal_authority_exactly() {
        let groups = || vec![Some(vec![entry("exact", Some("(W. Wood, 1802)"))])];
        assert_eq!(
            evaluate_match_groups(Some(groups()), Some("(W. Wood, 1802)")),
            MatchDecision::ExactMatch
        );
        assert_eq!(
            evaluate_match_groups(Some(groups()), Some("(W.Wood, 1802)")),
            MatchDecision::NoMatch
        );
        assert_eq!(
            evaluate_match_groups(Some(groups()), Some("(w. wood, 1802)")),
            MatchDecision::NoMatch
        );
        assert_eq!(
            evaluate_match_groups(Some(groups()), Some("(W. Wood, 1802) ")),
            MatchDecision::NoMatch
        );
    }

    #[test]
    fn non_exact_match_types_do_not_resolve() {
        let groups = vec![Some(vec![entry("exact_genus", None), entry("near_1", None)])];
        assert_eq!(evaluate_match_groups(Some(groups), None), MatchDecision::NoMatch);
    }

    #[test]
    fn missing_authority_never_equals_given_authorship() {
        let groups = vec![Some(vec![entry("exact", None)])];
        assert_eq!(evaluate_match_groups(Some(groups), Some("L.")), MatchDecision::NoMatch);
    }

    #[test]
    fn multiple_groups_violate_the_contract() {
        let groups = vec![Some(vec![entry("exact", None)]), Some(vec![entry("exact", None)])];
        assert_eq!(
            evaluate_match_groups(Some(groups), None),
            MatchDecision::LookupFailed(LookupFailure::ContractViolation { groups: 2 })
        );
    }

    #[test]
    fn url_escapes_the_name_once() {
        let oracle = WormsOracle::new(reqwest::Client::new(), "https://www.marinespecies.org/rest/");
        let url = oracle.match_names_url("Abra alba & co").unwrap();
        assert_eq!(url.path(), "/rest/AphiaRecordsByMatchNames");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("scientificnames[]".to_string(), "Abra alba & co".to_string()),
                ("marine_only".to_string(), "false".to_string()),
            ]
        );
        assert!(!url.as_str().contains("%2520"));
    }
}
