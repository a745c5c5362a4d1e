/// Default creation budget for one run
pub const DEFAULT_MAX_ITEMS: u32 = 10;

/// Annotated list page size
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Freshness window of the cached candidate list (one day)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Cache key prefix of the candidate list
pub const CANDIDATE_CACHE_NAME: &str = "non_matching";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str = concat!("names-sync/", env!("CARGO_PKG_VERSION"));

/// WoRMS REST base
pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://www.marinespecies.org/rest";

/// Status the annotated list answers with when an entry already exists
pub const ALREADY_EXISTS_STATUS: u16 = 303;

/// Match type the oracle reports for exact name matches
pub const EXACT_MATCH_TYPE: &str = "exact";

pub const ANNOTATED_LISTS_PATH: &str = "annotated_lists";
