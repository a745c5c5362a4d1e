pub mod candidate_cache;
pub mod candidate_source;
pub mod http_client;
pub mod in_memory;
pub mod rate_limiter;
pub mod row_source;
pub mod vliz_client;
pub mod worms_oracle;
