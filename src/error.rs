use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid source row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Failed to fetch annotated list page {page} (status {status}): {message}")]
    ListFetch {
        page: u32,
        status: u16,
        message: String,
    },

    #[error("Entry {key} already exists in the annotated list")]
    AlreadyExists { key: String },

    #[error("Failed to create annotated list entry (status {status}): {message}")]
    CreateFailed { status: u16, message: String },

    #[error("Matching oracle lookup failed: {0}")]
    Lookup(String),
}

impl SyncError {
    /// Errors that leave no safe state to continue a run from.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::AlreadyExists { .. }
                | SyncError::CreateFailed { .. }
                | SyncError::Lookup(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_errors_are_not_fatal() {
        assert!(!SyncError::AlreadyExists { key: "a|b".into() }.is_fatal());
        assert!(!SyncError::CreateFailed { status: 500, message: String::new() }.is_fatal());
        assert!(!SyncError::Lookup("timeout".into()).is_fatal());
    }

    #[test]
    fn run_level_errors_are_fatal() {
        assert!(SyncError::Authentication { status: 401, message: "expired".into() }.is_fatal());
        assert!(SyncError::ListFetch { page: 3, status: 502, message: String::new() }.is_fatal());
        assert!(SyncError::Config("missing list endpoint".into()).is_fatal());
    }
}
