//! Sources of raw non-matching name rows.

use crate::app::ports::RowSourcePort;
use crate::config::SourceConfig;
use crate::error::{Result, SyncError};
use crate::types::SourceRow;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Aggregation of occurrence names without an authority link, one row per
/// distinct name/authorship/classification, datasets ordered by contribution
/// and rows by total record count. Occurrences without a dataset row still
/// count and contribute an empty `;` pair.
pub const NON_MATCHING_QUERY: &str = r#"
    with n as (
        select
            coalesce(datasets.id, '') || ';' || coalesce(datasets.url, '') as url,
            occurrence.scientificname as scientificname,
            occurrence.scientificnameauthorship as scientificnameauthorship,
            occurrence.scientificnameid as scientificnameid,
            occurrence.genus as genus,
            occurrence.family as family,
            occurrence."order" as "order",
            occurrence.class as class,
            occurrence.phylum as phylum,
            count(*) as records
        from occurrence
        left join datasets on datasets.id = occurrence.dataset_id
        where occurrence.aphia is null and occurrence.scientificname is not null
        group by 1, 2, 3, 4, 5, 6, 7, 8, 9
    )
    select
        scientificname,
        scientificnameid,
        scientificnameauthorship,
        genus,
        family,
        "order",
        class,
        phylum,
        sum(records) as records,
        group_concat(url, '|') as datasets
    from (select * from n order by records desc)
    group by 1, 2, 3, 4, 5, 6, 7, 8
    order by sum(records) desc
"#;

/// Rows exported as a JSON array, e.g. a dump of the aggregation query
pub struct JsonRowSource {
    path: PathBuf,
}

impl JsonRowSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSourcePort for JsonRowSource {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_rows(&self) -> Result<Vec<SourceRow>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SyncError::Database {
                message: format!("Failed to read rows from '{}': {}", self.path.display(), e),
            }
        })?;
        let rows: Vec<SourceRow> = serde_json::from_str(&content)?;
        info!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Runs the aggregation query against a libSQL database (remote or local file)
#[cfg(feature = "db")]
pub struct LibsqlRowSource {
    dsn: String,
    auth_token: Option<String>,
    query: String,
}

#[cfg(feature = "db")]
impl LibsqlRowSource {
    pub fn new(dsn: &str, auth_token: Option<String>, query: Option<String>) -> Self {
        Self {
            dsn: dsn.to_string(),
            auth_token,
            query: query.unwrap_or_else(|| NON_MATCHING_QUERY.to_string()),
        }
    }

    fn is_remote(&self) -> bool {
        ["libsql://", "https://", "http://", "wss://", "ws://"]
            .iter()
            .any(|scheme| self.dsn.starts_with(scheme))
    }

    async fn open(&self) -> Result<libsql::Database> {
        let db = if self.is_remote() {
            let token = self.auth_token.clone().ok_or_else(|| {
                SyncError::Config("source.auth_token is required for remote libSQL".to_string())
            })?;
            info!("Connecting to libSQL database at {}", self.dsn);
            libsql::Builder::new_remote(self.dsn.clone(), token).build().await
        } else {
            info!("Opening local libSQL database {}", self.dsn);
            libsql::Builder::new_local(&self.dsn).build().await
        };
        db.map_err(|e| SyncError::Database {
            message: format!("Failed to connect to database: {e}"),
        })
    }
}

#[cfg(feature = "db")]
fn json_value(value: libsql::Value) -> serde_json::Value {
    match value {
        libsql::Value::Null => serde_json::Value::Null,
        libsql::Value::Integer(i) => serde_json::Value::from(i),
        // sums come back as reals from some engines
        libsql::Value::Real(f) => serde_json::Value::from(f.round() as i64),
        libsql::Value::Text(s) => serde_json::Value::String(s),
        libsql::Value::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

#[cfg(feature = "db")]
#[async_trait]
impl RowSourcePort for LibsqlRowSource {
    fn describe(&self) -> String {
        format!("libsql:{}", self.dsn)
    }

    #[instrument(skip(self), fields(dsn = %self.dsn))]
    async fn fetch_rows(&self) -> Result<Vec<SourceRow>> {
        let db = self.open().await?;
        let conn = db.connect().map_err(|e| SyncError::Database {
            message: format!("Failed to get database connection: {e}"),
        })?;
        let mut rows = conn
            .query(&self.query, ())
            .await
            .map_err(|e| SyncError::Database {
                message: format!("Non-matching names query failed: {e}"),
            })?;

        let columns: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_lowercase())
            .collect();

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| SyncError::Database {
            message: format!("Failed to read query row: {e}"),
        })? {
            let mut object = serde_json::Map::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get_value(i as i32).map_err(|e| SyncError::Database {
                    message: format!("Failed to read column {column}: {e}"),
                })?;
                object.insert(column.clone(), json_value(value));
            }
            results.push(serde_json::from_value(serde_json::Value::Object(object))?);
        }

        info!("Query returned {} rows", results.len());
        Ok(results)
    }
}

/// Pick the row source for `source.dsn`: `.json` files are read directly,
/// anything else is treated as a libSQL database.
pub fn row_source_from_config(config: &SourceConfig) -> Result<Box<dyn RowSourcePort>> {
    let dsn = config
        .dsn
        .as_deref()
        .ok_or_else(|| SyncError::Config("source.dsn is not set".to_string()))?;

    let is_json = Path::new(dsn)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(Box::new(JsonRowSource::new(dsn)));
    }

    #[cfg(feature = "db")]
    {
        Ok(Box::new(LibsqlRowSource::new(
            dsn,
            config.auth_token.clone(),
            config.query.clone(),
        )))
    }
    #[cfg(not(feature = "db"))]
    {
        Err(SyncError::Config(format!(
            "source '{dsn}' needs the `db` feature; only .json row files are supported in this build"
        )))
    }
}


#[cfg(all(test, feature = "db"))]
mod libsql_tests {
    use super::*;

    async fn seed(path: &Path) {
        let db = libsql::Builder::new_local(path).build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute(
            "create table datasets (id text primary key, url text)",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            r#"create table occurrence (
                dataset_id text, scientificname text, scientificnameauthorship text,
                scientificnameid text, genus text, family text, "order" text,
                class text, phylum text, aphia integer)"#,
            (),
        )
        .await
        .unwrap();
        for (id, url) in [("big", "https://b"), ("mid", "https://m"), ("small", "https://s")] {
            conn.execute("insert into datasets (id, url) values (?1, ?2)", libsql::params![id, url])
                .await
                .unwrap();
        }

        let occurrences = [
            ("small", "Abra nova", 1),
            ("big", "Abra nova", 4),
            ("mid", "Abra nova", 2),
            ("gone", "Orphan name", 1),
        ];
        for (dataset, name, copies) in occurrences {
            for _ in 0..copies {
                conn.execute(
                    "insert into occurrence (dataset_id, scientificname) values (?1, ?2)",
                    libsql::params![dataset, name],
                )
                .await
                .unwrap();
            }
        }
        conn.execute(
            "insert into occurrence (dataset_id, scientificname, aphia) values ('big', 'Abra alba', 141433)",
            (),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn aggregates_local_database_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occurrences.db");
        seed(&path).await;

        let source = LibsqlRowSource::new(path.to_str().unwrap(), None, None);
        let rows = source.fetch_rows().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].scientific_name.as_deref(), Some("Abra nova"));
        assert_eq!(rows[0].records, Some(crate::types::RawCount::Integer(7)));
        assert_eq!(
            rows[0].datasets.as_deref(),
            Some("big;https://b|mid;https://m|small;https://s")
        );
        assert_eq!(rows[1].scientific_name.as_deref(), Some("Orphan name"));
        assert_eq!(rows[1].datasets.as_deref(), Some(";"));
    }

    #[tokio::test]
    async fn remote_dsn_without_token_is_a_config_error() {
        let source = LibsqlRowSource::new("libsql://names.example.org", None, None);
        let err = source.fetch_rows().await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
