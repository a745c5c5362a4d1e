use crate::config::HttpConfig;
use crate::error::Result;
use std::time::Duration;

/// Shared client for the oracle and the annotated list.
///
/// Redirects are not followed: the annotated list answers a duplicate
/// creation with `303 See Other`, which must reach the adapter as-is.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Body of a failed response, shortened for error messages
pub async fn error_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 500 {
        let mut cut = 500;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
