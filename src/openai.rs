//! HTTP and OpenAI-compatible client construction.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Build the shared HTTP client.
///
/// `None` keeps reqwest's default, which has no overall request timeout.
pub fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Create an OpenAI-compatible client pointed at `api_base`.
pub fn create_client(
    api_base: &str,
    api_key: &str,
    timeout: Option<Duration>,
) -> Result<Client<OpenAIConfig>> {
    let config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client(timeout)?))
}
