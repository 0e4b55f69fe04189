//! Loading ride exports from a local path or an HTTP(S) URL.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}

/// GETs `url` and returns the body. Non-2xx responses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid export URL '{url}'"))?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("export download from {url} failed with status {status}");
    }
    Ok(resp.bytes().await?.to_vec())
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads an export from a file path or downloads it from a URL.
#[tracing::instrument(skip_all, fields(source = %source))]
pub async fn load_source(source: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(source) {
        fetch_bytes(&BasicClient::new(), source).await?
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("reading export '{source}'"))?
    };
    debug!(bytes = bytes.len(), "Export loaded");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/rides.csv"));
        assert!(is_remote("http://localhost/rides.csv"));
        assert!(!is_remote("data/rides.csv"));
        assert!(!is_remote("httpdata.csv"));
    }

    #[tokio::test]
    async fn test_load_source_reads_file() {
        let path = format!("{}/fleet_planner_test_source.csv", std::env::temp_dir().display());
        std::fs::write(&path, "lat,lng\n1,2\n").unwrap();

        let bytes = load_source(&path).await.unwrap();
        assert_eq!(bytes, b"lat,lng\n1,2\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_source_missing_file_errors() {
        assert!(load_source("/definitely/not/here.csv").await.is_err());
    }
}
