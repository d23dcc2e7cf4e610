//! Subtitle document retrieval.

use std::io::Read;

const SUBTITLE_USER_AGENT: &str = concat!("cast-receiver/", env!("CARGO_PKG_VERSION"));

/// Fetches a text document. Implementations may block; callers run them off
/// the dispatch loop.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, String>;
}

/// HTTP fetcher backed by a shared `ureq` agent. No timeout is applied here;
/// a stalled fetch only delays its own result.
pub struct HttpDocumentFetcher {
    http_client: ureq::Agent,
}

impl HttpDocumentFetcher {
    pub fn new() -> Self {
        Self {
            http_client: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .http_client
            .get(url)
            .set("User-Agent", SUBTITLE_USER_AGENT)
            .set("Accept", "text/vtt, text/plain;q=0.9, */*;q=0.5")
            .call()
            .map_err(|error| format!("Request failed: {error}"))?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|error| format!("Failed to read response: {error}"))?;
        Ok(body)
    }
}
