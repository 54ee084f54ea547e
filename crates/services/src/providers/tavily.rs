use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;
use crate::providers::openai::{classify_status, classify_transport};
use crate::providers::{SearchHit, SearchProvider};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Web search client backed by the Tavily API.
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: Option<String>,
}

impl TavilySearch {
    /// Read the API key from `TAVILY_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = env::var("TAVILY_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(api_key)
    }

    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::NotConfigured)?;

        let payload = SearchRequest {
            api_key: api_key.clone(),
            query: query.to_string(),
            max_results: k,
        };

        let response = self
            .client
            .post(TAVILY_ENDPOINT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Rejected(format!("malformed response body: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .map(|result| SearchHit {
                title: result.title,
                snippet: result.content,
                url: result.url.and_then(|raw| Url::parse(&raw).ok()),
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    api_key: String,
    query: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    url: Option<String>,
}
