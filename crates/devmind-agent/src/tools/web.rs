//! Web search tool.
//!
//! The tool formats results; fetching them is delegated to a [`WebSearcher`]
//! so tests can substitute canned results for live HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::tool::{ToolResult, WebSearchParams};

/// Results returned to the model unless configured otherwise.
pub const DEFAULT_MAX_RESULTS: usize = 5;

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("devmind/", env!("CARGO_PKG_VERSION"));

// ─────────────────────────────────────────────────────────────────────────────
// Search Results & Searchers
// ─────────────────────────────────────────────────────────────────────────────

/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// Something that can run a web search.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Return at most `max_results` results for `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// A searcher that can be shared across threads.
pub type SharedSearcher = Arc<dyn WebSearcher>;

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SearchProvider {
    /// Brave Search API
    Brave { api_key: String },
    /// Serper (Google Search API)
    Serper { api_key: String },
    /// Tavily Search API
    Tavily { api_key: String },
    /// DuckDuckGo HTML results (no API key needed)
    DuckDuckGo,
}

impl SearchProvider {
    /// Resolve a provider from its configured name.
    pub fn from_name(name: &str, api_key: Option<String>) -> Result<Self> {
        let key = |provider: &str| {
            api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AgentError::config(format!("{} search requires an API key", provider)))
        };

        match name.to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "brave" => Ok(Self::Brave { api_key: key("brave")? }),
            "serper" => Ok(Self::Serper { api_key: key("serper")? }),
            "tavily" => Ok(Self::Tavily { api_key: key("tavily")? }),
            other => Err(AgentError::config(format!("Unknown search provider: {}", other))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Brave { .. } => "brave",
            Self::Serper { .. } => "serper",
            Self::Tavily { .. } => "tavily",
            Self::DuckDuckGo => "duckduckgo",
        }
    }
}

/// Live HTTP searcher.
#[derive(Debug, Clone)]
pub struct HttpSearcher {
    client: Client,
    provider: SearchProvider,
}

impl HttpSearcher {
    /// Create a searcher for `provider`.
    pub fn new(provider: SearchProvider) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, provider })
    }

    /// DuckDuckGo searcher.
    pub fn duckduckgo() -> Result<Self> {
        Self::new(SearchProvider::DuckDuckGo)
    }

    async fn fetch_json(&self, request: reqwest::RequestBuilder, provider: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Tool(format!("{} search failed: {}", provider, e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Tool(format!(
                "{} search error: {}",
                provider,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::Tool(format!("Failed to parse response: {}", e)))
    }

    async fn search_brave(&self, query: &str, api_key: &str, max: usize) -> Result<Vec<SearchResult>> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            max
        );
        let request = self
            .client
            .get(&url)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json");
        let data = self.fetch_json(request, "Brave").await?;
        Ok(collect_results(&data["web"]["results"], "url", "description"))
    }

    async fn search_serper(&self, query: &str, api_key: &str, max: usize) -> Result<Vec<SearchResult>> {
        let request = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", api_key)
            .json(&json!({ "q": query, "num": max }));
        let data = self.fetch_json(request, "Serper").await?;
        Ok(collect_results(&data["organic"], "link", "snippet"))
    }

    async fn search_tavily(&self, query: &str, api_key: &str, max: usize) -> Result<Vec<SearchResult>> {
        let request = self.client.post("https://api.tavily.com/search").json(&json!({
            "api_key": api_key,
            "query": query,
            "max_results": max
        }));
        let data = self.fetch_json(request, "Tavily").await?;
        Ok(collect_results(&data["results"], "url", "content"))
    }

    async fn search_duckduckgo(&self, query: &str, max: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .post(DUCKDUCKGO_HTML_URL)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| AgentError::Tool(format!("DuckDuckGo search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AgentError::Tool(format!(
                "DuckDuckGo search error: {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AgentError::Tool(format!("Failed to read response: {}", e)))?;
        parse_duckduckgo_html(&html, max)
    }
}

#[async_trait]
impl WebSearcher for HttpSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let mut results = match &self.provider {
            SearchProvider::Brave { api_key } => self.search_brave(query, api_key, max_results).await?,
            SearchProvider::Serper { api_key } => self.search_serper(query, api_key, max_results).await?,
            SearchProvider::Tavily { api_key } => self.search_tavily(query, api_key, max_results).await?,
            SearchProvider::DuckDuckGo => self.search_duckduckgo(query, max_results).await?,
        };
        results.truncate(max_results);
        Ok(results)
    }

    fn name(&self) -> &str {
        self.provider.label()
    }
}

fn collect_results(items: &Value, url_field: &str, content_field: &str) -> Vec<SearchResult> {
    items
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    Some(SearchResult::new(
                        r["title"].as_str()?,
                        r[url_field].as_str()?,
                        r[content_field].as_str().unwrap_or(""),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AgentError::internal(format!("Invalid selector '{}': {}", css, e)))
}

/// Extract organic results from a DuckDuckGo HTML results page.
fn parse_duckduckgo_html(html: &str, max: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();
    for node in document.select(&result_sel) {
        if results.len() >= max {
            break;
        }
        // Sponsored entries carry this class
        if node.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = node.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let title = collapse_whitespace(&link.text().collect::<String>());
        let content = node
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult::new(title, resolve_duckduckgo_href(href), content));
    }
    Ok(results)
}

/// Unwrap DuckDuckGo's `/l/?uddg=<target>` redirect links.
fn resolve_duckduckgo_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Searcher that returns canned results, for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticSearcher {
    results: Vec<SearchResult>,
    error: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearcher {
    /// Always return `results`.
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Always return nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Always fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WebSearcher for StaticSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().push(query.to_string());
        if let Some(message) = &self.error {
            return Err(AgentError::Tool(message.clone()));
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web Search Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for searching the web.
#[derive(Clone)]
pub struct WebSearchTool {
    searcher: SharedSearcher,
    max_results: usize,
}

impl std::fmt::Debug for WebSearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchTool")
            .field("searcher", &self.searcher.name())
            .field("max_results", &self.max_results)
            .finish()
    }
}

impl WebSearchTool {
    pub const NAME: &'static str = "web_search";
    pub const DESCRIPTION: &'static str = "Search the internet for up-to-date information, libraries, or errors.";

    /// Create a tool backed by `searcher`.
    pub fn new(searcher: SharedSearcher) -> Self {
        Self {
            searcher,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set maximum number of results.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                }
            },
            "required": ["query"]
        })
    }

    pub async fn execute(&self, params: WebSearchParams) -> Result<ToolResult> {
        match self.searcher.search(&params.query, self.max_results).await {
            Ok(results) if results.is_empty() => Ok(ToolResult::text("No results found on the web.")),
            Ok(results) => {
                tracing::debug!(
                    searcher = self.searcher.name(),
                    count = results.len(),
                    "Web search returned results"
                );
                Ok(ToolResult::text(format_results(&results, self.max_results)))
            }
            Err(e) => Ok(ToolResult::error(format!("Error performing web search: {}", e))),
        }
    }
}

fn format_results(results: &[SearchResult], max: usize) -> String {
    results
        .iter()
        .take(max)
        .map(|r| format!("Title: {}\nURL: {}\nContent: {}", r.title, r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
