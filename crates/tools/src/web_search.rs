//! Web search tool — returns deterministic offline results.
//!
//! In production this would call a real search API (Brave, Google, etc.).
//! The offline results are plausible enough to exercise the agent loop
//! end-to-end without network access.

use async_trait::async_trait;
use serde::Serialize;

use ferrite_core::error::ToolError;
use ferrite_core::schema::ParamSpec;
use ferrite_core::tool::{Tool, ToolContext};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("query").describe("The search query").required(),
            ParamSpec::integer("num_results")
                .describe("Number of results to return")
                .min(1.0)
                .max(5.0)
                .default_value(serde_json::json!(3)),
        ]
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let count = arguments["num_results"].as_u64().unwrap_or(3).min(5) as usize;

        let results = results_for(query, count);
        serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: title.into(),
        url: url.into(),
        snippet: snippet.into(),
    }
}

fn results_for(query: &str, count: usize) -> Vec<SearchHit> {
    let lowered = query.to_lowercase();

    let canned: &[(&str, fn() -> Vec<SearchHit>)] = &[
        ("rust", || {
            vec![
                hit(
                    "The Rust Programming Language",
                    "https://doc.rust-lang.org/book/",
                    "Rust is a systems programming language focused on safety, speed, and concurrency.",
                ),
                hit(
                    "Rust by Example",
                    "https://doc.rust-lang.org/rust-by-example/",
                    "Runnable examples illustrating Rust concepts and standard library usage.",
                ),
                hit(
                    "crates.io: Rust Package Registry",
                    "https://crates.io/",
                    "The Rust community's crate registry.",
                ),
            ]
        }),
        ("weather", || {
            vec![
                hit(
                    "National Weather Service",
                    "https://weather.gov/",
                    "Current conditions and forecasts across the United States.",
                ),
                hit(
                    "OpenWeatherMap",
                    "https://openweathermap.org/",
                    "Free weather API with current data and forecasts for any location.",
                ),
            ]
        }),
    ];

    for (keyword, build) in canned {
        if lowered.contains(keyword) {
            let mut hits = build();
            hits.truncate(count);
            return hits;
        }
    }

    (1..=count)
        .map(|i| SearchHit {
            title: format!("Result {i} for: {query}"),
            url: format!("https://example.com/search?q={}&p={i}", query.replace(' ', "+")),
            snippet: format!("Placeholder result for the query '{query}'."),
        })
        .collect()
}
