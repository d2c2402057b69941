//! Generative chat-completion client
//!
//! Generic items (anything outside the known-identifier table) are priced
//! by asking an OpenAI-compatible `/chat/completions` endpoint for a strict
//! JSON answer. The answer is parsed into typed structs at the boundary and
//! validated before it becomes a [`TrackResult`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use ta_common::config::GenerativeConfig;
use ta_common::normalize::{backfill_specs, normalize_history};
use ta_common::{PricePoint, TrackResult};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::market_data::resolve_known_id;
use super::price_source::PriceSource;
use crate::error::LookupError;

const TRACK_TEMPERATURE: f32 = 0.1;
const TRACK_MAX_TOKENS: u32 = 1500;

/// Generative client errors
#[derive(Debug, Error)]
pub enum GenerativeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Completion contained no content")]
    EmptyCompletion,
}

impl From<GenerativeError> for LookupError {
    fn from(err: GenerativeError) -> Self {
        match err {
            GenerativeError::NetworkError(_)
            | GenerativeError::Timeout
            | GenerativeError::ApiError(..) => {
                LookupError::UpstreamUnavailable(format!("Generative API unavailable: {}", err))
            }
            GenerativeError::ParseError(_) | GenerativeError::EmptyCompletion => {
                LookupError::MalformedUpstreamResponse(format!("Generative API: {}", err))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completion API client
pub struct GenerativeClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GenerativeClient {
    pub fn new(config: &GenerativeConfig, api_key: String) -> Result<Self, GenerativeError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerativeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Send a single-message prompt and return the trimmed completion text
    pub async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerativeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        debug!(url = %url, model = %self.model, "Sending chat completion");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerativeError::Timeout
                } else {
                    GenerativeError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerativeError::ApiError(status.as_u16(), error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerativeError::ParseError(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerativeError::EmptyCompletion)
    }
}

/// Locate the JSON document inside a completion
///
/// Models sometimes wrap the answer in code fences or a sentence; the
/// outermost `{...}` (or `[...]`) span is taken.
pub fn extract_json(content: &str) -> Option<&str> {
    let open = content.find(|c: char| c == '{' || c == '[')?;
    let close_char = if content[open..].starts_with('{') { '}' } else { ']' };
    let close = content.rfind(close_char)?;
    (close > open).then(|| &content[open..=close])
}

/// Parse a completion as JSON of type `T`
pub fn parse_json_answer<T: DeserializeOwned>(content: &str) -> Result<T, GenerativeError> {
    if let Ok(value) = serde_json::from_str(content.trim()) {
        return Ok(value);
    }
    let candidate = extract_json(content)
        .ok_or_else(|| GenerativeError::ParseError("no JSON document in completion".to_string()))?;
    serde_json::from_str(candidate).map_err(|e| GenerativeError::ParseError(e.to_string()))
}

/// Numeric value that may arrive as a JSON number or numeric string
pub fn lenient_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    }
}

fn spec_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Generic-item answer as returned by the model, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTrack {
    #[serde(default)]
    pub current_price: Option<Value>,
    #[serde(default)]
    pub history: Option<Vec<GeneratedPricePoint>>,
    #[serde(default)]
    pub specs: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedPricePoint {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
}

impl GeneratedTrack {
    /// Validate required fields and backfill optional specs for `slug`
    pub fn into_track_result(self, slug: &str) -> Result<TrackResult, LookupError> {
        let current_price = self
            .current_price
            .as_ref()
            .and_then(lenient_number)
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or_else(|| incomplete("missing or non-positive currentPrice"))?;

        let points: Vec<PricePoint> = self
            .history
            .unwrap_or_default()
            .into_iter()
            .filter_map(|point| {
                let price = point.price.as_ref().and_then(lenient_number)?;
                Some(PricePoint::new(point.date?, price))
            })
            .collect();
        // only dated, finite points count toward a usable history
        let history = normalize_history(points);
        if history.is_empty() {
            return Err(incomplete("empty history"));
        }

        let mut specs: BTreeMap<String, String> = self
            .specs
            .ok_or_else(|| incomplete("missing specs"))?
            .into_iter()
            .filter_map(|(key, value)| spec_value(value).map(|v| (key, v)))
            .collect();
        backfill_specs(&mut specs, slug);

        Ok(TrackResult {
            current_price,
            history,
            specs,
        })
    }
}

fn incomplete(reason: &str) -> LookupError {
    LookupError::IncompleteUpstreamData(format!("Incomplete generative data: {}", reason))
}

/// Prompt for a generic item lookup
pub fn build_track_prompt(item: &str, category: Option<&str>) -> String {
    let is_crypto = category.map_or(false, |c| c.eq_ignore_ascii_case("crypto"))
        || resolve_known_id(item).is_some();
    let category_part = category
        .map(|c| format!(" in category \"{}\"", c))
        .unwrap_or_default();
    let type_part = if is_crypto {
        " (crypto: CoinMarketCap/TradingView for USD + 24h)"
    } else {
        " (non-crypto: eBay/StockX/Wikimedia)"
    };

    format!(
        "For \"{item}\"{category_part}{type_part}: Current avg USD price, 30-day history \
         ({{ \"date\": \"YYYY-MM-DD\", \"price\": number }}). Specs: \"Name\", \"Description\" \
         (200 chars), \"Image URL\" (HTTPS high-res). Output ONLY JSON: \
         {{ \"currentPrice\": number, \"history\": [...], \"specs\": {{ ... }} }}."
    )
}

/// Generic-item price source backed by [`GenerativeClient`]
pub struct GenerativePriceSource {
    client: Arc<GenerativeClient>,
}

impl GenerativePriceSource {
    pub fn new(client: Arc<GenerativeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for GenerativePriceSource {
    fn source_id(&self) -> &'static str {
        "Grok"
    }

    async fn fetch(
        &self,
        item_id: &str,
        category: Option<&str>,
    ) -> Result<TrackResult, LookupError> {
        let prompt = build_track_prompt(item_id, category);
        let content = self
            .client
            .complete(&prompt, TRACK_TEMPERATURE, TRACK_MAX_TOKENS)
            .await?;

        let generated: GeneratedTrack = parse_json_answer(&content).map_err(|e| {
            warn!(item = %item_id, "Unparsable generative answer: {}", e);
            LookupError::from(e)
        })?;

        let result = generated.into_track_result(item_id)?;
        info!(
            item = %item_id,
            price = result.current_price,
            points = result.history.len(),
            "Retrieved generative track data"
        );
        Ok(result)
    }
}
