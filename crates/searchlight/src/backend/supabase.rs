//! HTTP transport for a Supabase project
//!
//! Reads go through the PostgREST data API (`/rest/v1`), function calls go
//! through the edge functions endpoint (`/functions/v1`).

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use super::{Backend, BackendError, InvokeOutcome, Query};
use crate::config::BackendConfig;

/// PostgREST returns a bare object instead of an array with this media type,
/// and answers 406 unless exactly one row matched.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub struct SupabaseBackend {
  client: Client,
  /// Function calls wait as long as the function takes
  function_client: Client,
  base_url: Url,
  api_key: Option<String>,
  timeout_secs: u64,
}

impl std::fmt::Debug for SupabaseBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SupabaseBackend")
      .field("base_url", &self.base_url.as_str())
      .field("timeout_secs", &self.timeout_secs)
      .finish_non_exhaustive()
  }
}

impl SupabaseBackend {
  pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
    if config.url.trim().is_empty() {
      return Err(BackendError::configuration("no backend URL set"));
    }

    let base = format!("{}/", config.url.trim().trim_end_matches('/'));
    let base_url = Url::parse(&base)
      .map_err(|e| BackendError::configuration(format!("invalid backend URL '{}': {e}", config.url)))?;

    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| BackendError::configuration(format!("failed to create HTTP client: {e}")))?;
    let function_client = Client::builder()
      .build()
      .map_err(|e| BackendError::configuration(format!("failed to create HTTP client: {e}")))?;

    Ok(Self {
      client,
      function_client,
      base_url,
      api_key: config.api_key.clone(),
      timeout_secs: config.timeout_secs,
    })
  }

  fn table_url(&self, query: &Query) -> Result<Url, BackendError> {
    let mut url = self
      .base_url
      .join(&format!("rest/v1/{}", query.table))
      .map_err(|e| BackendError::configuration(format!("invalid table '{}': {e}", query.table)))?;

    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("select", &query.select);
      for filter in &query.filters {
        pairs.append_pair(&filter.column, &format!("eq.{}", filter.value));
      }
    }

    Ok(url)
  }

  fn function_url(&self, function: &str) -> Result<Url, BackendError> {
    self
      .base_url
      .join(&format!("functions/v1/{function}"))
      .map_err(|e| BackendError::configuration(format!("invalid function '{function}': {e}")))
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.api_key {
      Some(key) => request.header("apikey", key).header(AUTHORIZATION, format!("Bearer {key}")),
      None => request,
    }
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
    timeout(Duration::from_secs(self.timeout_secs), request.send())
      .await
      .map_err(|_| BackendError::Timeout { secs: self.timeout_secs })?
      .map_err(|e| {
        if e.is_timeout() {
          BackendError::Timeout { secs: self.timeout_secs }
        } else {
          BackendError::transport(e.to_string())
        }
      })
  }

  async fn read_json(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| BackendError::transport(e.to_string()))?;

    if !status.is_success() {
      return Err(BackendError::Status { status: status.as_u16(), message: error_message(&text) });
    }

    serde_json::from_str(&text).map_err(|e| BackendError::decode(e.to_string()))
  }
}

#[async_trait::async_trait]
impl Backend for SupabaseBackend {
  async fn fetch_one(&self, query: &Query) -> Result<Value, BackendError> {
    let url = self.table_url(query)?;
    let request = self.authorize(self.client.get(url)).header(ACCEPT, SINGLE_OBJECT);
    let response = self.send(request).await?;

    if response.status() == StatusCode::NOT_ACCEPTABLE {
      let text = response.text().await.unwrap_or_default();
      return Err(BackendError::RowCount { found: parse_row_count(&text) });
    }

    let value = Self::read_json(response).await?;
    if value.is_object() {
      Ok(value)
    } else {
      Err(BackendError::decode(format!("expected a single object, got {value}")))
    }
  }

  async fn fetch_many(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
    let url = self.table_url(query)?;
    let request = self.authorize(self.client.get(url)).header(ACCEPT, "application/json");
    let response = self.send(request).await?;

    match Self::read_json(response).await? {
      Value::Array(rows) => Ok(rows),
      other => Err(BackendError::decode(format!("expected an array of rows, got {other}"))),
    }
  }

  async fn invoke(&self, function: &str, body: String) -> InvokeOutcome {
    let url = match self.function_url(function) {
      Ok(url) => url,
      Err(e) => return InvokeOutcome::failure(e.to_string()),
    };

    let request = self
      .authorize(self.function_client.post(url))
      .header(CONTENT_TYPE, "application/json")
      .body(body);

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => return InvokeOutcome::failure(BackendError::transport(e.to_string()).to_string()),
    };

    let status = response.status();
    let text = match response.text().await {
      Ok(text) => text,
      Err(e) => return InvokeOutcome::failure(e.to_string()),
    };

    if !status.is_success() {
      return InvokeOutcome::failure(format!("HTTP {}: {}", status.as_u16(), error_message(&text)));
    }

    if text.trim().is_empty() {
      return InvokeOutcome::success(Value::Null);
    }

    // Functions may answer with plain text
    let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
    InvokeOutcome::success(data)
  }
}

/// Pull a readable message out of a PostgREST or function error body
fn error_message(body: &str) -> String {
  serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|v| {
      v.get("message").or_else(|| v.get("error")).and_then(Value::as_str).map(str::to_string)
    })
    .unwrap_or_else(|| body.trim().to_string())
}

/// PostgREST reports "The result contains N rows" in the `details` of a 406
fn parse_row_count(body: &str) -> Option<usize> {
  let value: Value = serde_json::from_str(body).ok()?;
  let details = value.get("details")?.as_str()?;
  let mut words = details.split_whitespace();
  words.by_ref().find(|w| *w == "contains")?;
  words.next()?.parse().ok()
}
