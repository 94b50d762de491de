use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod supabase;

pub use supabase::SupabaseBackend;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
  #[error("Request failed: {message}")]
  Transport { message: String },

  #[error("Request timed out after {secs}s")]
  Timeout { secs: u64 },

  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("Failed to decode response: {message}")]
  Decode { message: String },

  #[error("Expected exactly one row, found {}", describe_count(.found))]
  RowCount { found: Option<usize> },

  #[error("Backend is not configured: {message}")]
  Configuration { message: String },
}

impl BackendError {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport { message: message.into() }
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode { message: message.into() }
  }

  pub fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration { message: message.into() }
  }
}

fn describe_count(found: &Option<usize>) -> String {
  match found {
    Some(n) => n.to_string(),
    None => "a different number".to_string(),
  }
}

/// Equality filter on a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
  pub column: String,
  pub value: String,
}

/// A read against one table of the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  pub table: String,
  pub select: String,
  pub filters: Vec<Filter>,
}

impl Query {
  pub fn from(table: impl Into<String>) -> Self {
    Self { table: table.into(), select: "*".to_string(), filters: Vec::new() }
  }

  pub fn select(mut self, columns: impl Into<String>) -> Self {
    self.select = columns.into();
    self
  }

  pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
    self.filters.push(Filter { column: column.into(), value: value.into() });
    self
  }

  /// Value of the first equality filter on `column`
  pub fn filter_value(&self, column: &str) -> Option<&str> {
    self.filters.iter().find(|f| f.column == column).map(|f| f.value.as_str())
  }
}

/// Result of a remote function call. Both halves are opaque to callers beyond logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeOutcome {
  pub data: Option<Value>,
  pub error: Option<String>,
}

impl InvokeOutcome {
  pub fn success(data: Value) -> Self {
    Self { data: Some(data), error: None }
  }

  pub fn failure(error: impl Into<String>) -> Self {
    Self { data: None, error: Some(error.into()) }
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

/// Remote data store and function runner the controller talks to
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
  /// Fetch exactly one row; anything else is `BackendError::RowCount`
  async fn fetch_one(&self, query: &Query) -> Result<Value, BackendError>;

  /// Fetch all matching rows in backend order
  async fn fetch_many(&self, query: &Query) -> Result<Vec<Value>, BackendError>;

  /// Invoke a remote function with a pre-serialized JSON body
  async fn invoke(&self, function: &str, body: String) -> InvokeOutcome;
}
