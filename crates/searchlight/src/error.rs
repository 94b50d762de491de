use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
  #[error("Search identifier must not be empty")]
  InvalidIdentifier,

  #[error("No search record is loaded yet")]
  InvalidState,

  #[error("Expected exactly one search record for '{id}', found {}", describe_found(.found))]
  Multiplicity { id: String, found: Option<usize> },

  #[error("Failed to decode {what}: {message}")]
  Decode { what: &'static str, message: String },

  #[error(transparent)]
  Backend(#[from] BackendError),
}

impl SyncError {
  pub fn decode(what: &'static str, message: impl Into<String>) -> Self {
    Self::Decode { what, message: message.into() }
  }

  pub fn kind(&self) -> FailureKind {
    match self {
      SyncError::InvalidIdentifier => FailureKind::InvalidIdentifier,
      SyncError::InvalidState => FailureKind::InvalidState,
      SyncError::Multiplicity { .. } => FailureKind::Multiplicity,
      SyncError::Decode { .. } => FailureKind::Decode,
      SyncError::Backend(_) => FailureKind::Fetch,
    }
  }
}

fn describe_found(found: &Option<usize>) -> String {
  match found {
    Some(n) => n.to_string(),
    None => "several or none".to_string(),
  }
}

/// Coarse failure category carried by a failed view state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  InvalidIdentifier,
  InvalidState,
  Multiplicity,
  Decode,
  Fetch,
}

impl std::fmt::Display for FailureKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let text = match self {
      FailureKind::InvalidIdentifier => "invalid search identifier",
      FailureKind::InvalidState => "no search loaded",
      FailureKind::Multiplicity => "search record not found or not unique",
      FailureKind::Decode => "unreadable response",
      FailureKind::Fetch => "could not reach the backend",
    };
    f.write_str(text)
  }
}
