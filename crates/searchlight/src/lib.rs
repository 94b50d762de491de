//! Searchlight - product search results and scraping trigger
//!
//! Loads a submitted search and the products found for it from a remote
//! store, renders them for the terminal, and asks the backend to start a
//! scraping job for the search on demand.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod view;

pub use backend::{Backend, BackendError, InvokeOutcome, Query, SupabaseBackend};
pub use config::{Config, FailureMode};
pub use controller::{SearchResultController, ViewState};
pub use error::{FailureKind, SyncError};
pub use model::{Product, SearchRecord};
