//! Search result controller
//!
//! Holds the search record and product list for the active search identifier,
//! keeps them in step with the backend and exposes the scraping trigger.
//! Every fetch is tagged with the generation that was active when it was
//! issued; results that come back after the identifier changed are dropped.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendError, InvokeOutcome, Query};
use crate::config::FailureMode;
use crate::error::{FailureKind, SyncError};
use crate::model::{Product, ProductSearchRow, ScrapeRequest, SearchRecord};

pub const SEARCHES_TABLE: &str = "searches";
pub const PRODUCT_SEARCH_TABLE: &str = "product_search";
pub const SCRAPE_FUNCTION: &str = "scrape-start";

/// What the presentation layer should show
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
  Uninitialized,
  Loading,
  Ready { search: SearchRecord, products: Vec<Product> },
  Failed { kind: FailureKind },
}

impl ViewState {
  pub fn is_loading(&self) -> bool {
    matches!(self, ViewState::Loading)
  }

  pub fn search(&self) -> Option<&SearchRecord> {
    match self {
      ViewState::Ready { search, .. } => Some(search),
      _ => None,
    }
  }

  pub fn products(&self) -> &[Product] {
    match self {
      ViewState::Ready { products, .. } => products,
      _ => &[],
    }
  }
}

#[derive(Debug, Default)]
struct Screen {
  active_id: Option<String>,
  generation: u64,
  search: Option<SearchRecord>,
  products: Vec<Product>,
  products_resolved: bool,
  failure: Option<FailureKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

#[derive(Clone)]
pub struct SearchResultController {
  backend: Arc<dyn Backend>,
  failure_mode: FailureMode,
  screen: Arc<Mutex<Screen>>,
}

impl SearchResultController {
  pub fn new(backend: Arc<dyn Backend>) -> Self {
    Self { backend, failure_mode: FailureMode::default(), screen: Arc::default() }
  }

  pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
    self.failure_mode = failure_mode;
    self
  }

  fn screen(&self) -> MutexGuard<'_, Screen> {
    // State updates never panic midway, so a poisoned lock still holds consistent data
    self.screen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn ticket(&self) -> Ticket {
    Ticket(self.screen().generation)
  }

  /// Run `update` only if `ticket` and `id` still describe the active screen
  fn apply<F>(&self, ticket: Ticket, id: &str, what: &str, update: F) -> bool
  where
    F: FnOnce(&mut Screen),
  {
    let mut screen = self.screen();
    let current = screen.generation == ticket.0 && screen.active_id.as_deref() == Some(id);
    if current {
      update(&mut screen);
    } else {
      debug!("Discarding stale {what} for search '{id}'");
    }
    current
  }

  pub fn active_id(&self) -> Option<String> {
    self.screen().active_id.clone()
  }

  /// The search record currently held, if any
  pub fn loaded_search(&self) -> Option<SearchRecord> {
    self.screen().search.clone()
  }

  /// Whether a product fetch has been accepted for the active identifier
  pub fn products_resolved(&self) -> bool {
    self.screen().products_resolved
  }

  pub fn state(&self) -> ViewState {
    let screen = self.screen();
    match (&screen.active_id, &screen.search, screen.failure) {
      (None, _, _) => ViewState::Uninitialized,
      (Some(_), Some(search), _) => {
        ViewState::Ready { search: search.clone(), products: screen.products.clone() }
      }
      (Some(_), None, Some(kind)) if self.failure_mode == FailureMode::Surface => {
        ViewState::Failed { kind }
      }
      _ => ViewState::Loading,
    }
  }

  /// Make `id` the active identifier with an empty screen and return its ticket
  fn begin(&self, id: &str) -> Ticket {
    let mut screen = self.screen();
    screen.generation += 1;
    screen.active_id = Some(id.to_string());
    screen.search = None;
    screen.products = Vec::new();
    screen.products_resolved = false;
    screen.failure = None;
    Ticket(screen.generation)
  }

  /// Switch to `id` and load its record and products concurrently.
  ///
  /// Failures are logged, never returned; the snapshot reflects whatever
  /// arrived.
  pub async fn activate(&self, id: &str) -> ViewState {
    let ticket = self.begin(id);

    info!("Loading search '{id}'");
    let (search, products) =
      tokio::join!(self.load_search_with(ticket, id), self.load_products_with(ticket, id));

    if let Ok(record) = &search {
      info!("Search '{}' is {}", record.id, record.status);
    }
    if let Ok(products) = &products {
      info!("Search '{id}' has {} product(s)", products.len());
    }

    self.state()
  }

  /// Re-run activation for the current identifier
  pub async fn refresh(&self) -> Option<ViewState> {
    let id = self.active_id()?;
    Some(self.activate(&id).await)
  }

  /// Fetch the single search record for `id` and hold it if still current.
  ///
  /// The generation is taken when this is called, not when the future is first polled.
  pub fn load_search<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<SearchRecord, SyncError>> + 'a {
    let ticket = self.ticket();
    self.load_search_with(ticket, id)
  }

  async fn load_search_with(&self, ticket: Ticket, id: &str) -> Result<SearchRecord, SyncError> {
    match fetch_search(self.backend.as_ref(), id).await {
      Ok(record) => {
        self.apply(ticket, id, "search record", |screen| {
          screen.search = Some(record.clone());
          screen.failure = None;
        });
        Ok(record)
      }
      Err(e) => {
        if matches!(e, SyncError::Multiplicity { .. }) {
          error!("Search record anomaly: {e}");
        } else {
          error!("Failed to load search '{id}': {e}");
        }
        let kind = e.kind();
        self.apply(ticket, id, "search failure", |screen| screen.failure = Some(kind));
        Err(e)
      }
    }
  }

  /// Fetch the products associated with `id` and replace the held list if still current
  pub fn load_products<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Vec<Product>, SyncError>> + 'a {
    let ticket = self.ticket();
    self.load_products_with(ticket, id)
  }

  async fn load_products_with(
    &self,
    ticket: Ticket,
    id: &str,
  ) -> Result<Vec<Product>, SyncError> {
    match fetch_products(self.backend.as_ref(), id).await {
      Ok(products) => {
        self.apply(ticket, id, "product list", |screen| {
          screen.products = products.clone();
          screen.products_resolved = true;
        });
        Ok(products)
      }
      Err(e) => {
        error!("Failed to load products for search '{id}': {e}");
        Err(e)
      }
    }
  }

  /// Ask the backend to start scraping the loaded search and wait for its answer.
  ///
  /// The answer is logged and returned; it never changes the view state.
  pub async fn request_scraping(&self) -> Result<InvokeOutcome, SyncError> {
    let record = self.loaded_search().ok_or(SyncError::InvalidState)?;
    invoke_scrape(self.backend.as_ref(), record).await
  }

  /// Fire-and-forget variant of [`request_scraping`](Self::request_scraping).
  ///
  /// Must be called from within a Tokio runtime.
  pub fn spawn_scraping(&self) -> Result<(), SyncError> {
    let record = self.loaded_search().ok_or(SyncError::InvalidState)?;
    let backend = Arc::clone(&self.backend);
    tokio::spawn(async move {
      let id = record.id.clone();
      if let Err(e) = invoke_scrape(backend.as_ref(), record).await {
        error!("Could not request scraping for search '{id}': {e}");
      }
    });
    Ok(())
  }
}

async fn fetch_search(backend: &dyn Backend, id: &str) -> Result<SearchRecord, SyncError> {
  if id.trim().is_empty() {
    return Err(SyncError::InvalidIdentifier);
  }

  let query = Query::from(SEARCHES_TABLE).eq("id", id);
  let row = backend.fetch_one(&query).await.map_err(|e| match e {
    BackendError::RowCount { found } => SyncError::Multiplicity { id: id.to_string(), found },
    other => SyncError::Backend(other),
  })?;

  serde_json::from_value(row).map_err(|e| SyncError::decode("search record", e.to_string()))
}

async fn fetch_products(backend: &dyn Backend, id: &str) -> Result<Vec<Product>, SyncError> {
  if id.trim().is_empty() {
    return Err(SyncError::InvalidIdentifier);
  }

  let query = Query::from(PRODUCT_SEARCH_TABLE).select("*,products(*)").eq("search_id", id);
  let rows = backend.fetch_many(&query).await?;

  let mut seen = HashSet::new();
  let mut products = Vec::with_capacity(rows.len());

  for (index, row) in rows.into_iter().enumerate() {
    let row: ProductSearchRow = match serde_json::from_value(row) {
      Ok(row) => row,
      Err(e) => {
        warn!("Skipping unreadable product row {index} of search '{id}': {e}");
        continue;
      }
    };

    let Some(product) = row.products else {
      warn!("Skipping product row {index} of search '{id}': product is missing");
      continue;
    };

    if product.asin.trim().is_empty() {
      warn!("Skipping product row {index} of search '{id}': empty asin");
      continue;
    }

    if !seen.insert(product.asin.clone()) {
      warn!("Skipping duplicate product {} in search '{id}'", product.asin);
      continue;
    }

    products.push(product);
  }

  Ok(products)
}

async fn invoke_scrape(
  backend: &dyn Backend,
  record: SearchRecord,
) -> Result<InvokeOutcome, SyncError> {
  let id = record.id.clone();
  let body = ScrapeRequest::new(record)
    .to_body()
    .map_err(|e| SyncError::decode("scrape request", e.to_string()))?;

  info!("Requesting scraping for search '{id}'");
  let outcome = backend.invoke(SCRAPE_FUNCTION, body).await;

  match &outcome.error {
    Some(err) => warn!("{SCRAPE_FUNCTION} failed for search '{id}': {err}"),
    None => info!("{SCRAPE_FUNCTION} accepted search '{id}': {:?}", outcome.data),
  }

  Ok(outcome)
}
