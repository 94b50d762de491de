//! Wire types for searches, products and the join rows between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A search the user submitted. Owned by the backend; held here read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
  pub id: String,
  pub query: String,
  /// ISO 8601 timestamp, kept verbatim
  pub created_at: String,
  /// Lifecycle state as reported by the backend (`pending`, `scraping`, `done`, ...)
  pub status: String,

  /// Any further columns the backend returned, passed through untouched
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl SearchRecord {
  pub fn new(
    id: impl Into<String>,
    query: impl Into<String>,
    created_at: impl Into<String>,
    status: impl Into<String>,
  ) -> Self {
    Self {
      id: id.into(),
      query: query.into(),
      created_at: created_at.into(),
      status: status.into(),
      extra: Map::new(),
    }
  }

  /// Parsed creation time, if the backend sent a valid RFC 3339 timestamp
  pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&self.created_at).ok().map(|dt| dt.with_timezone(&Utc))
  }
}

/// A scraped product. Only `asin` is required; the display columns may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  /// Natural key, used as the list key
  pub asin: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub final_price: Option<f64>,
}

/// One row of `product_search` with its product embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSearchRow {
  /// Null when the referenced product no longer exists
  #[serde(default)]
  pub products: Option<Product>,

  #[serde(flatten)]
  pub join_fields: Map<String, Value>,
}

/// Payload sent to the `scrape-start` function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
  pub record: SearchRecord,
}

impl ScrapeRequest {
  pub fn new(record: SearchRecord) -> Self {
    Self { record }
  }

  pub fn to_body(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_search_record_keeps_unknown_columns() {
    let row = json!({
      "id": "s1",
      "query": "wireless mouse",
      "created_at": "2024-01-01T00:00:00Z",
      "status": "done",
      "user_id": "u-42"
    });

    let record: SearchRecord = serde_json::from_value(row.clone()).unwrap();
    assert_eq!(record.query, "wireless mouse");
    assert_eq!(record.extra.get("user_id"), Some(&json!("u-42")));
    assert_eq!(serde_json::to_value(&record).unwrap(), row);
  }

  #[test]
  fn test_created_at_parsing() {
    let record = SearchRecord::new("s1", "q", "2024-01-01T00:00:00Z", "done");
    let parsed = record.created_at_utc().unwrap();
    assert_eq!(parsed.to_rfc3339(), "2024-01-01T00:00:00+00:00");

    let broken = SearchRecord::new("s1", "q", "yesterday", "done");
    assert!(broken.created_at_utc().is_none());
  }

  #[test]
  fn test_join_row_with_missing_product() {
    let row: ProductSearchRow =
      serde_json::from_value(json!({ "search_id": "s1", "product_id": "X1", "products": null }))
        .unwrap();
    assert!(row.products.is_none());
    assert_eq!(row.join_fields.get("search_id"), Some(&json!("s1")));
  }

  #[test]
  fn test_product_with_null_display_columns() {
    let product: Product = serde_json::from_value(json!({
      "asin": "X3",
      "name": "Mouse C",
      "url": null,
      "image": null,
      "final_price": null
    }))
    .unwrap();

    assert_eq!(product.asin, "X3");
    assert_eq!(product.name.as_deref(), Some("Mouse C"));
    assert_eq!(product.image, None);
    assert_eq!(product.final_price, None);

    let bare: Product = serde_json::from_value(json!({ "asin": "X4" })).unwrap();
    assert_eq!(bare.name, None);
    assert_eq!(bare.url, None);
  }

  #[test]
  fn test_scrape_request_body_shape() {
    let record = SearchRecord::new("s1", "wireless mouse", "2024-01-01T00:00:00Z", "pending");
    let body = ScrapeRequest::new(record).to_body().unwrap();
    let value: Value = serde_json::from_str(&body).unwrap();

    assert_eq!(value["record"]["id"], "s1");
    assert_eq!(value["record"]["status"], "pending");
    assert_eq!(value.as_object().unwrap().len(), 1);
  }
}
