//! Terminal rendering of the search result screen
//!
//! A header card for the search (query, age, status, scraping hint) followed
//! by one block per product. Rendering is pure: it takes a [`ViewState`] and
//! the current time and returns the text to print.

use chrono::{DateTime, Utc};
use colored::*;

use crate::controller::ViewState;
use crate::model::{Product, SearchRecord};

pub const CARD_WIDTH: usize = 72;
pub const NAME_MAX_LINES: usize = 4;

/// `$ <price>` using the shortest form of the number (`19.99`, `24.5`, `20`)
pub fn format_price(price: f64) -> String {
  format!("$ {price}")
}

const MISSING_PRICE: &str = "$ -";

/// Human readable age of `then` relative to `now`, e.g. "3 hours ago" or "in a day"
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let seconds = (now - then).num_milliseconds() as f64 / 1000.0;
  let phrase = describe_span(seconds.abs());

  if seconds < 0.0 {
    format!("in {phrase}")
  } else {
    format!("{phrase} ago")
  }
}

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_MONTH: f64 = 365.2425 / 12.0;

fn describe_span(seconds: f64) -> String {
  let secs = seconds.round();
  if secs <= 44.0 {
    return "a few seconds".to_string();
  }
  if secs <= 89.0 {
    return "a minute".to_string();
  }

  let minutes = (seconds / 60.0).round();
  if minutes <= 44.0 {
    return plural(minutes, "a minute", "minutes");
  }
  if minutes <= 89.0 {
    return "an hour".to_string();
  }

  let hours = (seconds / 3600.0).round();
  if hours <= 21.0 {
    return plural(hours, "an hour", "hours");
  }
  if hours <= 35.0 {
    return "a day".to_string();
  }

  let days_exact = seconds / SECONDS_PER_DAY;
  let days = days_exact.round();
  if days <= 25.0 {
    return plural(days, "a day", "days");
  }
  if days <= 45.0 {
    return "a month".to_string();
  }

  let months = (days_exact / DAYS_PER_MONTH).round();
  if months <= 10.0 {
    return plural(months, "a month", "months");
  }
  if months <= 17.0 {
    return "a year".to_string();
  }

  let years = (days_exact / DAYS_PER_MONTH / 12.0).round();
  plural(years, "a year", "years")
}

fn plural(count: f64, one: &str, unit: &str) -> String {
  if count <= 1.0 {
    one.to_string()
  } else {
    format!("{count} {unit}")
  }
}

/// Word-wrap `text` to `width` columns; words longer than a line stay whole
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();

  for content_line in text.lines() {
    let mut current_line = String::new();

    for word in content_line.split_whitespace() {
      if current_line.is_empty() {
        current_line.push_str(word);
      } else if current_line.chars().count() + word.chars().count() < width {
        current_line.push(' ');
        current_line.push_str(word);
      } else {
        lines.push(std::mem::take(&mut current_line));
        current_line.push_str(word);
      }
    }

    if !current_line.is_empty() {
      lines.push(current_line);
    }
  }

  lines
}

/// Wrap and cut to `max_lines`, marking the cut with an ellipsis
pub fn truncate_lines(text: &str, width: usize, max_lines: usize) -> Vec<String> {
  let mut lines = wrap_text(text, width);
  if lines.len() > max_lines {
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
      last.push('…');
    }
  }
  lines
}

pub fn render_header(search: &SearchRecord, now: DateTime<Utc>) -> String {
  let age = match search.created_at_utc() {
    Some(created) => relative_time(created, now),
    None => search.created_at.clone(),
  };

  let border = "─".repeat(CARD_WIDTH);
  let mut out = Vec::new();
  out.push(border.dimmed().to_string());
  out.push(search.query.bold().to_string());
  out.push(age.dimmed().to_string());
  out.push(search.status.cyan().to_string());
  out.push(format!("{} searchlight scrape {}", "[Start scraping]".green().bold(), search.id));
  out.push(border.dimmed().to_string());
  out.join("\n")
}

pub fn render_product(product: &Product) -> String {
  let mut out = Vec::new();
  if let Some(image) = &product.image {
    out.push(format!("{} {}", "img".dimmed(), image.dimmed()));
  }
  let name = product.name.as_deref().unwrap_or_default();
  for line in truncate_lines(name, CARD_WIDTH, NAME_MAX_LINES) {
    out.push(line);
  }
  let price = product.final_price.map(format_price).unwrap_or_else(|| MISSING_PRICE.to_string());
  out.push(price.yellow().bold().to_string());
  if let Some(url) = &product.url {
    out.push(format!("→ {}", url.underline()));
  }
  out.join("\n")
}

pub fn render_products(products: &[Product]) -> String {
  if products.is_empty() {
    return "No products yet".dimmed().to_string();
  }

  products.iter().map(render_product).collect::<Vec<_>>().join("\n\n")
}

pub fn render(state: &ViewState, now: DateTime<Utc>) -> String {
  match state {
    ViewState::Uninitialized => String::new(),
    ViewState::Loading => "Loading search...".dimmed().to_string(),
    ViewState::Failed { kind } => format!("{} {kind}", "Could not load search:".red().bold()),
    ViewState::Ready { search, products } => {
      format!("{}\n\n{}", render_header(search, now), render_products(products))
    }
  }
}
