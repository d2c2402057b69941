//! Track result normalization
//!
//! Every lookup path runs its result through [`normalize_track_result`]
//! before it leaves the service:
//! - history points with an unparseable date or non-finite price are dropped
//! - dates are rewritten as `YYYY-MM-DD`, sorted newest first, deduplicated
//! - history is capped at [`MAX_HISTORY_POINTS`]
//! - a missing `Image URL` entry in specs is replaced with a slug placeholder
//!
//! Applying the normalization twice yields the same result as once.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

use crate::models::{
    PricePoint, TrackResult, MAX_HISTORY_POINTS, SPEC_DESCRIPTION, SPEC_IMAGE_URL, SPEC_NAME,
};
use crate::slug::{placeholder_image_url, title_case};

/// Parse a history date in any of the shapes upstreams produce
pub fn parse_history_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|ts| ts.date())
}

/// Filter, sort newest first, deduplicate by date and cap the history
pub fn normalize_history(history: Vec<PricePoint>) -> Vec<PricePoint> {
    let mut dated: Vec<(NaiveDate, f64)> = history
        .into_iter()
        .filter(|point| point.price.is_finite())
        .filter_map(|point| parse_history_date(&point.date).map(|date| (date, point.price)))
        .collect();

    // Stable sort keeps the upstream order among equal dates, so the first
    // occurrence of a date wins.
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.dedup_by(|later, earlier| later.0 == earlier.0);
    dated.truncate(MAX_HISTORY_POINTS);

    dated
        .into_iter()
        .map(|(date, price)| PricePoint::new(date.format("%Y-%m-%d").to_string(), price))
        .collect()
}

fn is_blank(specs: &BTreeMap<String, String>, key: &str) -> bool {
    specs.get(key).map_or(true, |value| value.trim().is_empty())
}

/// Normalize a lookup result for `slug`
pub fn normalize_track_result(result: TrackResult, slug: &str) -> TrackResult {
    let mut specs = result.specs;
    if is_blank(&specs, SPEC_IMAGE_URL) {
        specs.insert(SPEC_IMAGE_URL.to_string(), placeholder_image_url(slug));
    }

    TrackResult {
        current_price: result.current_price,
        history: normalize_history(result.history),
        specs,
    }
}

/// Fill in optional descriptive specs an upstream left out
pub fn backfill_specs(specs: &mut BTreeMap<String, String>, slug: &str) {
    let name = title_case(slug);

    if is_blank(specs, SPEC_NAME) {
        specs.insert(SPEC_NAME.to_string(), name.clone());
    }
    if is_blank(specs, SPEC_DESCRIPTION) {
        specs.insert(
            SPEC_DESCRIPTION.to_string(),
            format!("Premium {} with historical value tracking via TrackAura.", name.to_lowercase()),
        );
    }
    if is_blank(specs, SPEC_IMAGE_URL) {
        specs.insert(SPEC_IMAGE_URL.to_string(), placeholder_image_url(slug));
    }
}

const ELLIPSIS: &str = "...";

/// Truncate a description to at most `max_chars` characters, ellipsis included
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let end = text.char_indices().nth(keep).map_or(text.len(), |(idx, _)| idx);
    format!("{}{}", text[..end].trim_end(), ELLIPSIS)
}
