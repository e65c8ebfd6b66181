use crate::types::RateLimitMeta;
use reqwest::header::HeaderMap;
use tracing::debug;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-rate-limit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-rate-limit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Extracts the rate limit fields from response headers.
///
/// Never fails: a missing, empty or non-numeric header yields `0` for that field.
pub fn extract_meta(headers: &HeaderMap) -> RateLimitMeta {
    RateLimitMeta {
        limit: parse_header_or_zero(headers, RATE_LIMIT_LIMIT_HEADER),
        remaining: parse_header_or_zero(headers, RATE_LIMIT_REMAINING_HEADER),
        reset: parse_header_or_zero(headers, RATE_LIMIT_RESET_HEADER),
    }
}

fn parse_header_or_zero(headers: &HeaderMap, name: &str) -> f64 {
    let raw = headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(e) => {
            debug!(header = name, value = raw, "Failed to parse rate limit header: {e}");
            0.0
        }
    }
}
