//! `Retry-After` header parsing (§4.E, §8 boundary behaviors).

/// Parses a `Retry-After` header value as either delta-seconds or an
/// HTTP-date, returning a millisecond delay capped at `cap_ms`. Past dates
/// clamp to 0; unparseable or empty/whitespace values return `None` (the
/// caller falls back to exponential backoff).
pub fn parse_retry_after(value: &str, cap_ms: u64) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        let ms = secs.max(0) as u64 * 1000;
        return Some(ms.min(cap_ms));
    }

    if let Ok(date) = httpdate::parse_http_date(trimmed) {
        let now = std::time::SystemTime::now();
        return match date.duration_since(now) {
            Ok(delta) => Some((delta.as_millis() as u64).min(cap_ms)),
            Err(_) => Some(0),
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_seconds() {
        assert_eq!(parse_retry_after("0", 30_000), Some(0));
        assert_eq!(parse_retry_after("5", 30_000), Some(5000));
    }

    #[test]
    fn caps_large_values() {
        assert_eq!(parse_retry_after("1000", 30_000), Some(30_000));
    }

    #[test]
    fn empty_or_whitespace_is_none() {
        assert_eq!(parse_retry_after("", 30_000), None);
        assert_eq!(parse_retry_after("   ", 30_000), None);
    }

    #[test]
    fn unparseable_is_none() {
        assert_eq!(parse_retry_after("not-a-date-or-number", 30_000), None);
    }

    #[test]
    fn past_http_date_clamps_to_zero() {
        assert_eq!(
            parse_retry_after("Sun, 06 Nov 1994 08:49:37 GMT", 30_000),
            Some(0)
        );
    }
}
