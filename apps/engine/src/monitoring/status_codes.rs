//! Parser for the accepted-status-code spec carried by HTTP monitors.
//!
//! The spec is a comma-separated list of tokens, each a single code
//! ("301") or an inclusive range ("200-204"). An unset or blank spec
//! means `{200}`. Malformed tokens are reported as errors, never a
//! panic; the CRUD seam rejects them at monitor creation and the
//! checker reports them as a down outcome if one slips through.

use anyhow::{Result, anyhow};
use std::collections::HashSet;

/// Expand a status-code spec into the concrete set of accepted codes
pub fn parse_status_codes(spec: Option<&str>) -> Result<HashSet<u16>> {
    let raw = match spec {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(HashSet::from([200])),
    };

    let mut accepted = HashSet::new();

    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("empty token in status code spec"));
        }

        if let Some((start, end)) = token.split_once('-') {
            let start: u16 = start
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid status code range start: {token}"))?;
            let end: u16 = end
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid status code range end: {token}"))?;
            if start > end {
                return Err(anyhow!("reversed status code range: {token}"));
            }
            accepted.extend(start..=end);
        } else {
            let code: u16 =
                token.parse().map_err(|_| anyhow!("invalid status code: {token}"))?;
            accepted.insert(code);
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_codes_and_ranges_expand() {
        let set = parse_status_codes(Some("200-204,301")).unwrap();
        assert_eq!(set, HashSet::from([200, 201, 202, 203, 204, 301]));
    }

    #[test]
    fn unset_spec_defaults_to_200() {
        assert_eq!(parse_status_codes(None).unwrap(), HashSet::from([200]));
        assert_eq!(parse_status_codes(Some("")).unwrap(), HashSet::from([200]));
        assert_eq!(parse_status_codes(Some("   ")).unwrap(), HashSet::from([200]));
    }

    #[test]
    fn whitespace_around_tokens_is_tolerated() {
        let set = parse_status_codes(Some(" 200 , 204 ")).unwrap();
        assert_eq!(set, HashSet::from([200, 204]));
    }

    #[test]
    fn malformed_tokens_are_errors_not_panics() {
        assert!(parse_status_codes(Some("abc")).is_err());
        assert!(parse_status_codes(Some("200,")).is_err());
        assert!(parse_status_codes(Some("204-200")).is_err());
        assert!(parse_status_codes(Some("200-abc")).is_err());
        assert!(parse_status_codes(Some(",200")).is_err());
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let set = parse_status_codes(Some("200-299")).unwrap();
        assert!(set.contains(&200));
        assert!(set.contains(&299));
        assert!(!set.contains(&300));
        assert!(!set.contains(&503));
    }
}
