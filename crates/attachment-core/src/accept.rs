//! # Accept Header Negotiation
//!
//! Attachments uploaded as JSON may be returned either as parsed JSON or as
//! raw bytes. The choice follows the caller's `Accept` header: entries are
//! ordered by quality (highest first), ties broken by specificity (an exact
//! `type/subtype` beats `type/*`, which beats `*/*`), and the first entry
//! that names a representation wins. Entries with `q=0` are not acceptable
//! and are skipped.

use std::cmp::Ordering;

/// One entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    /// Top-level type, lowercased; `*` for wildcards.
    pub main_type: String,
    /// Subtype, lowercased; `*` for wildcards.
    pub subtype: String,
    /// Quality in `[0, 1]`.
    pub quality: f32,
}

impl MediaRange {
    /// 2 for `type/subtype`, 1 for `type/*`, 0 for `*/*`.
    pub fn specificity(&self) -> u8 {
        match (self.main_type.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    fn is(&self, main_type: &str, subtype: &str) -> bool {
        self.main_type == main_type && self.subtype == subtype
    }
}

/// Representation chosen for a JSON-named attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Parsed JSON body.
    Json,
    /// Raw bytes with a download disposition.
    OctetStream,
}

/// Parse an `Accept` header into media ranges ordered by preference.
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media = parts.next()?.trim().to_ascii_lowercase();
            if media.is_empty() {
                return None;
            }
            let (main_type, subtype) = match media.split_once('/') {
                Some((t, s)) => (t.trim().to_string(), s.trim().to_string()),
                None if media == "*" => ("*".to_string(), "*".to_string()),
                None => (media.clone(), String::new()),
            };
            let quality = parts
                .filter_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    name.trim()
                        .eq_ignore_ascii_case("q")
                        .then(|| value.trim().parse::<f32>().unwrap_or(0.0))
                })
                .next()
                .unwrap_or(1.0);
            Some(MediaRange {
                main_type,
                subtype,
                quality: if quality.is_finite() {
                    quality.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            })
        })
        .collect();

    // `sort_by` is stable, so equal entries keep header order.
    ranges.sort_by(|a, b| {
        b.quality
            .total_cmp(&a.quality)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    ranges
}

/// Decide how to return an attachment stored under the JSON filename.
pub fn negotiate_json_attachment(accept: &str) -> Representation {
    for range in parse_accept(accept) {
        if range.quality.partial_cmp(&0.0) != Some(Ordering::Greater) {
            continue;
        }
        if range.is("application", "json")
            || range.is("application", "*")
            || range.is("*", "*")
        {
            return Representation::Json;
        }
        if range.is("application", "octet-stream") {
            return Representation::OctetStream;
        }
    }
    Representation::OctetStream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_orders_entries() {
        let ranges = parse_accept("text/plain;q=0.2, application/json;q=0.9, */*;q=0.5");
        let order: Vec<_> = ranges
            .iter()
            .map(|r| format!("{}/{}", r.main_type, r.subtype))
            .collect();
        assert_eq!(order, ["application/json", "*/*", "text/plain"]);
    }

    #[test]
    fn ties_broken_by_specificity() {
        let ranges = parse_accept("*/*, application/*, application/json");
        assert_eq!(ranges[0].specificity(), 2);
        assert_eq!(ranges[1].specificity(), 1);
        assert_eq!(ranges[2].specificity(), 0);
    }

    #[test]
    fn missing_or_garbled_quality() {
        let ranges = parse_accept("application/json;charset=utf-8, text/html;q=abc");
        assert_eq!(ranges[0].quality, 1.0);
        assert_eq!(ranges[1].quality, 0.0);
    }

    #[test]
    fn empty_entries_are_skipped() {
        assert!(parse_accept("").is_empty());
        assert_eq!(parse_accept(" , application/json ,").len(), 1);
    }

    #[test]
    fn json_preferred_by_quality() {
        assert_eq!(
            negotiate_json_attachment("application/octet-stream;q=0.5,application/json;q=0.9"),
            Representation::Json
        );
    }

    #[test]
    fn octet_stream_requested() {
        assert_eq!(
            negotiate_json_attachment("application/octet-stream"),
            Representation::OctetStream
        );
    }

    #[test]
    fn wildcards_select_json() {
        assert_eq!(negotiate_json_attachment("*/*"), Representation::Json);
        assert_eq!(
            negotiate_json_attachment("text/html, application/*;q=0.2"),
            Representation::Json
        );
    }

    #[test]
    fn exact_octet_stream_beats_equal_quality_wildcard() {
        assert_eq!(
            negotiate_json_attachment("application/*, application/octet-stream"),
            Representation::OctetStream
        );
    }

    #[test]
    fn header_order_kept_for_equal_entries() {
        assert_eq!(
            negotiate_json_attachment("application/json, application/octet-stream"),
            Representation::Json
        );
    }

    #[test]
    fn unrelated_types_fall_back_to_octet() {
        assert_eq!(
            negotiate_json_attachment("text/html, image/png"),
            Representation::OctetStream
        );
        assert_eq!(negotiate_json_attachment(""), Representation::OctetStream);
    }

    #[test]
    fn zero_quality_is_not_acceptable() {
        assert_eq!(
            negotiate_json_attachment("application/json;q=0, application/octet-stream;q=0.1"),
            Representation::OctetStream
        );
    }
}
