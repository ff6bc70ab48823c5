//! Parser for `getall` output: an ordered mapping from lowercase key to
//! `{raw, value?, unit?}`.

use indexmap::IndexMap;
use serde::Serialize;

use super::{normalized_lines, Num};

/// One entry of a parsed `getall` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetAllValue {
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Num>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// An ordered mapping from lowercase key to its parsed value, preserving the
/// order keys appeared in the device's response.
pub type ParsedGetAll = IndexMap<String, GetAllValue>;

/// Parse the body of a `getall` exec into an ordered map of values.
#[must_use]
pub fn parse_getall(text: &str) -> ParsedGetAll {
    let mut out = ParsedGetAll::new();

    for line in normalized_lines(text) {
        let s: &str = match line.strip_prefix('.') {
            Some(rest) => rest.trim_start(),
            None => line.as_str(),
        };
        let Some((key, raw)) = s.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let raw = raw.trim().to_string();

        let (value, unit) = match_num_unit(&raw);
        out.insert(key, GetAllValue { raw, value, unit });
    }

    out
}

/// Match `raw` against `^[-+]?\d+(\.\d+)?(\s*[A-Za-z%/]+)?\s*$`, returning the
/// parsed number and optional unit suffix when it matches.
fn match_num_unit(raw: &str) -> (Option<Num>, Option<String>) {
    let s = raw.trim_end();
    let bytes = s.as_bytes();
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return (None, None);
    }

    if i < bytes.len() && bytes[i] == b'.' {
        let dot = i;
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > dot + 1 {
            i = j;
        }
    }

    let num_str = &s[..i];
    let rest = s[i..].trim_start();
    let unit = if rest.is_empty() {
        None
    } else if rest.chars().all(|c| c.is_ascii_alphabetic() || c == '%' || c == '/') {
        Some(rest.to_string())
    } else {
        return (None, None);
    };

    let value = Num::parse(num_str);
    (value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_seed() {
        let input = ".SN: 6832CEC4\n.MAXPOWER: 700 W\n.PRESMIN: 30.00 Kpa\n.IPADDR: 192.168.16.200\nmsh >\n";
        let parsed = parse_getall(input);

        assert_eq!(parsed["sn"].raw, "6832CEC4");
        assert!(parsed["sn"].value.is_none());

        assert_eq!(parsed["maxpower"].value, Some(Num::Int(700)));
        assert_eq!(parsed["maxpower"].unit.as_deref(), Some("W"));

        assert_eq!(parsed["presmin"].value, Some(Num::Int(30)));
        assert_eq!(parsed["presmin"].unit.as_deref(), Some("Kpa"));

        assert!(parsed["ipaddr"].value.is_none());
    }

    #[test]
    fn preserves_insertion_order() {
        let input = ".B: 2\n.A: 1\n";
        let parsed = parse_getall(input);
        let keys: Vec<&str> = parsed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn supplemental_fields_follow_same_rule() {
        let input = ".FEEDEROUTSPEED: 30 mm/s\n.XTYPE: 6\n";
        let parsed = parse_getall(input);
        assert_eq!(parsed["feederoutspeed"].value, Some(Num::Int(30)));
        assert_eq!(parsed["feederoutspeed"].unit.as_deref(), Some("mm/s"));
        assert_eq!(parsed["xtype"].value, Some(Num::Int(6)));
    }

    #[test]
    fn fractional_value_parses_as_float() {
        let parsed = parse_getall(".TEMP: 21.5 C\n");
        assert_eq!(parsed["temp"].value, Some(Num::Float(21.5)));
    }
}
