//! C1.5: JSON-in-name multi-record decoding, single- and
//! multi-fragment.  See SPEC_FULL.md §4.1.5.

use super::base32;

/// A label of the form `jN<data>`, `N` a single digit 1-9.
fn parse_fragment(label: &str) -> Option<(u8, &str)> {
    let rest = label.strip_prefix('j')?;
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if first.is_ascii_digit() && first != '0' {
        #[allow(clippy::cast_possible_truncation)]
        let n = first.to_digit(10)? as u8;
        Some((n, &rest[1..]))
    } else {
        None
    }
}

/// Collect `jN<data>` fragments from every label of the name, requiring
/// a contiguous run `1..=max` with no gaps.
fn collect_multi_fragment(name: &str) -> Option<String> {
    let mut frags: Vec<(u8, &str)> = name.split('.').filter_map(parse_fragment).collect();
    if frags.is_empty() {
        return None;
    }
    frags.sort_by_key(|&(n, _)| n);

    let max = frags.iter().map(|&(n, _)| n).max().unwrap();
    for i in 1..=max {
        if !frags.iter().any(|&(n, _)| n == i) {
            return None;
        }
    }

    Some(frags.into_iter().map(|(_, data)| data).collect())
}

/// A single leading label starting with `j` but not `j<digit>`.
fn collect_single_fragment(name: &str) -> Option<String> {
    let first = name.split('.').next()?;
    let rest = first.strip_prefix('j')?;
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(rest.to_string())
}

/// Decode the JSON object encoded in `name`, if any of its labels
/// constitute a valid single- or multi-fragment payload.
#[must_use]
pub fn decode_records(name: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let payload = collect_single_fragment(name).or_else(|| collect_multi_fragment(name))?;
    let octets = base32::decode_octets(&payload)?;
    let value: serde_json::Value = serde_json::from_slice(&octets).ok()?;
    value.as_object().cloned()
}

/// Look up the record value for `type_name` (e.g. `"TXT"`) encoded in
/// `name`, if present.
#[must_use]
pub fn lookup(name: &str, type_name: &str) -> Option<String> {
    let obj = decode_records(name)?;
    obj.get(type_name)?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_payload(value: &serde_json::Value) -> String {
        base32::encode(&serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn single_fragment_round_trips() {
        let obj = json!({"A": "192.168.1.1", "TXT": "hi"});
        let label = format!("j{}", encode_payload(&obj));
        let name = format!("{label}.example.com");

        assert_eq!(Some("hi".to_string()), lookup(&name, "TXT"));
        assert_eq!(Some("192.168.1.1".to_string()), lookup(&name, "A"));
        assert_eq!(None, lookup(&name, "MX"));
    }

    #[test]
    fn multi_fragment_round_trips_when_split_across_labels() {
        let obj = json!({"A": "192.168.1.1"});
        let payload = encode_payload(&obj);
        let mid = payload.len() / 2;
        let name = format!("j1{}.j2{}.example.com", &payload[..mid], &payload[mid..]);

        assert_eq!(Some("192.168.1.1".to_string()), lookup(&name, "A"));
    }

    #[test]
    fn multi_fragment_rejects_gaps() {
        let obj = json!({"A": "192.168.1.1"});
        let payload = encode_payload(&obj);
        let mid = payload.len() / 2;
        // j1 and j3 present, j2 missing
        let name = format!("j1{}.j3{}.example.com", &payload[..mid], &payload[mid..]);

        assert_eq!(None, decode_records(&name));
    }

    #[test]
    fn leading_j_followed_by_digit_is_not_single_fragment() {
        assert_eq!(None, collect_single_fragment("j1something.example.com"));
    }
}
