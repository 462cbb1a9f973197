//! C1.1/C1.2: direct IPv4/IPv6 reflection.  See SPEC_FULL.md §4.1.1,
//! §4.1.2.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Direct IPv4 reflection: the first four dot-separated labels, taken
/// together, are a dotted-quad address.
#[must_use]
pub fn reflect_ipv4(name: &str) -> Option<Ipv4Addr> {
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 4 {
        return None;
    }
    labels[..4].join(".").parse().ok()
}

/// Direct IPv6 reflection: the first label, decoded as either a full
/// eight-group or a single-`z`-compressed address.  Hyphen is the
/// primary group separator; underscore and (across label boundaries)
/// dot are tried only once the primary split fails to decode.
#[must_use]
pub fn reflect_ipv6(name: &str) -> Option<Ipv6Addr> {
    let labels: Vec<&str> = name.split('.').collect();
    let first = labels.first()?;

    if let Some(addr) = decode_hyphen_or_underscore(first, '-') {
        return Some(addr);
    }
    if let Some(addr) = decode_hyphen_or_underscore(first, '_') {
        return Some(addr);
    }
    if labels.len() >= 8 {
        if let Some(groups) = expand_groups(&labels[..8]) {
            return accept_ipv6(groups);
        }
    }
    None
}

fn decode_hyphen_or_underscore(label: &str, sep: char) -> Option<Ipv6Addr> {
    let tokens: Vec<&str> = label.split(sep).collect();
    if tokens.len() == 1 {
        return None;
    }
    expand_groups(&tokens).and_then(accept_ipv6)
}

fn accept_ipv6(groups: [u16; 8]) -> Option<Ipv6Addr> {
    let addr = Ipv6Addr::new(
        groups[0], groups[1], groups[2], groups[3], groups[4], groups[5], groups[6], groups[7],
    );
    if addr.to_ipv4_mapped().is_some() {
        None
    } else {
        Some(addr)
    }
}

/// Expand a token list (either 8 plain hex groups, or ≤7 groups plus
/// exactly one `z` token standing in for the all-zero run) into 8
/// `u16` groups.
fn expand_groups(tokens: &[&str]) -> Option<[u16; 8]> {
    if tokens.len() == 8 && !tokens.contains(&"z") {
        let mut out = [0u16; 8];
        for (i, t) in tokens.iter().enumerate() {
            out[i] = parse_hex_group(t)?;
        }
        return Some(out);
    }

    let z_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, &t)| t == "z")
        .map(|(i, _)| i)
        .collect();
    if z_positions.len() != 1 {
        return None;
    }
    let pos = z_positions[0];
    let before = &tokens[..pos];
    let after = &tokens[pos + 1..];
    if before.len() + after.len() > 7 {
        return None;
    }
    let zeros = 8 - (before.len() + after.len());

    let mut out = [0u16; 8];
    let mut idx = 0;
    for t in before {
        out[idx] = parse_hex_group(t)?;
        idx += 1;
    }
    idx += zeros;
    for t in after {
        out[idx] = parse_hex_group(t)?;
        idx += 1;
    }
    Some(out)
}

fn parse_hex_group(s: &str) -> Option<u16> {
    if s.is_empty() || s.len() > 4 {
        return None;
    }
    u16::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_reflects_from_first_four_labels() {
        assert_eq!(
            Some(Ipv4Addr::new(10, 0, 0, 1)),
            reflect_ipv4("10.0.0.1.anything.tld")
        );
    }

    #[test]
    fn ipv4_requires_four_labels() {
        assert_eq!(None, reflect_ipv4("10.0.0"));
    }

    #[test]
    fn ipv6_full_eight_group_hyphenated() {
        let addr: Ipv6Addr = "2001:db8:85a3:0:0:8a2e:370:7334".parse().unwrap();
        assert_eq!(
            Some(addr),
            reflect_ipv6("2001-db8-85a3-0-0-8a2e-370-7334.example.com")
        );
    }

    #[test]
    fn ipv6_z_compressed() {
        let addr: Ipv6Addr = "2001:db8:85a3::8a2e:370:7334".parse().unwrap();
        assert_eq!(
            Some(addr),
            reflect_ipv6("2001-db8-85a3-z-8a2e-370-7334.example.com")
        );
    }

    #[test]
    fn ipv6_rejects_multiple_z_tokens() {
        assert_eq!(None, reflect_ipv6("z-db8-z-8a2e.example.com"));
    }

    #[test]
    fn ipv6_rejects_mapped_ipv4() {
        // ::ffff:1.2.3.4
        assert_eq!(None, reflect_ipv6("0-0-0-0-0-ffff-102-304.example.com"));
    }
}
