//! C1.3/C1.4: Base32-with-`8`-padding address decoding, and the
//! dual-stack composite label.  See SPEC_FULL.md §4.1.3, §4.1.4.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Upper-case a label and replace its trailing run of `8` characters
/// with the standard Base32 pad character `=`.
#[must_use]
pub fn to_standard_alphabet(label: &str) -> String {
    let upper = label.to_ascii_uppercase();
    let trimmed_len = upper.trim_end_matches('8').len();
    let mut out = String::with_capacity(upper.len());
    out.push_str(&upper[..trimmed_len]);
    out.extend(std::iter::repeat('=').take(upper.len() - trimmed_len));
    out
}

/// Decode a Base32-with-`8`-padding label to raw octets, with no
/// length requirement on the result.  Used directly by the JSON-in-name
/// decoder, which accepts a payload of any length.
#[must_use]
pub fn decode_octets(label: &str) -> Option<Vec<u8>> {
    data_encoding::BASE32
        .decode(to_standard_alphabet(label).as_bytes())
        .ok()
}

fn decode(label: &str) -> Option<Vec<u8>> {
    decode_octets(label)
}

/// Decode an 8-character Base32-with-`8`-padding label as an IPv4
/// address candidate.
#[must_use]
pub fn decode_ipv4_label(label: &str) -> Option<Ipv4Addr> {
    if label.len() != 8 {
        return None;
    }
    let octets = decode(label)?;
    <[u8; 4]>::try_from(octets.as_slice())
        .ok()
        .map(Ipv4Addr::from)
}

/// Decode a 32-character Base32-with-`8`-padding label as an IPv6
/// address candidate.
#[must_use]
pub fn decode_ipv6_label(label: &str) -> Option<Ipv6Addr> {
    if label.len() != 32 {
        return None;
    }
    let octets = decode(label)?;
    <[u8; 16]>::try_from(octets.as_slice())
        .ok()
        .map(Ipv6Addr::from)
}

/// Dual-stack composite, A half: the first 8 characters of a label of
/// at least 8 characters.
#[must_use]
pub fn decode_dual_stack_ipv4(label: &str) -> Option<Ipv4Addr> {
    if label.len() < 8 {
        return None;
    }
    decode_ipv4_label(&label[..8])
}

/// Dual-stack composite, AAAA half: everything past the first 8
/// characters of a label of at least 8 characters.
#[must_use]
pub fn decode_dual_stack_ipv6(label: &str) -> Option<Ipv6Addr> {
    if label.len() < 8 {
        return None;
    }
    decode_ipv6_label(&label[8..])
}

/// Encode `octets` as Base32-with-`8`-padding.  Used by the JSON-in-name
/// encoder and by round-trip tests.
#[must_use]
pub fn encode(octets: &[u8]) -> String {
    data_encoding::BASE32.encode(octets).replace('=', "8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_round_trips_through_base32_label() {
        let addr = Ipv4Addr::new(1, 2, 3, 4);
        let label = encode(&addr.octets());
        assert_eq!(8, label.len());
        assert_eq!(Some(addr), decode_ipv4_label(&label));
    }

    #[test]
    fn ipv6_round_trips_through_base32_label() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let label = encode(&addr.octets());
        assert_eq!(32, label.len());
        assert_eq!(Some(addr), decode_ipv6_label(&label));
    }

    #[test]
    fn wrong_decoded_length_is_rejected() {
        // a 16-char label decodes to 10 bytes, neither 4 nor 16
        let label = encode(&[0u8; 10]);
        assert_eq!(None, decode_ipv4_label(&label));
        assert_eq!(None, decode_ipv6_label(&label));
    }

    #[test]
    fn known_vector_aebagba8_decodes_to_1_2_3_4() {
        assert_eq!(
            Some(Ipv4Addr::new(1, 2, 3, 4)),
            decode_ipv4_label("AEBAGBA8")
        );
    }

    #[test]
    fn dual_stack_label_answers_both_questions() {
        let v4 = Ipv4Addr::new(1, 2, 3, 4);
        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let mut combined = Vec::new();
        combined.extend_from_slice(&v4.octets());
        combined.extend_from_slice(&v6.octets());
        let label = encode(&combined);

        assert_eq!(Some(v4), decode_dual_stack_ipv4(&label));
        assert_eq!(Some(v6), decode_dual_stack_ipv6(&label));
    }
}
