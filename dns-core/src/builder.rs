//! C3: turn one stored record into a wire-format resource record, with
//! per-type value parsing.  See SPEC_FULL.md §4.3.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::Bytes;
use dns_types::protocol::types::{
    DomainName, QueryType, RecordClass, RecordType, RecordTypeWithData, ResourceRecord,
};

use crate::store::{Kind, Record, RecordStore};
use crate::upstream::{resolve_with_timeout, UpstreamResolver};

/// Build a resource record from a stored record, for the given owner
/// name and query type.  Returns `None` if the record's type does not
/// accept this query type, or if its value fails to parse.
pub async fn build<U: UpstreamResolver>(
    record: &Record,
    qname: &DomainName,
    qtype: QueryType,
    default_ttl: u32,
    store: &RecordStore,
    upstream: &U,
) -> Option<ResourceRecord> {
    let ttl = if record.ttl == 0 { default_ttl } else { record.ttl };
    let a_or_aaaa_or_cname = matches!(
        qtype,
        QueryType::Record(RecordType::A)
            | QueryType::Record(RecordType::AAAA)
            | QueryType::Record(RecordType::CNAME)
    );

    let rtype_with_data = match record.kind {
        Kind::A if qtype == QueryType::Record(RecordType::A) => RecordTypeWithData::A {
            address: record.value.parse::<Ipv4Addr>().ok()?,
        },
        Kind::Aaaa if qtype == QueryType::Record(RecordType::AAAA) => RecordTypeWithData::AAAA {
            address: record.value.parse::<Ipv6Addr>().ok()?,
        },
        Kind::Cname if a_or_aaaa_or_cname => RecordTypeWithData::CNAME {
            cname: fqdn(&record.value)?,
        },
        Kind::Mx if qtype == QueryType::Record(RecordType::MX) => RecordTypeWithData::MX {
            preference: record.priority,
            exchange: fqdn(&record.value)?,
        },
        Kind::Ns if qtype == QueryType::Record(RecordType::NS) => RecordTypeWithData::NS {
            nsdname: fqdn(&record.value)?,
        },
        Kind::Ptr if qtype == QueryType::Record(RecordType::PTR) => RecordTypeWithData::PTR {
            ptrdname: fqdn(&record.value)?,
        },
        Kind::Dname if qtype == QueryType::Record(RecordType::DNAME) => RecordTypeWithData::DNAME {
            target: fqdn(&record.value)?,
        },
        Kind::Soa if qtype == QueryType::Record(RecordType::SOA) => build_soa(&record.value)?,
        Kind::Srv if qtype == QueryType::Record(RecordType::SRV) => RecordTypeWithData::SRV {
            priority: record.priority,
            weight: record.weight,
            port: record.port,
            target: fqdn(&record.value)?,
        },
        Kind::Txt if qtype == QueryType::Record(RecordType::TXT) => RecordTypeWithData::TXT {
            octets: Bytes::from(record.value.clone().into_bytes()),
        },
        Kind::Caa if qtype == QueryType::Record(RecordType::CAA) => build_caa(&record.value)?,
        Kind::Tlsa if qtype == QueryType::Record(RecordType::TLSA) => build_tlsa(&record.value)?,
        Kind::Sshfp if qtype == QueryType::Record(RecordType::SSHFP) => {
            build_sshfp(&record.value)?
        }
        Kind::Naptr if qtype == QueryType::Record(RecordType::NAPTR) => {
            build_naptr(&record.value)?
        }
        Kind::Hinfo if qtype == QueryType::Record(RecordType::HINFO) => build_hinfo(&record.value)?,
        Kind::Loc if qtype == QueryType::Record(RecordType::LOC) => RecordTypeWithData::LOC {
            octets: Bytes::new(),
        },
        Kind::Alias => return build_alias(record, qname, qtype, upstream).await,
        Kind::Aname if qtype == QueryType::Record(RecordType::A) => {
            return build_aname(record, qname, default_ttl, store, upstream).await
        }
        _ => return None,
    };

    Some(ResourceRecord {
        name: qname.clone(),
        rtype_with_data,
        rclass: RecordClass::IN,
        ttl,
    })
}

fn fqdn(value: &str) -> Option<DomainName> {
    if value.ends_with('.') {
        DomainName::from_dotted_string(value)
    } else {
        DomainName::from_dotted_string(&format!("{value}."))
    }
}

fn build_soa(value: &str) -> Option<RecordTypeWithData> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let [mname, rname, serial, refresh, retry, expire, minimum] = tokens[..] else {
        return None;
    };
    Some(RecordTypeWithData::SOA {
        mname: fqdn(mname)?,
        rname: fqdn(rname)?,
        serial: serial.parse().ok()?,
        refresh: refresh.parse().ok()?,
        retry: retry.parse().ok()?,
        expire: expire.parse().ok()?,
        minimum: minimum.parse().ok()?,
    })
}

fn build_caa(value: &str) -> Option<RecordTypeWithData> {
    let mut parts = value.splitn(3, ' ');
    let flags: u8 = parts.next()?.trim().parse().ok()?;
    let tag = parts.next()?.trim();
    let val = parts.next()?.trim();
    Some(RecordTypeWithData::CAA {
        flags,
        tag: Bytes::from(tag.to_string().into_bytes()),
        value: Bytes::from(val.to_string().into_bytes()),
    })
}

fn build_tlsa(value: &str) -> Option<RecordTypeWithData> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let [usage, selector, matching_type, cert_hex] = tokens[..] else {
        return None;
    };
    Some(RecordTypeWithData::TLSA {
        usage: usage.parse().ok()?,
        selector: selector.parse().ok()?,
        matching_type: matching_type.parse().ok()?,
        cert_data: Bytes::from(decode_hex(cert_hex)?),
    })
}

fn build_sshfp(value: &str) -> Option<RecordTypeWithData> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let [algorithm, fp_type, fingerprint] = tokens[..] else {
        return None;
    };
    Some(RecordTypeWithData::SSHFP {
        algorithm: algorithm.parse().ok()?,
        fp_type: fp_type.parse().ok()?,
        fingerprint: Bytes::from(decode_hex(fingerprint)?),
    })
}

fn build_hinfo(value: &str) -> Option<RecordTypeWithData> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    let [cpu, os] = tokens[..] else {
        return None;
    };
    Some(RecordTypeWithData::HINFO {
        cpu: Bytes::from(cpu.to_string().into_bytes()),
        os: Bytes::from(os.to_string().into_bytes()),
    })
}

/// `order pref "flags" "service" "regexp" replacement`, quotes
/// stripped.
fn build_naptr(value: &str) -> Option<RecordTypeWithData> {
    let tokens = tokenize_quoted(value);
    let [order, preference, flags, services, regexp, replacement] = &tokens[..] else {
        return None;
    };
    Some(RecordTypeWithData::NAPTR {
        order: order.parse().ok()?,
        preference: preference.parse().ok()?,
        flags: Bytes::from(flags.clone().into_bytes()),
        services: Bytes::from(services.clone().into_bytes()),
        regexp: Bytes::from(regexp.clone().into_bytes()),
        replacement: fqdn(replacement)?,
    })
}

fn tokenize_quoted(value: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = value.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' {
            chars.next();
            let mut tok = String::new();
            for c2 in chars.by_ref() {
                if c2 == '"' {
                    break;
                }
                tok.push(c2);
            }
            tokens.push(tok);
        } else {
            let mut tok = String::new();
            while let Some(&c2) = chars.peek() {
                if c2.is_whitespace() {
                    break;
                }
                tok.push(c2);
                chars.next();
            }
            tokens.push(tok);
        }
    }
    tokens
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        #[allow(clippy::cast_possible_truncation)]
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

/// Check that `value` matches its `kind`'s grammar (§4.3), independent of
/// query type or owner name.  Used by the CSV loader to reject a malformed
/// row at load time rather than have the builder silently drop it at every
/// future query.
pub(crate) fn validate_value(kind: Kind, value: &str) -> Result<(), String> {
    let ok = match kind {
        Kind::A => value.parse::<Ipv4Addr>().is_ok(),
        Kind::Aaaa => value.parse::<Ipv6Addr>().is_ok(),
        Kind::Cname | Kind::Ns | Kind::Ptr | Kind::Dname | Kind::Mx | Kind::Alias | Kind::Aname => {
            fqdn(value).is_some()
        }
        Kind::Soa => build_soa(value).is_some(),
        Kind::Srv => fqdn(value).is_some(),
        Kind::Txt | Kind::Loc => true,
        Kind::Caa => build_caa(value).is_some(),
        Kind::Tlsa => build_tlsa(value).is_some(),
        Kind::Sshfp => build_sshfp(value).is_some(),
        Kind::Naptr => build_naptr(value).is_some(),
        Kind::Hinfo => build_hinfo(value).is_some(),
    };

    if ok {
        Ok(())
    } else {
        Err(format!("value {value:?} does not match the {kind:?} grammar"))
    }
}

const ALIAS_ACCEPTABLE: [RecordType; 5] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::MX,
    RecordType::TXT,
];

async fn build_alias<U: UpstreamResolver>(
    record: &Record,
    qname: &DomainName,
    qtype: QueryType,
    upstream: &U,
) -> Option<ResourceRecord> {
    let target = fqdn(&record.value)?;
    let answers = resolve_with_timeout(upstream, &target, qtype).await;
    let rr = answers
        .into_iter()
        .find(|rr| ALIAS_ACCEPTABLE.contains(&rr.rtype_with_data.rtype()))?;
    Some(ResourceRecord {
        name: qname.clone(),
        rtype_with_data: rr.rtype_with_data,
        rclass: rr.rclass,
        ttl: rr.ttl,
    })
}

/// ANAME accepts only A queries: prefers a matching in-store A record
/// for the target over the upstream lookup (SPEC_FULL.md §4.3).
async fn build_aname<U: UpstreamResolver>(
    record: &Record,
    qname: &DomainName,
    default_ttl: u32,
    store: &RecordStore,
    upstream: &U,
) -> Option<ResourceRecord> {
    let target_name = record.value.trim_end_matches('.').to_ascii_lowercase();
    let target = fqdn(&record.value)?;

    if let Some(local) = store
        .exact(&target_name)
        .iter()
        .find(|r| r.kind == Kind::A)
    {
        let ttl = if local.ttl != 0 {
            local.ttl
        } else if record.ttl != 0 {
            record.ttl
        } else {
            default_ttl
        };
        return Some(ResourceRecord {
            name: qname.clone(),
            rtype_with_data: RecordTypeWithData::A {
                address: local.value.parse().ok()?,
            },
            rclass: RecordClass::IN,
            ttl,
        });
    }

    let answers =
        resolve_with_timeout(upstream, &target, QueryType::Record(RecordType::A)).await;
    let rr = answers
        .into_iter()
        .find(|rr| rr.rtype_with_data.rtype() == RecordType::A)?;
    Some(ResourceRecord {
        name: qname.clone(),
        rtype_with_data: rr.rtype_with_data,
        rclass: rr.rclass,
        ttl: rr.ttl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::StubResolver;

    fn rec(kind: Kind, value: &str) -> Record {
        Record {
            name: "example.com".to_string(),
            kind,
            value: value.to_string(),
            ttl: 0,
            priority: 0,
            weight: 0,
            port: 0,
        }
    }

    fn name(s: &str) -> DomainName {
        DomainName::from_dotted_string(s).unwrap()
    }

    #[tokio::test]
    async fn a_record_builds_for_a_query() {
        let store = RecordStore::new();
        let upstream = StubResolver::new();
        let r = rec(Kind::A, "192.168.1.1");
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::A),
            300,
            &store,
            &upstream,
        )
        .await
        .unwrap();
        assert_eq!(
            RecordTypeWithData::A {
                address: "192.168.1.1".parse().unwrap()
            },
            rr.rtype_with_data
        );
    }

    #[tokio::test]
    async fn a_record_does_not_build_for_txt_query() {
        let store = RecordStore::new();
        let upstream = StubResolver::new();
        let r = rec(Kind::A, "192.168.1.1");
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::TXT),
            300,
            &store,
            &upstream,
        )
        .await;
        assert!(rr.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_uses_default() {
        let store = RecordStore::new();
        let upstream = StubResolver::new();
        let r = rec(Kind::A, "192.168.1.1");
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::A),
            42,
            &store,
            &upstream,
        )
        .await
        .unwrap();
        assert_eq!(42, rr.ttl);
    }

    #[tokio::test]
    async fn aname_accepts_only_a_queries() {
        let store = RecordStore::new();
        let upstream = StubResolver::new();
        let r = rec(Kind::Aname, "target.example.com");
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::AAAA),
            300,
            &store,
            &upstream,
        )
        .await;
        assert!(rr.is_none());
    }

    #[tokio::test]
    async fn alias_rewrites_upstream_answer_to_owner_name() {
        let upstream_rr = ResourceRecord {
            name: name("target.example.com."),
            rtype_with_data: RecordTypeWithData::A {
                address: "1.2.3.4".parse().unwrap(),
            },
            rclass: RecordClass::IN,
            ttl: 60,
        };
        let upstream = StubResolver::new().with(
            "target.example.com",
            QueryType::Record(RecordType::A),
            vec![upstream_rr],
        );
        let store = RecordStore::new();
        let r = rec(Kind::Alias, "target.example.com");
        let rr = build(
            &r,
            &name("www.example.com."),
            QueryType::Record(RecordType::A),
            300,
            &store,
            &upstream,
        )
        .await
        .unwrap();
        assert_eq!("www.example.com", rr.name.to_dotted_string());
        assert_eq!(
            RecordTypeWithData::A {
                address: "1.2.3.4".parse().unwrap()
            },
            rr.rtype_with_data
        );
    }

    #[tokio::test]
    async fn aname_prefers_in_store_record_over_upstream() {
        let mut store = RecordStore::new();
        store.insert(rec(Kind::A, "10.0.0.9"));
        let mut target_rec = rec(Kind::A, "10.0.0.9");
        target_rec.name = "target.example.com".to_string();
        store.insert(target_rec);

        let upstream_rr = ResourceRecord {
            name: name("target.example.com."),
            rtype_with_data: RecordTypeWithData::A {
                address: "9.9.9.9".parse().unwrap(),
            },
            rclass: RecordClass::IN,
            ttl: 60,
        };
        let upstream = StubResolver::new().with(
            "target.example.com",
            QueryType::Record(RecordType::A),
            vec![upstream_rr],
        );

        let r = rec(Kind::Aname, "target.example.com");
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::A),
            300,
            &store,
            &upstream,
        )
        .await
        .unwrap();
        assert_eq!(
            RecordTypeWithData::A {
                address: "10.0.0.9".parse().unwrap()
            },
            rr.rtype_with_data
        );
    }

    #[tokio::test]
    async fn aname_local_record_zero_ttl_falls_back_to_default_ttl() {
        let mut store = RecordStore::new();
        let mut target_rec = rec(Kind::A, "10.0.0.9");
        target_rec.name = "target.example.com".to_string();
        store.insert(target_rec);
        let upstream = StubResolver::new();

        let mut r = rec(Kind::Aname, "target.example.com");
        r.ttl = 0;
        let rr = build(
            &r,
            &name("example.com."),
            QueryType::Record(RecordType::A),
            300,
            &store,
            &upstream,
        )
        .await
        .unwrap();
        assert_eq!(300, rr.ttl);
    }

    #[test]
    fn validate_value_accepts_well_formed_a() {
        assert!(validate_value(Kind::A, "192.168.1.1").is_ok());
    }

    #[test]
    fn validate_value_rejects_malformed_a() {
        assert!(validate_value(Kind::A, "not-an-ip").is_err());
    }

    #[test]
    fn validate_value_rejects_malformed_soa() {
        assert!(validate_value(Kind::Soa, "too few tokens").is_err());
    }
}
