//! C5: builds the reply message from accumulated answers.  See
//! SPEC_FULL.md §4.5.

use dns_types::protocol::types::{
    DomainName, Message, QueryType, RecordClass, RecordType, RecordTypeWithData, ResourceRecord,
};

use crate::resolver::Resolved;
use crate::store::{Kind, RecordStore};

/// Finish a response skeleton (as produced by `Message::make_response`)
/// given the resolver's result for each of its questions.
///
/// `answers` must be in question order, one `Resolved` per question,
/// matching `response.questions`.
pub fn compose(mut response: Message, answers: Vec<Resolved>, store: &RecordStore, default_ttl: u32) -> Message {
    response.header.is_authoritative = true;

    let owners: Vec<String> = answers.iter().map(|a| a.owner.clone()).collect();
    let flat: Vec<ResourceRecord> = answers.into_iter().flat_map(|a| a.records).collect();
    let has_cname_answer = flat
        .iter()
        .any(|rr| rr.rtype_with_data.rtype() == RecordType::CNAME);
    let answers_cname_question = response
        .questions
        .iter()
        .any(|q| q.qtype == QueryType::Record(RecordType::CNAME));
    let suppress_authority = has_cname_answer || answers_cname_question;

    response.answers = flat;

    if response.answers.is_empty() {
        negative_response(&mut response, store);
    } else if !suppress_authority {
        positive_authority(&mut response, store, default_ttl, &owners);
    }

    response
}

/// `owners` is the owner domain that actually produced each question's
/// answers (the exact queried name, or a wildcard's ancestor), not
/// necessarily the literal queried name - see `resolver::Resolved`.
fn positive_authority(response: &mut Message, store: &RecordStore, default_ttl: u32, owners: &[String]) {
    for (question, owner) in response.questions.iter().zip(owners) {
        if !store.has_any(owner) {
            continue;
        }

        let Some(ns_name) = DomainName::from_dotted_string(&format!("ns1.{owner}.")) else {
            continue;
        };
        response.authority.push(ResourceRecord {
            name: question.name.clone(),
            rtype_with_data: RecordTypeWithData::NS {
                nsdname: ns_name.clone(),
            },
            rclass: RecordClass::IN,
            ttl: default_ttl,
        });

        let glue_name = format!("ns1.{owner}");
        if let Some(glue) = store.exact(&glue_name).iter().find(|r| r.kind == Kind::A) {
            if let Ok(address) = glue.value.parse() {
                response.additional.push(ResourceRecord {
                    name: ns_name,
                    rtype_with_data: RecordTypeWithData::A { address },
                    rclass: RecordClass::IN,
                    ttl: if glue.ttl == 0 { default_ttl } else { glue.ttl },
                });
            }
        }
    }
}

fn negative_response(response: &mut Message, store: &RecordStore) {
    let mut found_soa = false;
    let mut all_wildcard = true;

    for question in &response.questions {
        let owner = question.name.to_dotted_string();
        let owner = owner.trim_end_matches('.').to_ascii_lowercase();
        if !owner.starts_with("*.") {
            all_wildcard = false;
        }
        if let Some(soa) = store.nearest_soa(&owner) {
            if let Some(rr) = soa_to_rr(soa) {
                response.authority.push(rr);
                found_soa = true;
            }
        }
    }

    if found_soa && !all_wildcard {
        response.header.rcode = dns_types::protocol::types::Rcode::NameError;
    }
}

fn soa_to_rr(soa: &crate::store::Record) -> Option<ResourceRecord> {
    let tokens: Vec<&str> = soa.value.split_whitespace().collect();
    let [mname, rname, serial, refresh, retry, expire, minimum] = tokens[..] else {
        return None;
    };
    let owner = DomainName::from_dotted_string(&format!("{}.", soa.name))?;
    Some(ResourceRecord {
        name: owner,
        rtype_with_data: RecordTypeWithData::SOA {
            mname: fqdn(mname)?,
            rname: fqdn(rname)?,
            serial: serial.parse().ok()?,
            refresh: refresh.parse().ok()?,
            retry: retry.parse().ok()?,
            expire: expire.parse().ok()?,
            minimum: minimum.parse().ok()?,
        },
        rclass: RecordClass::IN,
        ttl: soa.ttl,
    })
}

fn fqdn(value: &str) -> Option<DomainName> {
    if value.ends_with('.') {
        DomainName::from_dotted_string(value)
    } else {
        DomainName::from_dotted_string(&format!("{value}."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::{Header, Opcode, QueryClass, Question, Rcode};
    use crate::store::Record;

    fn name(s: &str) -> DomainName {
        DomainName::from_dotted_string(s).unwrap()
    }

    fn skeleton(qname: &str, qtype: QueryType) -> Message {
        Message {
            header: Header {
                id: 1,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: name(qname),
                qtype,
                qclass: QueryClass::Record(RecordClass::IN),
            }],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    fn rec(n: &str, kind: Kind, value: &str) -> Record {
        Record {
            name: n.to_string(),
            kind,
            value: value.to_string(),
            ttl: 0,
            priority: 0,
            weight: 0,
            port: 0,
        }
    }

    fn resolved(owner: &str, records: Vec<ResourceRecord>) -> Resolved {
        Resolved {
            records,
            owner: owner.to_string(),
        }
    }

    #[test]
    fn positive_answer_gets_ns_and_glue() {
        let mut store = RecordStore::new();
        store.insert(rec("example.com", Kind::A, "192.168.1.1"));
        store.insert(rec("ns1.example.com", Kind::A, "192.168.1.10"));

        let response = skeleton("example.com.", QueryType::Record(RecordType::A));
        let answer = ResourceRecord {
            name: name("example.com."),
            rtype_with_data: RecordTypeWithData::A {
                address: "192.168.1.1".parse().unwrap(),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        let composed = compose(response, vec![resolved("example.com", vec![answer])], &store, 300);

        assert!(composed.header.is_authoritative);
        assert_eq!(Rcode::NoError, composed.header.rcode);
        assert_eq!(1, composed.authority.len());
        assert_eq!(1, composed.additional.len());
    }

    /// Concrete scenario 3: a wildcard-matched answer still gets the
    /// owner domain's NS authority record, using the wildcard's
    /// ancestor as the owner rather than the literal queried name.
    #[test]
    fn wildcard_answer_gets_ns_from_ancestor_owner() {
        let mut store = RecordStore::new();
        store.insert(rec("*.example.com", Kind::A, "192.168.1.2"));
        store.insert(rec("ns1.example.com", Kind::A, "192.168.1.10"));

        let response = skeleton("sub.example.com.", QueryType::Record(RecordType::A));
        let answer = ResourceRecord {
            name: name("sub.example.com."),
            rtype_with_data: RecordTypeWithData::A {
                address: "192.168.1.2".parse().unwrap(),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        let composed = compose(response, vec![resolved("example.com", vec![answer])], &store, 300);

        assert_eq!(1, composed.authority.len());
        assert_eq!(1, composed.additional.len());
    }

    #[test]
    fn cname_answer_suppresses_authority() {
        let mut store = RecordStore::new();
        store.insert(rec("www.example.com", Kind::Cname, "example.com"));

        let response = skeleton("www.example.com.", QueryType::Record(RecordType::A));
        let answer = ResourceRecord {
            name: name("www.example.com."),
            rtype_with_data: RecordTypeWithData::CNAME {
                cname: name("example.com."),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        let composed = compose(response, vec![resolved("www.example.com", vec![answer])], &store, 300);

        assert!(composed.authority.is_empty());
        assert!(composed.additional.is_empty());
    }

    #[test]
    fn empty_answer_with_ancestor_soa_is_nxdomain() {
        let mut store = RecordStore::new();
        store.insert(rec(
            "example.com",
            Kind::Soa,
            "ns1.example.com. admin.example.com. 2025050801 3600 1800 604800 86400",
        ));

        let response = skeleton(
            "nonexistent.example.com.",
            QueryType::Record(RecordType::A),
        );
        let composed = compose(
            response,
            vec![resolved("nonexistent.example.com", Vec::new())],
            &store,
            300,
        );

        assert_eq!(Rcode::NameError, composed.header.rcode);
        assert_eq!(1, composed.authority.len());
    }

    #[test]
    fn empty_answer_with_no_soa_stays_noerror() {
        let store = RecordStore::new();
        let response = skeleton("nonexistent.example.com.", QueryType::Record(RecordType::A));
        let composed = compose(
            response,
            vec![resolved("nonexistent.example.com", Vec::new())],
            &store,
            300,
        );

        assert_eq!(Rcode::NoError, composed.header.rcode);
        assert!(composed.authority.is_empty());
    }

    #[test]
    fn wildcard_query_name_never_gets_nxdomain() {
        let mut store = RecordStore::new();
        store.insert(rec(
            "example.com",
            Kind::Soa,
            "ns1.example.com. admin.example.com. 1 3600 1800 604800 86400",
        ));
        let response = skeleton("*.example.com.", QueryType::Record(RecordType::A));
        let composed = compose(
            response,
            vec![resolved("*.example.com", Vec::new())],
            &store,
            300,
        );
        assert_eq!(Rcode::NoError, composed.header.rcode);
    }
}
