//! C2: an immutable, in-memory store of zone records with exact and
//! wildcard lookup.
//!
//! See SPEC_FULL.md §3 and §4.2.

use std::collections::HashMap;

/// The record type tag as it is stored.  A superset of the wire
/// `dns_types::protocol::types::RecordType`: `Alias` and `Aname` are
/// store-level pseudo-types which never reach the wire directly (see
/// `crate::builder`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Kind {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Srv,
    Txt,
    Caa,
    Alias,
    Aname,
    Dname,
    Tlsa,
    Sshfp,
    Naptr,
    Hinfo,
    Loc,
}

impl Kind {
    /// Parse a CSV `type` column value, case-insensitively.
    #[must_use]
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(Kind::A),
            "AAAA" => Some(Kind::Aaaa),
            "CNAME" => Some(Kind::Cname),
            "MX" => Some(Kind::Mx),
            "NS" => Some(Kind::Ns),
            "PTR" => Some(Kind::Ptr),
            "SOA" => Some(Kind::Soa),
            "SRV" => Some(Kind::Srv),
            "TXT" => Some(Kind::Txt),
            "CAA" => Some(Kind::Caa),
            "ALIAS" => Some(Kind::Alias),
            "ANAME" => Some(Kind::Aname),
            "DNAME" => Some(Kind::Dname),
            "TLSA" => Some(Kind::Tlsa),
            "SSHFP" => Some(Kind::Sshfp),
            "NAPTR" => Some(Kind::Naptr),
            "HINFO" => Some(Kind::Hinfo),
            "LOC" => Some(Kind::Loc),
            _ => None,
        }
    }
}

/// An immutable stored record: a parsed CSV row.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
    /// Lowercased, without a trailing dot.  For a wildcard record this is
    /// the `*.parent` pattern as loaded, stripped down to `parent` before
    /// being used as the `wildcard` map key.
    pub name: String,
    pub kind: Kind,
    pub value: String,
    /// 0 means "use the configured default TTL".
    pub ttl: u32,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
}

/// Whether `name` (already lowercased) is a wildcard pattern, and if so,
/// what its parent domain is.
fn wildcard_parent(name: &str) -> Option<&str> {
    name.strip_prefix("*.")
}

/// The record store: two maps from owner-name to ordered records.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RecordStore {
    exact: HashMap<String, Vec<Record>>,
    wildcard: HashMap<String, Vec<Record>>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, lowercasing the name and routing it to the exact
    /// or wildcard map as appropriate.  Duplicates are kept: the caller
    /// (loader) is responsible for preserving natural insertion order.
    pub fn insert(&mut self, mut record: Record) {
        record.name = record.name.to_ascii_lowercase();

        if let Some(parent) = wildcard_parent(&record.name) {
            let parent = parent.to_string();
            self.wildcard.entry(parent).or_default().push(record);
        } else {
            self.exact.entry(record.name.clone()).or_default().push(record);
        }
    }

    /// Exact-match lookup only (step 1 of C2).
    #[must_use]
    pub fn exact(&self, name: &str) -> &[Record] {
        self.exact
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Ancestor wildcard lookup (step 2 of C2): walk the name's
    /// ancestors, nearest first, stopping at the first ancestor with any
    /// wildcard records.  An "ancestor" here means dropping one leading
    /// label at a time until at least two labels remain, matching
    /// `*.a.b` requiring a two-label parent.
    #[must_use]
    pub fn wildcard(&self, name: &str) -> &[Record] {
        for ancestor in ancestors(&name.to_ascii_lowercase()) {
            let hit = self.wildcard.get(ancestor).map_or(&[][..], Vec::as_slice);
            if !hit.is_empty() {
                return hit;
            }
        }
        &[]
    }

    /// Any record (of any kind) stored under `name`, exact match only.
    /// Used by the response composer to decide whether a domain "has any
    /// record in the store" for authority-section purposes.
    #[must_use]
    pub fn has_any(&self, name: &str) -> bool {
        !self.exact(name).is_empty()
    }

    /// Ancestor SOA lookup for negative responses (C5): nearest-first,
    /// first ancestor (or the name itself) with a stored SOA record.
    #[must_use]
    pub fn nearest_soa(&self, name: &str) -> Option<&Record> {
        let lower = name.to_ascii_lowercase();
        std::iter::once(lower.as_str())
            .chain(ancestors(&lower))
            .find_map(|candidate| {
                self.exact(candidate)
                    .iter()
                    .find(|r| r.kind == Kind::Soa)
            })
    }
}

/// Ancestors of `name`, nearest first, stopping once fewer than two
/// labels would remain.  `www.a.example.com` yields `a.example.com`,
/// `example.com` (but not `com`, since that's a single label).
fn ancestors(name: &str) -> impl Iterator<Item = &str> {
    let labels: Vec<&str> = name.split('.').collect();
    (1..labels.len().saturating_sub(1)).map(move |i| {
        // SAFETY-equivalent: i in 1..len-1 always leaves a valid suffix
        let start = labels[..i].iter().map(|l| l.len() + 1).sum::<usize>();
        &name[start..]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, kind: Kind, value: &str) -> Record {
        Record {
            name: name.to_string(),
            kind,
            value: value.to_string(),
            ttl: 0,
            priority: 0,
            weight: 0,
            port: 0,
        }
    }

    #[test]
    fn exact_lookup_finds_inserted_record() {
        let mut store = RecordStore::new();
        store.insert(rec("example.com", Kind::A, "192.168.1.1"));
        assert_eq!(1, store.exact("example.com").len());
        assert_eq!(1, store.exact("EXAMPLE.COM").len());
        assert!(store.exact("other.com").is_empty());
    }

    #[test]
    fn wildcard_lookup_walks_ancestors_nearest_first() {
        let mut store = RecordStore::new();
        store.insert(rec("*.example.com", Kind::A, "192.168.1.2"));
        assert_eq!(1, store.wildcard("sub.example.com").len());
        assert_eq!(1, store.wildcard("deep.sub.example.com").len());
        assert!(store.wildcard("example.com").is_empty());
    }

    #[test]
    fn exact_match_shadows_wildcard_by_caller_contract() {
        // the store itself doesn't enforce this - C4 does, by only
        // falling back to `wildcard` when `exact` is empty. This test
        // documents that both maps can coexist independently.
        let mut store = RecordStore::new();
        store.insert(rec("www.example.com", Kind::A, "10.0.0.1"));
        store.insert(rec("*.example.com", Kind::A, "192.168.1.2"));
        assert_eq!(1, store.exact("www.example.com").len());
        assert_eq!(1, store.wildcard("www.example.com").len());
    }

    #[test]
    fn nearest_soa_finds_closest_ancestor() {
        let mut store = RecordStore::new();
        store.insert(rec(
            "example.com",
            Kind::Soa,
            "ns1.example.com. admin.example.com. 1 3600 1800 604800 86400",
        ));
        let found = store.nearest_soa("nonexistent.example.com").unwrap();
        assert_eq!("example.com", found.name);
    }

    #[test]
    fn duplicates_preserve_insertion_order() {
        let mut store = RecordStore::new();
        store.insert(rec("example.com", Kind::A, "1.1.1.1"));
        store.insert(rec("example.com", Kind::A, "2.2.2.2"));
        let values: Vec<&str> = store
            .exact("example.com")
            .iter()
            .map(|r| r.value.as_str())
            .collect();
        assert_eq!(vec!["1.1.1.1", "2.2.2.2"], values);
    }
}
