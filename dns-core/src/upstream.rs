//! C8: the resolver-client capability used by ALIAS/ANAME records.
//!
//! This is deliberately the only way `dns-core` touches anything
//! upstream: a single `resolve` operation, so tests can substitute a
//! deterministic stub without any network code (SPEC_FULL.md §4.8, §9).

use std::time::Duration;

use dns_types::protocol::types::{DomainName, QueryType, ResourceRecord};

/// A conservative, implementation-chosen deadline for upstream
/// resolution.  Not externally configurable (SPEC_FULL.md §5).
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(500);

/// A single upstream lookup.  Implementations are expected to apply
/// their own bounding; `dns-core` additionally wraps every call in
/// [`UPSTREAM_TIMEOUT`] via [`resolve_with_timeout`].
pub trait UpstreamResolver {
    async fn resolve(&self, name: &DomainName, qtype: QueryType) -> Vec<ResourceRecord>;
}

/// Call `resolver.resolve`, treating a timeout as "no records" per
/// SPEC_FULL.md §7 ("no retries ... builder returns nothing").
pub async fn resolve_with_timeout<U: UpstreamResolver>(
    resolver: &U,
    name: &DomainName,
    qtype: QueryType,
) -> Vec<ResourceRecord> {
    match tokio::time::timeout(UPSTREAM_TIMEOUT, resolver.resolve(name, qtype)).await {
        Ok(rrs) => rrs,
        Err(_) => {
            tracing::debug!(%name, %qtype, "upstream resolution timed out");
            Vec::new()
        }
    }
}

/// A deterministic stub for tests: a fixed table of `(name, qtype) ->
/// answers`.
#[derive(Debug, Default, Clone)]
pub struct StubResolver {
    responses: std::collections::HashMap<(String, String), Vec<ResourceRecord>>,
}

impl StubResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, qtype: QueryType, answers: Vec<ResourceRecord>) -> Self {
        self.responses
            .insert((name.to_ascii_lowercase(), qtype.to_string()), answers);
        self
    }
}

impl UpstreamResolver for StubResolver {
    async fn resolve(&self, name: &DomainName, qtype: QueryType) -> Vec<ResourceRecord> {
        self.responses
            .get(&(name.to_dotted_string().trim_end_matches('.').to_ascii_lowercase(), qtype.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
