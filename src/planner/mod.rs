//! Crawl planning: which candidate links still need work.
//!
//! The ledger (committed) and the pending queue (in flight) together form a
//! claim set. Planning is a pure set difference over the candidate list, so
//! it can be tested without any of the I/O that fills its inputs.

use crate::models::SeasonDescriptor;
use std::collections::HashSet;

/// Anything identified by a scraped link.
pub trait Claimable {
    fn link(&self) -> &str;
}

impl Claimable for String {
    fn link(&self) -> &str {
        self
    }
}

impl Claimable for &str {
    fn link(&self) -> &str {
        self
    }
}

impl Claimable for SeasonDescriptor {
    fn link(&self) -> &str {
        self.url()
    }
}

/// Links that must not be scheduled again.
#[derive(Debug, Clone, Default)]
pub struct ClaimSet {
    committed: HashSet<String>,
    inflight: HashSet<String>,
}

impl ClaimSet {
    pub fn new(committed: HashSet<String>, inflight: HashSet<String>) -> Self {
        Self {
            committed,
            inflight,
        }
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn plan<T: Claimable>(&self, candidates: impl IntoIterator<Item = T>) -> Vec<T> {
        plan(candidates, &self.committed, &self.inflight)
    }
}

/// `candidates − (committed ∪ inflight)`, in enumeration order.
///
/// A link listed more than once among the candidates is kept only at its
/// first position.
pub fn plan<T: Claimable>(
    candidates: impl IntoIterator<Item = T>,
    committed: &HashSet<String>,
    inflight: &HashSet<String>,
) -> Vec<T> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let link = c.link();
            !committed.contains(link) && !inflight.contains(link) && seen.insert(link.to_string())
        })
        .collect()
}
