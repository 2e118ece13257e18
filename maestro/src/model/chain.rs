//! A chain: the causal pipeline a timer callback triggers.

/// An ordered causal sequence of callbacks sharing a `chain_id`.
///
/// The member list is sorted by callback id ascending; that order is the
/// chain's execution/data-dependency order and the head is always the
/// chain's timer callback (validated at construction).
#[derive(Debug, Clone)]
pub struct Chain {
    /// Unique, stable id; doubles as the index into the chain arena.
    pub id: usize,

    /// Member callback ids, sorted ascending. Head is the timer callback.
    pub callbacks: Vec<usize>,

    /// Chain priority: the priority of its timer callback. `None` until
    /// priority assignment runs.
    pub priority: Option<u32>,

    /// Sum of member WCETs. Informational only.
    pub wcet_sum: u64,
}

impl Chain {
    /// Id of the chain's timer callback (the head of the member list).
    pub fn timer(&self) -> usize {
        self.callbacks[0]
    }
}
