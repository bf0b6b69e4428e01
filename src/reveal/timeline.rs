/// Pending actions ordered by due time, then by scheduling order.
///
/// Nothing runs by itself: the owner calls [`Timeline::pop_due`] with its
/// notion of "now", which keeps staged reveals deterministic under test.
#[derive(Debug, Clone)]
pub struct Timeline<A> {
    pending: Vec<Pending<A>>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Pending<A> {
    due_ms: u64,
    seq: u64,
    action: A,
}

impl<A> Default for Timeline<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            seq: 0,
        }
    }
}

impl<A> Timeline<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, action: A) {
        let seq = self.seq;
        self.seq += 1;
        let at = self
            .pending
            .partition_point(|p| (p.due_ms, p.seq) <= (due_ms, seq));
        self.pending.insert(at, Pending { due_ms, seq, action });
    }

    /// Schedule `(delay, action)` pairs relative to `now_ms`.
    pub fn schedule_all(&mut self, now_ms: u64, plan: impl IntoIterator<Item = (u64, A)>) {
        for (delay, action) in plan {
            self.schedule(now_ms.saturating_add(delay), action);
        }
    }

    /// Remove and return every action due at or before `now_ms`, in order.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<A> {
        let split = self.pending.partition_point(|p| p.due_ms <= now_ms);
        self.pending.drain(..split).map(|p| p.action).collect()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.first().map(|p| p.due_ms)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
