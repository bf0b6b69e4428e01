use serde::{Deserialize, Serialize};

/// Reveal state of one card with itemized details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReveal {
    pub visible: bool,
    pub has_animated: bool,
    pub details_visible: Vec<bool>,
    /// Sticky: the staggered detail sequence only ever runs once.
    stagger_started: bool,
}

/// What entering the viewport asks the orchestrator to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardEntry {
    pub animate: bool,
    pub chart_replay: bool,
    /// `(delay_ms, detail)` pairs to schedule from the entry instant.
    pub plan: Vec<(u64, usize)>,
    /// Details flipped on immediately.
    pub shown_now: Vec<usize>,
}

impl CardReveal {
    pub fn new(detail_count: usize) -> Self {
        Self {
            visible: false,
            has_animated: false,
            details_visible: vec![false; detail_count],
            stagger_started: false,
        }
    }

    pub fn fully_revealed(&self) -> bool {
        self.details_visible.iter().all(|v| *v)
    }

    pub fn detail_visible(&self, detail: usize) -> bool {
        self.details_visible.get(detail).copied().unwrap_or(false)
    }

    /// Re-entry while already visible changes nothing.
    pub fn enter(&mut self, stagger_ms: u64) -> CardEntry {
        let mut entry = CardEntry::default();
        if self.visible {
            return entry;
        }
        self.visible = true;
        if !self.has_animated {
            self.has_animated = true;
            entry.animate = true;
        }

        if !self.stagger_started {
            self.stagger_started = true;
            self.details_visible.iter_mut().for_each(|v| *v = false);
            entry.chart_replay = true;
            entry.plan = (0..self.details_visible.len())
                .map(|i| (i as u64 * stagger_ms, i))
                .collect();
        } else {
            // Seen before: no replay, show whatever is still hidden.
            for (i, v) in self.details_visible.iter_mut().enumerate() {
                if !*v {
                    *v = true;
                    entry.shown_now.push(i);
                }
            }
        }
        entry
    }

    /// Leaving resets the container animation only; revealed details stay.
    pub fn exit(&mut self) -> bool {
        if !self.visible && !self.has_animated {
            return false;
        }
        self.visible = false;
        self.has_animated = false;
        true
    }

    /// Timer fire for one detail. Idempotent; returns true if it flipped.
    pub fn reveal_detail(&mut self, detail: usize) -> bool {
        match self.details_visible.get_mut(detail) {
            Some(v) if !*v => {
                *v = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entry_plans_stagger() {
        let mut card = CardReveal::new(4);
        let e = card.enter(800);
        assert!(e.animate && e.chart_replay);
        assert_eq!(e.plan, vec![(0, 0), (800, 1), (1600, 2), (2400, 3)]);
        assert!(e.shown_now.is_empty());
        assert!(!card.fully_revealed());
    }

    #[test]
    fn test_duplicate_entry_is_noop() {
        let mut card = CardReveal::new(2);
        card.enter(800);
        assert_eq!(card.enter(800), CardEntry::default());
    }

    #[test]
    fn test_reentry_shows_all_without_replay() {
        let mut card = CardReveal::new(3);
        card.enter(800);
        card.reveal_detail(0);
        assert!(card.exit());
        assert!(!card.has_animated);
        assert!(card.detail_visible(0));

        let e = card.enter(800);
        assert!(e.animate);
        assert!(!e.chart_replay);
        assert!(e.plan.is_empty());
        assert_eq!(e.shown_now, vec![1, 2]);
        assert!(card.fully_revealed());
    }

    #[test]
    fn test_reveal_detail_idempotent_and_bounded() {
        let mut card = CardReveal::new(2);
        assert!(card.reveal_detail(1));
        assert!(!card.reveal_detail(1));
        assert!(!card.reveal_detail(7));
    }

    #[test]
    fn test_exit_without_entry_reports_nothing() {
        let mut card = CardReveal::new(1);
        assert!(!card.exit());
    }
}
