//! Skills tape: a continuously scrolling strip whose items can be pinned
//! to show their description. Pinning pauses the strip; an idle deadline
//! clears the description and resumes motion once the pointer is gone.

use serde::{Deserialize, Serialize};

use crate::logging::{debug, obj, v_num, Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TapeEvent {
    Enter,
    Leave,
    Pin { item: usize },
    Unpin,
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum TapeEffect {
    Paused,
    Resumed,
    DescriptionShown { item: usize },
    DescriptionHidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillTape {
    items: usize,
    idle_ms: u64,
    hovering: bool,
    pinned: Option<usize>,
    shown: Option<usize>,
    paused: bool,
    idle_deadline: Option<u64>,
}

impl SkillTape {
    pub fn new(items: usize, idle_ms: u64) -> Self {
        Self {
            items,
            idle_ms,
            hovering: false,
            pinned: None,
            shown: None,
            paused: false,
            idle_deadline: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn shown(&self) -> Option<usize> {
        self.shown
    }

    pub fn pinned(&self) -> Option<usize> {
        self.pinned
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn idle_deadline(&self) -> Option<u64> {
        self.idle_deadline
    }

    pub fn apply(&mut self, now_ms: u64, event: TapeEvent) -> Vec<TapeEffect> {
        let mut out = Vec::new();
        match event {
            TapeEvent::Enter => self.hovering = true,
            TapeEvent::Pin { item } => {
                if item >= self.items {
                    debug(
                        Domain::Tape,
                        "pin_out_of_range",
                        obj(&[("item", v_num(item as f64)), ("items", v_num(self.items as f64))]),
                    );
                    return out;
                }
                self.hovering = true;
                self.pinned = Some(item);
                self.pause(&mut out);
                if self.shown != Some(item) {
                    self.shown = Some(item);
                    out.push(TapeEffect::DescriptionShown { item });
                }
                self.arm(now_ms);
            }
            TapeEvent::Unpin => {
                if self.pinned.take().is_some() {
                    self.arm(now_ms);
                }
            }
            TapeEvent::Leave => {
                self.hovering = false;
                if self.pinned.is_some() {
                    self.arm(now_ms);
                } else {
                    self.idle_deadline = None;
                    self.hide(&mut out);
                    self.resume(&mut out);
                }
            }
            TapeEvent::Tick => {}
        }
        self.expire(now_ms, &mut out);
        out
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<TapeEffect> {
        self.apply(now_ms, TapeEvent::Tick)
    }

    fn arm(&mut self, now_ms: u64) {
        self.idle_deadline = Some(now_ms.saturating_add(self.idle_ms));
    }

    fn expire(&mut self, now_ms: u64, out: &mut Vec<TapeEffect>) {
        match self.idle_deadline {
            Some(due) if due <= now_ms => {}
            _ => return,
        }
        self.idle_deadline = None;
        // Pointer still on the strip: leave it paused until it goes.
        if self.hovering {
            return;
        }
        self.pinned = None;
        self.hide(out);
        self.resume(out);
        debug(Domain::Tape, "idle_resume", obj(&[("at_ms", v_num(now_ms as f64))]));
    }

    fn pause(&mut self, out: &mut Vec<TapeEffect>) {
        if !self.paused {
            self.paused = true;
            out.push(TapeEffect::Paused);
        }
    }

    fn resume(&mut self, out: &mut Vec<TapeEffect>) {
        if self.paused {
            self.paused = false;
            out.push(TapeEffect::Resumed);
        }
    }

    fn hide(&mut self, out: &mut Vec<TapeEffect>) {
        if let Some(item) = self.shown.take() {
            debug(Domain::Tape, "description_hidden", obj(&[("item", v_num(item as f64))]));
            out.push(TapeEffect::DescriptionHidden);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape() -> SkillTape {
        SkillTape::new(6, 5_000)
    }

    #[test]
    fn test_pin_pauses_and_shows() {
        let mut t = tape();
        let fx = t.apply(0, TapeEvent::Pin { item: 2 });
        assert_eq!(fx, vec![TapeEffect::Paused, TapeEffect::DescriptionShown { item: 2 }]);
        assert!(t.is_paused());
        assert_eq!(t.idle_deadline(), Some(5_000));
    }

    #[test]
    fn test_unpin_while_hovering_stays_paused() {
        let mut t = tape();
        t.apply(0, TapeEvent::Pin { item: 1 });
        t.apply(1_000, TapeEvent::Unpin);
        assert!(t.tick(6_000).is_empty());
        assert!(t.is_paused());
        assert_eq!(t.idle_deadline(), None);
    }

    #[test]
    fn test_unpin_off_tape_resumes_after_idle() {
        let mut t = tape();
        t.apply(0, TapeEvent::Pin { item: 1 });
        t.apply(500, TapeEvent::Leave);
        t.apply(1_000, TapeEvent::Unpin);
        assert!(t.tick(5_999).is_empty());
        assert!(t.is_paused());
        let fx = t.tick(6_000);
        assert_eq!(fx, vec![TapeEffect::DescriptionHidden, TapeEffect::Resumed]);
        assert!(!t.is_paused());
        assert_eq!(t.shown(), None);
    }

    #[test]
    fn test_leave_without_pin_resumes_now() {
        let mut t = tape();
        t.apply(0, TapeEvent::Pin { item: 0 });
        t.apply(100, TapeEvent::Unpin);
        let fx = t.apply(200, TapeEvent::Leave);
        assert_eq!(fx, vec![TapeEffect::DescriptionHidden, TapeEffect::Resumed]);
        assert_eq!(t.idle_deadline(), None);
    }

    #[test]
    fn test_leave_while_pinned_waits_for_idle() {
        let mut t = tape();
        t.apply(0, TapeEvent::Pin { item: 3 });
        assert!(t.apply(2_000, TapeEvent::Leave).is_empty());
        assert_eq!(t.idle_deadline(), Some(7_000));
        assert!(t.tick(6_999).is_empty());
        assert!(t.tick(7_000).contains(&TapeEffect::Resumed));
        assert_eq!(t.pinned(), None);
    }

    #[test]
    fn test_repin_moves_description_and_rearms() {
        let mut t = tape();
        t.apply(0, TapeEvent::Pin { item: 1 });
        let fx = t.apply(3_000, TapeEvent::Pin { item: 4 });
        assert_eq!(fx, vec![TapeEffect::DescriptionShown { item: 4 }]);
        assert_eq!(t.idle_deadline(), Some(8_000));
    }

    #[test]
    fn test_out_of_range_pin_ignored() {
        let mut t = tape();
        assert!(t.apply(0, TapeEvent::Pin { item: 6 }).is_empty());
        assert!(!t.is_paused());
        assert_eq!(t.shown(), None);
    }
}
