//! Reveal reducer: `(state, now, event) -> effects`.
//!
//! Logical time only moves forward. Every call finishes by firing the
//! timeline entries due at the new `now`, so a zero-delay stagger step
//! lands in the same call that scheduled it.

use super::card::CardReveal;
use super::geometry::IntersectionEntry;
use super::section::{RevealState, SectionTracker};
use super::timeline::Timeline;
use super::RevealEffect;
use crate::config::{Config, ACTIVE_RATIO_MIN};
use crate::logging::{debug, obj, v_num, Domain};

#[derive(Debug, Clone, PartialEq)]
pub struct RevealConfig {
    pub stagger_ms: u64,
    pub initial_reveal_ms: u64,
    pub active_ratio_min: f64,
    pub section_floor: f64,
    pub card_floor: f64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RevealConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            stagger_ms: cfg.stagger_ms,
            initial_reveal_ms: cfg.initial_reveal_ms,
            active_ratio_min: ACTIVE_RATIO_MIN,
            section_floor: 0.0,
            card_floor: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevealEvent {
    Sections(Vec<IntersectionEntry<String>>),
    Cards(Vec<IntersectionEntry<usize>>),
    /// Clock advanced; fire whatever is due.
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheduled {
    InitialReveal,
    Detail { card: usize, detail: usize },
}

#[derive(Debug, Clone)]
pub struct RevealOrchestrator {
    cfg: RevealConfig,
    now_ms: u64,
    sections: SectionTracker,
    cards: Vec<CardReveal>,
    timeline: Timeline<Scheduled>,
}

impl RevealOrchestrator {
    /// `card_details[i]` is the number of itemized details on card `i`.
    pub fn new<S: AsRef<str>>(
        cfg: RevealConfig,
        section_ids: &[S],
        card_details: &[usize],
        now_ms: u64,
    ) -> Self {
        let mut timeline = Timeline::new();
        timeline.schedule(now_ms.saturating_add(cfg.initial_reveal_ms), Scheduled::InitialReveal);
        Self {
            sections: SectionTracker::new(section_ids, cfg.active_ratio_min, cfg.section_floor),
            cards: card_details.iter().map(|n| CardReveal::new(*n)).collect(),
            timeline,
            now_ms,
            cfg,
        }
    }

    pub fn handle(&mut self, now_ms: u64, event: RevealEvent) -> Vec<RevealEffect> {
        self.now_ms = self.now_ms.max(now_ms);
        let mut out = Vec::new();
        match event {
            RevealEvent::Sections(entries) => self.sections.apply_batch(&entries, &mut out),
            RevealEvent::Cards(entries) => {
                for entry in entries {
                    self.apply_card_entry(entry, &mut out);
                }
            }
            RevealEvent::Tick => {}
        }
        self.fire_due(&mut out);
        out
    }

    pub fn advance(&mut self, now_ms: u64) -> Vec<RevealEffect> {
        self.handle(now_ms, RevealEvent::Tick)
    }

    /// Stop tracking a section's ratio for active selection.
    pub fn unobserve_section(&mut self, id: &str) {
        self.sections.unobserve(id);
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timeline.next_due()
    }

    pub fn section(&self, id: &str) -> Option<&RevealState> {
        self.sections.state(id)
    }

    pub fn active_section(&self) -> Option<&str> {
        self.sections.active()
    }

    pub fn card(&self, index: usize) -> Option<&CardReveal> {
        self.cards.get(index)
    }

    pub fn detail_visible(&self, card: usize, detail: usize) -> bool {
        self.cards
            .get(card)
            .map(|c| c.detail_visible(detail))
            .unwrap_or(false)
    }

    fn apply_card_entry(&mut self, entry: IntersectionEntry<usize>, out: &mut Vec<RevealEffect>) {
        let card_index = entry.target;
        let visible = entry.visible_at(self.cfg.card_floor);
        let Some(card) = self.cards.get_mut(card_index) else {
            debug(Domain::Reveal, "unknown_card", obj(&[("card", v_num(card_index as f64))]));
            return;
        };

        if !visible {
            if card.exit() {
                out.push(RevealEffect::CardHidden { card: card_index });
            }
            return;
        }

        let step = card.enter(self.cfg.stagger_ms);
        if step.animate {
            out.push(RevealEffect::CardShown { card: card_index });
        }
        if step.chart_replay {
            out.push(RevealEffect::ChartReplay { card: card_index });
        }
        for detail in step.shown_now {
            out.push(RevealEffect::DetailShown {
                card: card_index,
                detail,
            });
        }
        if !step.plan.is_empty() {
            debug(
                Domain::Reveal,
                "stagger_scheduled",
                obj(&[
                    ("card", v_num(card_index as f64)),
                    ("details", v_num(step.plan.len() as f64)),
                    ("stagger_ms", v_num(self.cfg.stagger_ms as f64)),
                ]),
            );
        }
        self.timeline.schedule_all(
            self.now_ms,
            step.plan
                .into_iter()
                .map(|(delay, detail)| (delay, Scheduled::Detail { card: card_index, detail })),
        );
    }

    fn fire_due(&mut self, out: &mut Vec<RevealEffect>) {
        for action in self.timeline.pop_due(self.now_ms) {
            match action {
                Scheduled::InitialReveal => self.sections.reveal_all(out),
                Scheduled::Detail { card, detail } => {
                    // Fires even if the card left meanwhile; the flag is harmless.
                    if let Some(c) = self.cards.get_mut(card) {
                        if c.reveal_detail(detail) {
                            out.push(RevealEffect::DetailShown { card, detail });
                        }
                    }
                }
            }
        }
    }
}
