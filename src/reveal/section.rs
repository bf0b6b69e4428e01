use serde::{Deserialize, Serialize};

use super::geometry::IntersectionEntry;
use super::RevealEffect;
use crate::logging::{debug, obj, v_str, Domain};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealState {
    pub visible: bool,
    pub has_animated: bool,
    pub active: bool,
}

/// Page sections, their reveal flags and the active-section marker.
#[derive(Debug, Clone)]
pub struct SectionTracker {
    sections: Vec<(String, RevealState)>,
    /// Last reported ratio per section, in first-report order. Kept across
    /// batches; only `unobserve` evicts.
    ratios: Vec<(String, f64)>,
    active_min: f64,
    floor: f64,
}

impl SectionTracker {
    pub fn new<S: AsRef<str>>(ids: &[S], active_min: f64, floor: f64) -> Self {
        Self {
            sections: ids
                .iter()
                .map(|id| (id.as_ref().to_string(), RevealState::default()))
                .collect(),
            ratios: Vec::new(),
            active_min,
            floor,
        }
    }

    pub fn state(&self, id: &str) -> Option<&RevealState> {
        self.sections.iter().find(|(s, _)| s == id).map(|(_, st)| st)
    }

    pub fn active(&self) -> Option<&str> {
        self.sections
            .iter()
            .find(|(_, st)| st.active)
            .map(|(id, _)| id.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(id, _)| id.as_str())
    }

    pub fn recorded_ratio(&self, id: &str) -> Option<f64> {
        self.ratios.iter().find(|(s, _)| s == id).map(|(_, r)| *r)
    }

    /// Apply one observer batch, then re-run active selection once.
    pub fn apply_batch(&mut self, entries: &[IntersectionEntry<String>], out: &mut Vec<RevealEffect>) {
        let floor = self.floor;
        for entry in entries {
            let Some(state) = self.state_mut(&entry.target) else {
                debug(Domain::Reveal, "unknown_section", obj(&[("section", v_str(&entry.target))]));
                continue;
            };
            if entry.visible_at(floor) {
                state.visible = true;
                if !state.has_animated {
                    state.has_animated = true;
                    out.push(RevealEffect::SectionShown {
                        section: entry.target.clone(),
                    });
                }
            } else {
                if state.visible || state.has_animated {
                    out.push(RevealEffect::SectionHidden {
                        section: entry.target.clone(),
                    });
                }
                state.visible = false;
                state.has_animated = false;
            }
            self.record_ratio(&entry.target, entry.ratio);
        }
        self.select_active(out);
    }

    /// Mount-time reveal: every section becomes visible at once.
    pub fn reveal_all(&mut self, out: &mut Vec<RevealEffect>) {
        for (id, state) in self.sections.iter_mut() {
            state.visible = true;
            if !state.has_animated {
                state.has_animated = true;
                out.push(RevealEffect::SectionShown { section: id.clone() });
            }
        }
    }

    /// Forget the section's recorded ratio so it no longer competes for
    /// the active marker.
    pub fn unobserve(&mut self, id: &str) {
        self.ratios.retain(|(s, _)| s != id);
    }

    fn state_mut(&mut self, id: &str) -> Option<&mut RevealState> {
        self.sections
            .iter_mut()
            .find(|(s, _)| s == id)
            .map(|(_, st)| st)
    }

    fn record_ratio(&mut self, id: &str, ratio: f64) {
        match self.ratios.iter_mut().find(|(s, _)| s == id) {
            Some(slot) => slot.1 = ratio,
            None => self.ratios.push((id.to_string(), ratio)),
        }
    }

    /// Highest recorded ratio wins (first recorded on ties). Flags change
    /// only when the winner clears `active_min`.
    fn select_active(&mut self, out: &mut Vec<RevealEffect>) {
        let mut max_ratio = 0.0;
        let mut winner: Option<&str> = None;
        for (id, ratio) in &self.ratios {
            if *ratio > max_ratio {
                max_ratio = *ratio;
                winner = Some(id.as_str());
            }
        }
        if max_ratio <= self.active_min {
            return;
        }
        let Some(winner) = winner.map(str::to_string) else {
            return;
        };
        if self.active() == Some(winner.as_str()) {
            return;
        }
        for (id, state) in self.sections.iter_mut() {
            state.active = *id == winner;
        }
        out.push(RevealEffect::ActiveSection { section: winner });
    }
}
