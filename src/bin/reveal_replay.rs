use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, BufRead};

use folio_pulse::config::Config;
use folio_pulse::reveal::geometry::scroll_progress;
use folio_pulse::reveal::{
    IntersectionEntry, ObserverConfig, Rect, RevealConfig, RevealEvent, RevealOrchestrator,
    Viewport, ViewportObserver,
};
use folio_pulse::tape::{SkillTape, TapeEvent};

#[derive(Debug, serde::Deserialize)]
struct SectionLayout {
    id: String,
    rect: Rect,
}

#[derive(Debug, serde::Deserialize)]
struct CardLayout {
    rect: Rect,
    #[serde(default)]
    details: usize,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputEvent {
    Layout {
        ts: u64,
        width: f64,
        height: f64,
        document_height: f64,
        #[serde(default)]
        sections: Vec<SectionLayout>,
        #[serde(default)]
        cards: Vec<CardLayout>,
        #[serde(default)]
        tape_items: usize,
    },
    Scroll {
        ts: u64,
        scroll_y: f64,
    },
    Tick {
        ts: u64,
    },
    TapeEnter {
        ts: u64,
    },
    TapeLeave {
        ts: u64,
    },
    TapePin {
        ts: u64,
        item: usize,
    },
    TapeUnpin {
        ts: u64,
    },
}

struct Page {
    viewport: Viewport,
    document_height: f64,
    sections: ViewportObserver<String>,
    cards: ViewportObserver<usize>,
    reveal: RevealOrchestrator,
    tape: SkillTape,
}

impl Page {
    fn build(cfg: &Config, ts: u64, evt: InputEvent) -> Option<Page> {
        let InputEvent::Layout {
            width,
            height,
            document_height,
            sections,
            cards,
            tape_items,
            ..
        } = evt
        else {
            return None;
        };
        let mut section_obs = ViewportObserver::new(ObserverConfig::sections());
        let mut card_obs = ViewportObserver::new(ObserverConfig::cards());
        let ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();
        let details: Vec<usize> = cards.iter().map(|c| c.details).collect();
        for s in sections {
            section_obs.observe(s.id, s.rect);
        }
        for (i, c) in cards.into_iter().enumerate() {
            card_obs.observe(i, c.rect);
        }
        Some(Page {
            viewport: Viewport {
                scroll_y: 0.0,
                width,
                height,
            },
            document_height,
            sections: section_obs,
            cards: card_obs,
            reveal: RevealOrchestrator::new(RevealConfig::from_config(cfg), &ids, &details, ts),
            tape: SkillTape::new(tape_items, cfg.tape_idle_ms),
        })
    }

    /// Re-run both observers against the current viewport.
    fn observe(&mut self, ts: u64) -> Vec<Value> {
        let mut out = Vec::new();
        let sections: Vec<IntersectionEntry<String>> = self.sections.update(&self.viewport);
        if !sections.is_empty() {
            out.extend(emit(ts, "reveal", self.reveal.handle(ts, RevealEvent::Sections(sections))));
        }
        let cards = self.cards.update(&self.viewport);
        if !cards.is_empty() {
            out.extend(emit(ts, "reveal", self.reveal.handle(ts, RevealEvent::Cards(cards))));
        }
        out
    }

    fn tick(&mut self, ts: u64) -> Vec<Value> {
        let mut out = emit(ts, "reveal", self.reveal.advance(ts));
        out.extend(emit(ts, "tape", self.tape.tick(ts)));
        out
    }
}

fn emit<E: Serialize>(ts: u64, source: &str, effects: Vec<E>) -> Vec<Value> {
    effects
        .into_iter()
        .filter_map(|e| match serde_json::to_value(e) {
            Ok(Value::Object(fields)) => {
                let mut rec = Map::new();
                rec.insert("ts".to_string(), Value::from(ts));
                rec.insert("source".to_string(), Value::from(source));
                rec.extend(fields);
                Some(Value::Object(rec))
            }
            _ => None,
        })
        .collect()
}

fn event_ts(evt: &InputEvent) -> u64 {
    match evt {
        InputEvent::Layout { ts, .. }
        | InputEvent::Scroll { ts, .. }
        | InputEvent::Tick { ts }
        | InputEvent::TapeEnter { ts }
        | InputEvent::TapeLeave { ts }
        | InputEvent::TapePin { ts, .. }
        | InputEvent::TapeUnpin { ts } => *ts,
    }
}

/// Input lines up to the first read error; a broken stdin ends the replay.
fn input_lines<R: BufRead>(input: R) -> impl Iterator<Item = String> {
    input.lines().map_while(|line| match line {
        Ok(line) => Some(line),
        Err(err) => {
            eprintln!("stdin read failed: {}", err);
            None
        }
    })
}

fn main() {
    let cfg = Config::from_env();
    let stdin = io::stdin();
    let mut page: Option<Page> = None;

    for line in input_lines(stdin.lock()) {
        if line.trim().is_empty() {
            continue;
        }
        let evt: InputEvent = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(err) => {
                eprintln!("bad event json: {}", err);
                continue;
            }
        };
        let ts = event_ts(&evt);

        if matches!(evt, InputEvent::Layout { .. }) {
            page = Page::build(&cfg, ts, evt);
            if let Some(p) = page.as_mut() {
                for rec in p.observe(ts) {
                    println!("{}", rec);
                }
            }
            continue;
        }
        let Some(p) = page.as_mut() else {
            eprintln!("event before layout ignored: {}", line.trim());
            continue;
        };

        let records = match evt {
            InputEvent::Scroll { scroll_y, .. } => {
                p.viewport.scroll_y = scroll_y;
                let mut out = vec![serde_json::json!({
                    "ts": ts,
                    "source": "scroll",
                    "progress": scroll_progress(scroll_y, p.document_height, p.viewport.height),
                })];
                out.extend(p.observe(ts));
                out.extend(p.tick(ts));
                out
            }
            InputEvent::Tick { .. } => p.tick(ts),
            InputEvent::TapeEnter { .. } => emit(ts, "tape", p.tape.apply(ts, TapeEvent::Enter)),
            InputEvent::TapeLeave { .. } => emit(ts, "tape", p.tape.apply(ts, TapeEvent::Leave)),
            InputEvent::TapePin { item, .. } => {
                emit(ts, "tape", p.tape.apply(ts, TapeEvent::Pin { item }))
            }
            InputEvent::TapeUnpin { .. } => emit(ts, "tape", p.tape.apply(ts, TapeEvent::Unpin)),
            InputEvent::Layout { .. } => Vec::new(),
        };
        for rec in records {
            println!("{}", rec);
        }
    }
}
