//! Geometry observers feeding the reveal orchestrator, on a simulated clock.

use folio_pulse::reveal::{
    IntersectionEntry, ObserverConfig, Rect, RevealConfig, RevealEffect, RevealEvent,
    RevealOrchestrator, Viewport, ViewportObserver,
};

fn vp(scroll_y: f64) -> Viewport {
    Viewport {
        scroll_y,
        width: 1000.0,
        height: 800.0,
    }
}

fn details_shown(effects: &[RevealEffect], card: usize) -> Vec<usize> {
    effects
        .iter()
        .filter_map(|e| match e {
            RevealEffect::DetailShown { card: c, detail } if *c == card => Some(*detail),
            _ => None,
        })
        .collect()
}

#[test]
fn test_active_section_follows_scroll() {
    let mut obs = ViewportObserver::new(ObserverConfig::sections());
    for (id, top, height) in [
        ("profile", 0.0, 600.0),
        ("skills", 600.0, 800.0),
        ("experience", 1400.0, 1000.0),
        ("gallery", 2400.0, 800.0),
    ] {
        obs.observe(id.to_string(), Rect::new(top, 0.0, 1000.0, height));
    }
    let ids = ["profile", "skills", "experience", "gallery"];
    let mut o = RevealOrchestrator::new(RevealConfig::default(), &ids, &[], 0);

    let fx = o.handle(0, RevealEvent::Sections(obs.update(&vp(0.0))));
    assert!(fx.contains(&RevealEffect::SectionShown { section: "profile".to_string() }));
    assert!(fx.contains(&RevealEffect::SectionShown { section: "skills".to_string() }));
    assert_eq!(o.active_section(), Some("profile"));

    // Mount-time reveal covers the sections below the fold.
    let fx = o.advance(100);
    assert_eq!(fx.len(), 2);
    assert!(o.section("gallery").unwrap().visible);

    let fx = o.handle(200, RevealEvent::Sections(obs.update(&vp(900.0))));
    assert!(fx.contains(&RevealEffect::SectionHidden { section: "profile".to_string() }));
    assert!(fx.contains(&RevealEffect::ActiveSection { section: "skills".to_string() }));
    assert_eq!(o.active_section(), Some("skills"));
    let profile = o.section("profile").unwrap();
    assert!(!profile.visible && !profile.has_animated && !profile.active);
}

#[test]
fn test_details_follow_stagger_cadence() {
    let stagger = RevealConfig::default().stagger_ms;
    let mut obs = ViewportObserver::new(ObserverConfig::cards());
    obs.observe(0usize, Rect::new(2000.0, 200.0, 400.0, 300.0));
    let mut o = RevealOrchestrator::new(RevealConfig::default(), &["experience"], &[4], 0);

    assert!(details_shown(&o.handle(0, RevealEvent::Cards(obs.update(&vp(0.0)))), 0).is_empty());

    let entered_at = 1_000;
    let fx = o.handle(entered_at, RevealEvent::Cards(obs.update(&vp(1800.0))));
    assert!(fx.contains(&RevealEffect::CardShown { card: 0 }));
    assert!(fx.contains(&RevealEffect::ChartReplay { card: 0 }));

    let mut shown_at = vec![None; 4];
    for d in details_shown(&fx, 0) {
        shown_at[d] = Some(entered_at);
    }
    let mut now = entered_at;
    while now < entered_at + 5_000 {
        now += 100;
        for d in details_shown(&o.advance(now), 0) {
            assert!(shown_at[d].is_none(), "detail {} revealed twice", d);
            shown_at[d] = Some(now);
        }
        // Never regresses while the card stays visible.
        let visible: Vec<bool> = (0..4).map(|i| o.detail_visible(0, i)).collect();
        let first_hidden = visible.iter().position(|v| !v).unwrap_or(4);
        assert!(visible[first_hidden..].iter().all(|v| !v));
    }

    for (i, at) in shown_at.iter().enumerate() {
        let at = at.expect("every detail revealed");
        let due = entered_at + i as u64 * stagger;
        assert!(at >= due && at <= due + 100, "detail {} at {} (due {})", i, at, due);
    }
    assert!(o.card(0).unwrap().fully_revealed());

    // Leave and come back: container replays, details do not.
    let fx = o.handle(now + 100, RevealEvent::Cards(obs.update(&vp(0.0))));
    assert_eq!(fx, vec![RevealEffect::CardHidden { card: 0 }]);
    let fx = o.handle(now + 200, RevealEvent::Cards(obs.update(&vp(1800.0))));
    assert_eq!(fx, vec![RevealEffect::CardShown { card: 0 }]);
}

#[test]
fn test_interrupted_stagger_completes_on_reentry() {
    let mut o = RevealOrchestrator::new(RevealConfig::default(), &["experience"], &[2, 4], 0);
    let seen = |ratio: f64| RevealEvent::Cards(vec![IntersectionEntry::new(1usize, ratio, ratio > 0.0)]);

    let fx = o.handle(0, seen(0.6));
    assert_eq!(details_shown(&fx, 1), vec![0]);
    assert_eq!(details_shown(&o.advance(800), 1), vec![1]);

    let fx = o.handle(900, seen(0.0));
    assert_eq!(fx, vec![RevealEffect::CardHidden { card: 1 }]);
    assert!(o.detail_visible(1, 1));

    let fx = o.handle(1_000, seen(0.6));
    assert!(fx.contains(&RevealEffect::CardShown { card: 1 }));
    assert!(!fx.contains(&RevealEffect::ChartReplay { card: 1 }));
    assert_eq!(details_shown(&fx, 1), vec![2, 3]);

    // Stale stagger timers fire without effect.
    assert!(details_shown(&o.advance(5_000), 1).is_empty());
    assert_eq!(o.next_due(), None);
    assert!(!o.card(0).unwrap().has_animated);
}
