//! Viewport geometry: intersection ratios against a margin-adjusted
//! viewport, reported only when a target crosses one of its observer's
//! thresholds.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in document coordinates (px).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Overlap with `other`. Edge-adjacent boxes intersect with zero area.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let top = self.top.max(other.top);
        let left = self.left.max(other.left);
        let bottom = self.bottom().min(other.bottom());
        let right = self.right().min(other.right());
        if top > bottom || left > right {
            return None;
        }
        Some(Rect::new(top, left, right - left, bottom - top))
    }
}

/// CSS-style root margin in px; negative values shrink the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    pub fn uniform(px: f64) -> Self {
        Self { top: px, right: px, bottom: px, left: px }
    }

    pub fn vertical(px: f64) -> Self {
        Self { top: px, bottom: px, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn root(&self, margin: &RootMargin) -> Rect {
        Rect::new(
            self.scroll_y - margin.top,
            -margin.left,
            self.width + margin.left + margin.right,
            self.height + margin.top + margin.bottom,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObserverConfig {
    /// Ascending ratios at which a change is reported.
    pub thresholds: Vec<f64>,
    pub root_margin: RootMargin,
    /// Minimum ratio at which a target counts as shown.
    pub visibility_floor: f64,
}

impl ObserverConfig {
    pub fn new(mut thresholds: Vec<f64>, root_margin: RootMargin, visibility_floor: f64) -> Self {
        thresholds.retain(|t| (0.0..=1.0).contains(t));
        thresholds.sort_by(|a, b| a.total_cmp(b));
        thresholds.dedup();
        if thresholds.is_empty() {
            thresholds.push(0.0);
        }
        Self {
            thresholds,
            root_margin,
            visibility_floor,
        }
    }

    pub fn sections() -> Self {
        Self::new(
            vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5],
            RootMargin::vertical(-80.0),
            0.0,
        )
    }

    pub fn cards() -> Self {
        Self::new(vec![0.1], RootMargin::uniform(-100.0), 0.1)
    }

    /// -1 when not intersecting, else how many thresholds the ratio reached.
    fn position(&self, ratio: f64, is_intersecting: bool) -> i32 {
        if !is_intersecting {
            return -1;
        }
        self.thresholds.iter().filter(|t| ratio >= **t).count() as i32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry<K> {
    pub target: K,
    pub ratio: f64,
    pub is_intersecting: bool,
}

impl<K> IntersectionEntry<K> {
    pub fn new(target: K, ratio: f64, is_intersecting: bool) -> Self {
        Self {
            target,
            ratio,
            is_intersecting,
        }
    }

    pub fn visible_at(&self, floor: f64) -> bool {
        self.is_intersecting && self.ratio >= floor
    }
}

pub fn intersection(target: &Rect, root: &Rect) -> (f64, bool) {
    match target.intersect(root) {
        None => (0.0, false),
        Some(overlap) => {
            let area = target.area();
            let ratio = if area > 0.0 {
                (overlap.area() / area).min(1.0)
            } else {
                1.0
            };
            (ratio, true)
        }
    }
}

#[derive(Debug, Clone)]
struct Observed<K> {
    target: K,
    rect: Rect,
    last_position: Option<i32>,
}

/// Tracks observed targets and turns viewport changes into batched
/// entries, one per target whose threshold position changed.
#[derive(Debug, Clone)]
pub struct ViewportObserver<K> {
    config: ObserverConfig,
    targets: Vec<Observed<K>>,
}

impl<K: Clone + PartialEq> ViewportObserver<K> {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            targets: Vec::new(),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Start observing (or re-layout) a target. Its next update always
    /// reports it.
    pub fn observe(&mut self, target: K, rect: Rect) {
        match self.targets.iter_mut().find(|o| o.target == target) {
            Some(o) => o.rect = rect,
            None => self.targets.push(Observed {
                target,
                rect,
                last_position: None,
            }),
        }
    }

    pub fn unobserve(&mut self, target: &K) -> bool {
        let before = self.targets.len();
        self.targets.retain(|o| o.target != *target);
        self.targets.len() != before
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn update(&mut self, viewport: &Viewport) -> Vec<IntersectionEntry<K>> {
        let root = viewport.root(&self.config.root_margin);
        let mut batch = Vec::new();
        for o in self.targets.iter_mut() {
            let (ratio, is_intersecting) = intersection(&o.rect, &root);
            let position = self.config.position(ratio, is_intersecting);
            if o.last_position == Some(position) {
                continue;
            }
            o.last_position = Some(position);
            batch.push(IntersectionEntry::new(o.target.clone(), ratio, is_intersecting));
        }
        batch
    }
}

/// Percent of the scrollable distance covered; 0 when nothing scrolls.
pub fn scroll_progress(scroll_y: f64, document_height: f64, viewport_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 {
        return 0.0;
    }
    (scroll_y / scrollable * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp(scroll_y: f64) -> Viewport {
        Viewport { scroll_y, width: 1000.0, height: 800.0 }
    }

    #[test]
    fn test_negative_margin_shrinks_root() {
        let root = vp(0.0).root(&RootMargin::vertical(-80.0));
        assert_eq!(root.top, 80.0);
        assert_eq!(root.bottom(), 720.0);
        assert_eq!(root.width, 1000.0);
    }

    #[test]
    fn test_ratio_is_share_of_target_inside_root() {
        let root = vp(0.0).root(&RootMargin::default());
        let target = Rect::new(600.0, 0.0, 1000.0, 400.0);
        let (ratio, hit) = intersection(&target, &root);
        assert!(hit);
        assert!((ratio - 0.5).abs() < 1e-9);
        let (ratio, hit) = intersection(&Rect::new(900.0, 0.0, 1000.0, 100.0), &root);
        assert!(!hit);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_edge_touching_intersects_with_zero_ratio() {
        let root = vp(0.0).root(&RootMargin::default());
        let (ratio, hit) = intersection(&Rect::new(800.0, 0.0, 1000.0, 100.0), &root);
        assert!(hit);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_observer_reports_only_threshold_crossings() {
        let mut obs = ViewportObserver::new(ObserverConfig::sections());
        // 1000px tall section starting at 400; root spans 80..720 at scroll 0
        obs.observe("skills".to_string(), Rect::new(400.0, 0.0, 1000.0, 1000.0));
        let first = obs.update(&vp(0.0));
        assert_eq!(first.len(), 1);
        assert!((first[0].ratio - 0.32).abs() < 1e-9);

        // 0.33: same bucket as 0.32, nothing reported
        assert!(obs.update(&vp(10.0)).is_empty());

        // 0.42: crosses 0.4
        let next = obs.update(&vp(100.0));
        assert_eq!(next.len(), 1);
        assert!((next[0].ratio - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_observer_reports_exit() {
        let mut obs = ViewportObserver::new(ObserverConfig::cards());
        obs.observe(0usize, Rect::new(300.0, 200.0, 400.0, 300.0));
        let entered = obs.update(&vp(0.0));
        assert!(entered[0].visible_at(0.1));
        let left = obs.update(&vp(2_000.0));
        assert_eq!(left.len(), 1);
        assert!(!left[0].is_intersecting);
        assert!(!left[0].visible_at(0.1));
    }

    #[test]
    fn test_unobserve_stops_reports() {
        let mut obs = ViewportObserver::new(ObserverConfig::cards());
        obs.observe(1usize, Rect::new(300.0, 200.0, 400.0, 300.0));
        assert!(obs.unobserve(&1));
        assert!(obs.update(&vp(0.0)).is_empty());
        assert!(obs.is_empty());
    }

    #[test]
    fn test_scroll_progress() {
        assert_eq!(scroll_progress(0.0, 3_000.0, 1_000.0), 0.0);
        assert_eq!(scroll_progress(1_000.0, 3_000.0, 1_000.0), 50.0);
        assert_eq!(scroll_progress(5_000.0, 3_000.0, 1_000.0), 100.0);
        assert_eq!(scroll_progress(10.0, 500.0, 1_000.0), 0.0);
    }
}
