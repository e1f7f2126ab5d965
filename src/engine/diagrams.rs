// Project diagrams shown in the overlay panel.
//
// Each widget is a tiny state machine; the overlay only reads it and forwards
// clicks. All animation is a pure function of scene time so the widgets can be
// tested without a window.

use std::time::Duration;

use super::clock::PeriodicTimer;

// ============================================================================
// SYSTEM UNIFICATION
// ============================================================================

/// One legacy system node, anchored as a fraction of the diagram square.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyNode {
    pub id: u8,
    pub label: &'static str,
    pub anchor: (f32, f32),
}

pub const LEGACY_NODES: [LegacyNode; 4] = [
    LegacyNode { id: 1, label: "Legacy A", anchor: (0.2, 0.2) },
    LegacyNode { id: 2, label: "Legacy B", anchor: (0.8, 0.2) },
    LegacyNode { id: 3, label: "Legacy C", anchor: (0.2, 0.8) },
    LegacyNode { id: 4, label: "Legacy D", anchor: (0.8, 0.8) },
];

/// Distance (in diagram points) a node slides toward the core when unified.
const UNIFY_SLIDE: f32 = 40.0;

/// Four fragmented systems that collapse into one core on toggle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnificationDiagram {
    unified: bool,
    active_node: Option<u8>,
}

impl UnificationDiagram {
    /// Flip between fragmented and unified. Always clears the selected node.
    pub fn toggle(&mut self) {
        self.unified = !self.unified;
        self.active_node = None;
    }

    pub fn select(&mut self, id: u8) {
        if LEGACY_NODES.iter().any(|n| n.id == id) {
            self.active_node = Some(id);
        }
    }

    pub fn is_unified(&self) -> bool {
        self.unified
    }

    pub fn active_node(&self) -> Option<u8> {
        self.active_node
    }

    pub fn button_label(&self) -> &'static str {
        if self.unified { "Reset Architecture" } else { "Unify Architecture" }
    }

    pub fn caption(&self) -> &'static str {
        if self.unified {
            "Systems consolidated. Cross-platform compatibility achieved."
        } else {
            "4 fragmented endpoints mapped."
        }
    }

    /// Target offset of a node from its anchor, in diagram points.
    /// Left column slides right, top row slides down (and vice versa).
    pub fn node_offset(&self, id: u8) -> (f32, f32) {
        if !self.unified {
            return (0.0, 0.0);
        }
        let dx = if id == 1 || id == 3 { UNIFY_SLIDE } else { -UNIFY_SLIDE };
        let dy = if id == 1 || id == 2 { UNIFY_SLIDE } else { -UNIFY_SLIDE };
        (dx, dy)
    }

    pub fn node_opacity(&self) -> f32 {
        if self.unified { 0.0 } else { 1.0 }
    }

    pub fn link_opacity(&self) -> f32 {
        if self.unified { 0.5 } else { 0.0 }
    }

    pub fn core_scale(&self) -> f32 {
        if self.unified { 1.2 } else { 1.0 }
    }
}

// ============================================================================
// DATA PIPELINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    App,
    GraphQl,
    Cache,
    Artifact,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::App,
        PipelineStage::GraphQl,
        PipelineStage::Cache,
        PipelineStage::Artifact,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::App => "App",
            PipelineStage::GraphQl => "GraphQL",
            PipelineStage::Cache => "Cache",
            PipelineStage::Artifact => "Artifact",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Packet marker keyframes across the diagram width, one per stage.
const PACKET_STOPS: [f32; 4] = [0.10, 0.35, 0.60, 0.85];
const PACKET_OPACITY: [f32; 4] = [0.0, 1.0, 1.0, 0.0];

/// Highlights one stage at a time, advancing on a fixed period.
#[derive(Debug, Clone)]
pub struct PipelineDiagram {
    stage: usize,
    timer: PeriodicTimer,
}

impl PipelineDiagram {
    pub fn new(period: Duration, started_at: f32) -> Self {
        Self {
            stage: 0,
            timer: PeriodicTimer::new(period, started_at),
        }
    }

    /// Advance by however many periods elapsed. Returns true if the stage changed.
    pub fn update(&mut self, now: f32) -> bool {
        let fired = self.timer.poll(now) as usize;
        let next = (self.stage + fired) % PipelineStage::ALL.len();
        let changed = next != self.stage;
        self.stage = next;
        changed
    }

    pub fn stage(&self) -> PipelineStage {
        PipelineStage::ALL[self.stage]
    }

    /// Packet marker (horizontal fraction, opacity), sweeping once per period.
    pub fn packet(&self, now: f32) -> (f32, f32) {
        let t = self.timer.progress(now) * (PACKET_STOPS.len() - 1) as f32;
        let i = (t.floor() as usize).min(PACKET_STOPS.len() - 2);
        let f = t - i as f32;
        let lerp = |a: f32, b: f32| a + (b - a) * f;
        (
            lerp(PACKET_STOPS[i], PACKET_STOPS[i + 1]),
            lerp(PACKET_OPACITY[i], PACKET_OPACITY[i + 1]),
        )
    }

    /// Stop the stage timer. The stage stays frozen afterwards.
    pub fn teardown(&mut self) {
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.timer.is_cancelled()
    }
}

// ============================================================================
// LATENCY CHART
// ============================================================================

/// Smallest bar height, as a fraction of the chart, so tiny values stay visible.
const MIN_BAR_FRACTION: f32 = 0.05;
const BAR_GROW_SECS: f32 = 1.0;
const OPTIMIZED_BAR_DELAY: f32 = 0.5;
const OPTIMIZED_LABEL_DELAY: f32 = 1.0;
const BADGE_DELAY: f32 = 1.5;

/// Static before/after bar chart that animates in the first time it is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyChart {
    pub legacy_ms: f32,
    pub optimized_ms: f32,
    shown_at: Option<f32>,
}

impl LatencyChart {
    pub fn new(legacy_ms: f32, optimized_ms: f32) -> Self {
        Self {
            legacy_ms,
            optimized_ms,
            shown_at: None,
        }
    }

    /// Start the grow-in animation. Only the first call counts.
    pub fn reveal(&mut self, now: f32) {
        self.shown_at.get_or_insert(now);
    }

    pub fn speedup(&self) -> f32 {
        if self.optimized_ms > 0.0 {
            (self.legacy_ms / self.optimized_ms).round()
        } else {
            0.0
        }
    }

    /// Short label above the legacy bar: whole seconds with a "+" from one
    /// second up, milliseconds below that.
    pub fn legacy_label(&self) -> String {
        if self.legacy_ms >= 1000.0 {
            format!("{}s+", (self.legacy_ms / 1000.0).floor())
        } else {
            format!("{:.0}ms", self.legacy_ms)
        }
    }

    pub fn badge_text(&self) -> String {
        format!("{}x FASTER", self.speedup())
    }

    /// Final (legacy, optimized) bar heights as fractions of the chart height.
    pub fn target_heights(&self) -> (f32, f32) {
        if self.legacy_ms <= 0.0 {
            return (MIN_BAR_FRACTION, MIN_BAR_FRACTION);
        }
        let optimized = (self.optimized_ms / self.legacy_ms).clamp(MIN_BAR_FRACTION, 1.0);
        (1.0, optimized)
    }

    /// Animated (legacy, optimized) bar heights at `now`.
    pub fn bar_heights(&self, now: f32) -> (f32, f32) {
        let Some(shown_at) = self.shown_at else {
            return (0.0, 0.0);
        };
        let since = now - shown_at;
        let (legacy, optimized) = self.target_heights();
        (
            legacy * ease_out(since / BAR_GROW_SECS),
            optimized * ease_out((since - OPTIMIZED_BAR_DELAY) / BAR_GROW_SECS),
        )
    }

    pub fn optimized_label_visible(&self, now: f32) -> bool {
        self.shown_at.is_some_and(|s| now - s >= OPTIMIZED_LABEL_DELAY)
    }

    pub fn badge_visible(&self, now: f32) -> bool {
        self.shown_at.is_some_and(|s| now - s >= BADGE_DELAY)
    }
}

/// Cubic ease-out on a clamped [0, 1] parameter.
fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

// ============================================================================
// BOARD
// ============================================================================

/// All three diagrams, owned together so teardown reaches every timer.
pub struct DiagramBoard {
    pub unification: UnificationDiagram,
    pub pipeline: PipelineDiagram,
    pub latency: LatencyChart,
}

impl DiagramBoard {
    pub fn new(stage_period: Duration, legacy_ms: f32, optimized_ms: f32, now: f32) -> Self {
        Self {
            unification: UnificationDiagram::default(),
            pipeline: PipelineDiagram::new(stage_period, now),
            latency: LatencyChart::new(legacy_ms, optimized_ms),
        }
    }

    pub fn update(&mut self, now: f32) {
        self.pipeline.update(now);
    }

    pub fn teardown(&mut self) {
        self.pipeline.teardown();
    }
}

impl Drop for DiagramBoard {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_alternates_and_clears_selection() {
        let mut d = UnificationDiagram::default();
        assert_eq!(d.button_label(), "Unify Architecture");
        assert_eq!(d.caption(), "4 fragmented endpoints mapped.");

        d.select(3);
        assert_eq!(d.active_node(), Some(3));

        d.toggle();
        assert!(d.is_unified());
        assert_eq!(d.active_node(), None);
        assert_eq!(d.button_label(), "Reset Architecture");
        assert_eq!(d.core_scale(), 1.2);
        assert_eq!(d.node_opacity(), 0.0);
        assert_eq!(d.link_opacity(), 0.5);

        d.select(2);
        d.toggle();
        assert!(!d.is_unified());
        assert_eq!(d.active_node(), None);
    }

    #[test]
    fn unknown_node_is_not_selectable() {
        let mut d = UnificationDiagram::default();
        d.select(9);
        assert_eq!(d.active_node(), None);
    }

    #[test]
    fn nodes_slide_toward_the_core() {
        let mut d = UnificationDiagram::default();
        assert_eq!(d.node_offset(1), (0.0, 0.0));
        d.toggle();
        assert_eq!(d.node_offset(1), (40.0, 40.0));
        assert_eq!(d.node_offset(2), (-40.0, 40.0));
        assert_eq!(d.node_offset(3), (40.0, -40.0));
        assert_eq!(d.node_offset(4), (-40.0, -40.0));
    }

    #[test]
    fn pipeline_cycles_every_two_seconds() {
        let mut p = PipelineDiagram::new(Duration::from_secs(2), 0.0);
        let mut seen = vec![p.stage()];
        for step in 1..=4 {
            assert!(p.update(step as f32 * 2.0));
            seen.push(p.stage());
        }
        assert_eq!(
            seen,
            vec![
                PipelineStage::App,
                PipelineStage::GraphQl,
                PipelineStage::Cache,
                PipelineStage::Artifact,
                PipelineStage::App,
            ]
        );
        assert!(!p.update(9.0));
    }

    #[test]
    fn pipeline_stops_after_teardown() {
        let mut p = PipelineDiagram::new(Duration::from_secs(2), 0.0);
        p.update(2.0);
        p.teardown();
        assert!(!p.is_running());
        assert!(!p.update(60.0));
        assert_eq!(p.stage(), PipelineStage::GraphQl);
    }

    #[test]
    fn packet_sweeps_and_fades() {
        let p = PipelineDiagram::new(Duration::from_secs(2), 0.0);
        let (x0, a0) = p.packet(0.0);
        assert!((x0 - 0.10).abs() < 1e-6);
        assert_eq!(a0, 0.0);
        let (x_mid, a_mid) = p.packet(1.0);
        assert!((x_mid - 0.475).abs() < 1e-6);
        assert_eq!(a_mid, 1.0);
        let (x_end, a_end) = p.packet(2.0);
        assert!((x_end - 0.85).abs() < 1e-6);
        assert!(a_end.abs() < 1e-6);
    }

    #[test]
    fn stage_labels_follow_order() {
        let labels: Vec<&str> = PipelineStage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, ["App", "GraphQL", "Cache", "Artifact"]);
        assert_eq!(PipelineStage::Cache.index(), 2);
    }

    #[test]
    fn legacy_label_follows_configured_latency() {
        assert_eq!(LatencyChart::new(1000.0, 20.0).legacy_label(), "1s+");
        assert_eq!(LatencyChart::new(2500.0, 20.0).legacy_label(), "2s+");
        assert_eq!(LatencyChart::new(450.0, 20.0).legacy_label(), "450ms");
    }

    #[test]
    fn selection_works_while_unified() {
        let mut diagram = UnificationDiagram::default();
        diagram.toggle();
        diagram.select(2);
        assert!(diagram.is_unified());
        assert_eq!(diagram.active_node(), Some(2));
    }

    #[test]
    fn latency_chart_targets_and_badge() {
        let chart = LatencyChart::new(1000.0, 20.0);
        assert_eq!(chart.speedup(), 50.0);
        assert_eq!(chart.badge_text(), "50x FASTER");
        assert_eq!(chart.target_heights(), (1.0, 0.05));
    }

    #[test]
    fn latency_chart_grows_in_once() {
        let mut chart = LatencyChart::new(1000.0, 20.0);
        assert_eq!(chart.bar_heights(5.0), (0.0, 0.0));

        chart.reveal(10.0);
        chart.reveal(20.0);
        assert_eq!(chart.bar_heights(10.0), (0.0, 0.0));

        let (legacy, optimized) = chart.bar_heights(10.5);
        assert!(legacy > 0.5 && legacy < 1.0);
        assert_eq!(optimized, 0.0);

        assert_eq!(chart.bar_heights(12.0), (1.0, 0.05));
        assert!(!chart.badge_visible(11.0));
        assert!(chart.optimized_label_visible(11.0));
        assert!(chart.badge_visible(11.5));
    }

    #[test]
    fn board_teardown_cancels_pipeline_timer() {
        let mut board = DiagramBoard::new(Duration::from_secs(2), 1000.0, 20.0, 0.0);
        board.update(2.0);
        assert_eq!(board.pipeline.stage(), PipelineStage::GraphQl);
        board.teardown();
        board.update(100.0);
        assert_eq!(board.pipeline.stage(), PipelineStage::GraphQl);
    }
}
