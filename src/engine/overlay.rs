use egui::epaint::Shadow;
use egui::{Align2, Color32, FontId, Pos2, Rect, Stroke, Vec2, pos2, vec2};

use super::diagrams::{DiagramBoard, LEGACY_NODES, LatencyChart, PipelineDiagram, PipelineStage, UnificationDiagram};

const GOLD: Color32 = Color32::from_rgb(197, 160, 89);
const STONE_900: Color32 = Color32::from_rgb(28, 25, 23);
const STONE_500: Color32 = Color32::from_rgb(120, 113, 108);
const STONE_300: Color32 = Color32::from_rgb(214, 211, 209);
const STONE_100: Color32 = Color32::from_rgb(245, 244, 240);
const BLUE: Color32 = Color32::from_rgb(59, 130, 246);
const GREEN: Color32 = Color32::from_rgb(34, 197, 94);

const NODE_RADIUS: f32 = 12.0;

/// Seconds for a unification transition (node slide, link fade, core scale).
const UNIFY_ANIM_SECS: f32 = 0.8;

pub struct FrameStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub particle_count: usize,
    pub connection_count: usize,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    pub elapsed: f32,
}

pub struct Overlay {
    pub stats_visible: bool,
    pub diagrams_visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Overlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Light panels to sit on the pale page background
        let mut visuals = egui::Visuals::light();
        visuals.window_fill = Color32::from_rgba_unmultiplied(255, 255, 255, 235);
        visuals.window_stroke = Stroke::new(1.0, STONE_300);
        visuals.window_shadow = Shadow::NONE;
        egui_ctx.set_visuals(visuals);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            stats_visible: false,
            diagrams_visible: true,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle_stats(&mut self) {
        self.stats_visible = !self.stats_visible;
    }

    pub fn toggle_diagrams(&mut self) {
        self.diagrams_visible = !self.diagrams_visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame on top of the scene:
    ///
    /// - `stats`   : F3 stats panel (hidden when `stats_visible` is false).
    /// - `diagrams`: F1 project diagrams panel (hidden when `diagrams_visible` is false).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        stats: &FrameStats,
        diagrams: &mut DiagramBoard,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);
        let show_stats = self.stats_visible;
        let show_diagrams = self.diagrams_visible;
        let now = stats.elapsed;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if show_diagrams {
                diagram_panel(ctx, diagrams, now);
            }
            if show_stats {
                stats_panel(ctx, stats);
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

// ============================================================================
// PANELS
// ============================================================================

fn stats_panel(ctx: &egui::Context, stats: &FrameStats) {
    egui::Area::new(egui::Id::new("stats_overlay"))
        .fixed_pos(pos2(10.0, 10.0))
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(Color32::from_rgba_premultiplied(0, 0, 0, 180))
                .inner_margin(egui::Margin::same(8.0))
                .rounding(4.0)
                .show(ui, |ui: &mut egui::Ui| {
                    let text = |s: String| egui::RichText::new(s).monospace().color(Color32::WHITE);
                    ui.label(text(format!("FPS: {}", stats.fps)));
                    ui.label(text(format!(
                        "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                        stats.frame_time_avg_ms,
                        stats.frame_time_min_ms,
                        stats.frame_time_max_ms
                    )));
                    ui.label(text(format!("Particles: {}", stats.particle_count)));
                    ui.label(text(format!("Connections: {}", stats.connection_count)));
                    ui.label(text(format!("Draw calls: {}", stats.draw_calls)));
                    ui.label(text(format!(
                        "Resolution: {} x {}",
                        stats.resolution.0, stats.resolution.1
                    )));
                    ui.label(text(format!("Time: {:.1} s", stats.elapsed)));
                });
        });
}

fn diagram_panel(ctx: &egui::Context, board: &mut DiagramBoard, now: f32) {
    board.latency.reveal(now);

    egui::Window::new("Projects")
        .anchor(Align2::RIGHT_TOP, vec2(-12.0, 12.0))
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            ui.heading("Interactive: System Unification");
            unification_diagram(ui, &mut board.unification);
            ui.separator();
            ui.heading("Meta Artifact Pipeline");
            pipeline_diagram(ui, &board.pipeline, now);
            ui.separator();
            ui.heading("Query Latency Reduction");
            latency_chart(ui, &board.latency, now);
        });
}

// ============================================================================
// DIAGRAMS
// ============================================================================

fn unification_diagram(ui: &mut egui::Ui, diagram: &mut UnificationDiagram) {
    let size = 200.0;
    let (response, painter) = ui.allocate_painter(Vec2::splat(size), egui::Sense::click());
    let rect = response.rect;
    painter.rect_filled(rect, 6.0, STONE_100);

    let ctx = ui.ctx().clone();
    let anim = |name: &str, target: f32| {
        ctx.animate_value_with_time(egui::Id::new(("unify", name)), target, UNIFY_ANIM_SECS)
    };
    let center = rect.center();
    let node_alpha = anim("node_alpha", diagram.node_opacity());
    let link_alpha = anim("link_alpha", diagram.link_opacity());
    let core_scale = anim("core_scale", diagram.core_scale());

    let anchor = |a: (f32, f32)| pos2(rect.left() + a.0 * size, rect.top() + a.1 * size);

    for node in &LEGACY_NODES {
        painter.line_segment(
            [center, anchor(node.anchor)],
            Stroke::new(2.0, GOLD.gamma_multiply(link_alpha)),
        );
    }

    painter.circle_filled(center, 20.0 * core_scale, STONE_900);
    painter.circle_stroke(center, 10.0 * core_scale, Stroke::new(2.0, GOLD));

    let mut node_centers = Vec::with_capacity(LEGACY_NODES.len());
    for node in &LEGACY_NODES {
        let (dx, dy) = diagram.node_offset(node.id);
        let dx = ctx.animate_value_with_time(egui::Id::new(("unify_dx", node.id)), dx, UNIFY_ANIM_SECS);
        let dy = ctx.animate_value_with_time(egui::Id::new(("unify_dy", node.id)), dy, UNIFY_ANIM_SECS);
        let pos = anchor(node.anchor) + vec2(dx, dy);
        let border = if diagram.active_node() == Some(node.id) { GOLD } else { STONE_300 };
        painter.circle_filled(pos, NODE_RADIUS, Color32::WHITE.gamma_multiply(node_alpha));
        painter.circle_stroke(pos, NODE_RADIUS, Stroke::new(1.0, border.gamma_multiply(node_alpha)));
        painter.text(
            pos + vec2(0.0, 20.0),
            Align2::CENTER_CENTER,
            node.label,
            FontId::proportional(10.0),
            STONE_500.gamma_multiply(node_alpha),
        );
        node_centers.push((node.id, pos));
    }

    if response.clicked() {
        if let Some(id) = response.interact_pointer_pos().and_then(|click| node_at(&node_centers, click)) {
            diagram.select(id);
        }
    }

    let bolt = if diagram.is_unified() { GOLD } else { STONE_300 };
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("⚡").color(bolt));
        if ui.button(diagram.button_label()).clicked() {
            diagram.toggle();
        }
    });
    ui.label(egui::RichText::new(diagram.caption()).italics().color(STONE_500));
}

/// Node whose circle contains `click`, if any.
fn node_at(centers: &[(u8, Pos2)], click: Pos2) -> Option<u8> {
    centers
        .iter()
        .find(|(_, p)| p.distance(click) <= NODE_RADIUS)
        .map(|&(id, _)| id)
}

fn pipeline_diagram(ui: &mut egui::Ui, diagram: &PipelineDiagram, now: f32) {
    let (response, painter) = ui.allocate_painter(vec2(320.0, 90.0), egui::Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, 6.0, Color32::WHITE);

    let active = diagram.stage();
    let count = PipelineStage::ALL.len() as f32;
    let slot = rect.width() / count;
    let box_y = rect.top() + 35.0;

    for stage in PipelineStage::ALL {
        let x = rect.left() + slot * (stage.index() as f32 + 0.5);
        let highlight = match stage {
            PipelineStage::App => GOLD,
            PipelineStage::GraphQl => STONE_900,
            PipelineStage::Cache => BLUE,
            PipelineStage::Artifact => GREEN,
        };
        let (fill, stroke) = if stage == active {
            (highlight.gamma_multiply(0.2), highlight)
        } else {
            (STONE_100, STONE_300)
        };
        let box_rect = Rect::from_center_size(pos2(x, box_y), Vec2::splat(36.0));
        painter.rect_filled(box_rect, 6.0, fill);
        painter.rect_stroke(box_rect, 6.0, Stroke::new(2.0, stroke));
        painter.text(
            pos2(x, box_y + 32.0),
            Align2::CENTER_CENTER,
            stage.label().to_uppercase(),
            FontId::proportional(9.0),
            STONE_500,
        );
        if stage.index() + 1 < PipelineStage::ALL.len() {
            painter.text(
                pos2(x + slot / 2.0, box_y),
                Align2::CENTER_CENTER,
                "→",
                FontId::proportional(14.0),
                STONE_300,
            );
        }
    }

    let (fraction, alpha) = diagram.packet(now);
    painter.circle_filled(
        Pos2::new(rect.left() + fraction * rect.width(), rect.top() + 12.0),
        5.0,
        GOLD.gamma_multiply(alpha),
    );

    ui.horizontal(|ui| {
        for stage in PipelineStage::ALL {
            let width = if stage == active { 32.0 } else { 8.0 };
            let color = if stage == active { GOLD } else { STONE_300 };
            let (bar, _) = ui.allocate_exact_size(vec2(width, 4.0), egui::Sense::hover());
            ui.painter().rect_filled(bar, 2.0, color);
        }
    });
}

fn latency_chart(ui: &mut egui::Ui, chart: &LatencyChart, now: f32) {
    ui.label(egui::RichText::new(format!("Legacy Endpoints (~{:.0}ms)", chart.legacy_ms)).color(STONE_500));
    ui.label(egui::RichText::new(format!("Optimized System (~{:.0}ms)", chart.optimized_ms)).color(GOLD));

    let (response, painter) = ui.allocate_painter(vec2(240.0, 180.0), egui::Sense::hover());
    let rect = response.rect;
    painter.rect_filled(rect, 8.0, STONE_900);

    let plot = rect.shrink(20.0);
    for i in 0..5 {
        let y = plot.top() + plot.height() * i as f32 / 4.0;
        painter.line_segment(
            [pos2(plot.left(), y), pos2(plot.right(), y)],
            Stroke::new(1.0, STONE_500.gamma_multiply(0.2)),
        );
    }

    let (legacy, optimized) = chart.bar_heights(now);
    let bar_width = 56.0;
    let bar = |x_center: f32, fraction: f32| {
        Rect::from_min_max(
            pos2(x_center - bar_width / 2.0, plot.bottom() - plot.height() * fraction),
            pos2(x_center + bar_width / 2.0, plot.bottom()),
        )
    };
    let legacy_x = plot.left() + plot.width() * 0.3;
    let optimized_x = plot.left() + plot.width() * 0.7;
    painter.rect_filled(bar(legacy_x, legacy), 4.0, STONE_500);
    painter.rect_filled(bar(optimized_x, optimized), 4.0, GOLD);

    let label_font = FontId::monospace(11.0);
    painter.text(pos2(legacy_x, plot.top() - 8.0), Align2::CENTER_CENTER, chart.legacy_label(), label_font.clone(), STONE_300);
    if chart.optimized_label_visible(now) {
        painter.text(
            pos2(optimized_x, plot.bottom() - plot.height() * optimized - 10.0),
            Align2::CENTER_CENTER,
            format!("{:.0}ms", chart.optimized_ms),
            label_font.clone(),
            GOLD,
        );
    }
    painter.text(pos2(legacy_x, rect.bottom() - 8.0), Align2::CENTER_CENTER, "BEFORE", label_font.clone(), STONE_500);
    painter.text(pos2(optimized_x, rect.bottom() - 8.0), Align2::CENTER_CENTER, "AFTER", label_font, GOLD);

    if chart.badge_visible(now) {
        painter.text(
            pos2(rect.right() - 40.0, rect.top() + 14.0),
            Align2::CENTER_CENTER,
            chart.badge_text(),
            FontId::proportional(11.0),
            Color32::WHITE,
        );
    }
    ui.label(egui::RichText::new("RESPONSE TIME (LOWER IS BETTER)").monospace().small().color(STONE_500));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_hits_the_node_under_the_pointer() {
        let centers = [(1, pos2(40.0, 40.0)), (2, pos2(160.0, 40.0))];
        assert_eq!(node_at(&centers, pos2(45.0, 43.0)), Some(1));
        assert_eq!(node_at(&centers, pos2(160.0, 52.0)), Some(2));
        assert_eq!(node_at(&centers, pos2(100.0, 100.0)), None);
    }

    #[test]
    fn clicking_a_node_while_unified_selects_it() {
        let mut diagram = UnificationDiagram::default();
        diagram.toggle();
        let centers: Vec<(u8, Pos2)> = LEGACY_NODES
            .iter()
            .map(|n| (n.id, pos2(n.anchor.0 * 200.0, n.anchor.1 * 200.0)))
            .collect();
        if let Some(id) = node_at(&centers, pos2(160.0, 160.0)) {
            diagram.select(id);
        }
        assert!(diagram.is_unified());
        assert_eq!(diagram.active_node(), Some(4));
    }
}
