use egui::{pos2, vec2, Align2, Color32, FontId, Painter, Pos2, Rect, Shape, Stroke};
use glam::DVec2;

use crate::renderer::plot::{nice_ticks, tick_label, DataBounds, PlotLayout};
use crate::simulation::Trajectory;

pub const TITLE: &str = "Test-particle orbit in Schwarzschild spacetime";

const BACKGROUND: Color32 = Color32::WHITE;
const INK: Color32 = Color32::from_rgb(30, 30, 30);
const GRID: Color32 = Color32::from_rgb(225, 225, 225);
const PATH: Color32 = Color32::from_rgb(31, 119, 180);
const MARKER: Color32 = Color32::from_rgb(255, 127, 14);
const HORIZON: Color32 = Color32::from_rgb(40, 40, 40);

/// Space around the axes box for ticks, labels and the title.
const MARGIN_LEFT: f32 = 72.0;
const MARGIN_RIGHT: f32 = 32.0;
const MARGIN_TOP: f32 = 48.0;
const MARGIN_BOTTOM: f32 = 76.0;

/// What gets drawn: the orbit in Cartesian form and the hole at the origin.
#[derive(Debug, Clone)]
pub struct OrbitPlot {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub horizon_radius: f64,
    pub caption: String,
}

impl OrbitPlot {
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let (x, y) = trajectory.cartesian();
        let summary = trajectory.summary();
        let system = &trajectory.system;

        let mut caption = format!(
            "M = {}   L = {}   E = {:.6}   r ∈ [{:.3}, {:.3}]   τ = {:.1}",
            system.metric().mass,
            system.angular_momentum(),
            system.energy(),
            summary.periapsis,
            summary.apoapsis,
            summary.final_tau,
        );
        if summary.plunged {
            caption.push_str("   (captured by the horizon)");
        }

        Self {
            x,
            y,
            horizon_radius: system.metric().horizon_radius(),
            caption,
        }
    }

    fn bounds(&self) -> DataBounds {
        let mut bounds = DataBounds::from_points(&self.x, &self.y);
        bounds.include(DVec2::splat(-self.horizon_radius));
        bounds.include(DVec2::splat(self.horizon_radius));
        bounds.padded(0.05)
    }
}

pub fn draw_plot(ctx: &egui::Context, plot: &OrbitPlot) {
    egui::CentralPanel::default()
        .frame(egui::Frame::default().fill(BACKGROUND))
        .show(ctx, |ui| {
            let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::hover());
            paint_figure(&painter, response.rect, plot);
        });
}

fn paint_figure(painter: &Painter, rect: Rect, plot: &OrbitPlot) {
    let axes = Rect::from_min_max(
        rect.min + vec2(MARGIN_LEFT, MARGIN_TOP),
        rect.max - vec2(MARGIN_RIGHT, MARGIN_BOTTOM),
    );
    if axes.width() <= 1.0 || axes.height() <= 1.0 {
        return;
    }

    let layout = PlotLayout::fit(&plot.bounds(), to_dvec(axes.min), to_dvec(axes.max));
    let visible = layout.visible();
    let ink = Stroke::new(1.0, INK);
    let tick_font = FontId::proportional(12.0);
    let label_font = FontId::proportional(15.0);

    for value in nice_ticks(visible.min.x, visible.max.x, 8) {
        let x = layout.to_screen(DVec2::new(value, 0.0)).x as f32;
        painter.line_segment([pos2(x, axes.top()), pos2(x, axes.bottom())], Stroke::new(1.0, GRID));
        painter.line_segment([pos2(x, axes.bottom()), pos2(x, axes.bottom() + 5.0)], ink);
        painter.text(
            pos2(x, axes.bottom() + 8.0),
            Align2::CENTER_TOP,
            tick_label(value),
            tick_font.clone(),
            INK,
        );
    }
    for value in nice_ticks(visible.min.y, visible.max.y, 6) {
        let y = layout.to_screen(DVec2::new(0.0, value)).y as f32;
        painter.line_segment([pos2(axes.left(), y), pos2(axes.right(), y)], Stroke::new(1.0, GRID));
        painter.line_segment([pos2(axes.left() - 5.0, y), pos2(axes.left(), y)], ink);
        painter.text(
            pos2(axes.left() - 8.0, y),
            Align2::RIGHT_CENTER,
            tick_label(value),
            tick_font.clone(),
            INK,
        );
    }

    let clipped = painter.with_clip_rect(axes);
    let origin = to_pos(layout.to_screen(DVec2::ZERO));
    let horizon_px = (plot.horizon_radius * layout.scale()) as f32;
    clipped.circle_stroke(origin, horizon_px, Stroke::new(1.0, HORIZON));

    let points: Vec<Pos2> = plot
        .x
        .iter()
        .zip(&plot.y)
        .map(|(&x, &y)| DVec2::new(x, y))
        .filter(|p| p.is_finite())
        .map(|p| to_pos(layout.to_screen(p)))
        .collect();
    if points.len() >= 2 {
        clipped.add(Shape::line(points, Stroke::new(1.5, PATH)));
    }
    clipped.circle_filled(origin, 5.0, MARKER);

    let corners = [
        axes.left_top(),
        axes.right_top(),
        axes.right_bottom(),
        axes.left_bottom(),
        axes.left_top(),
    ];
    for edge in corners.windows(2) {
        painter.line_segment([edge[0], edge[1]], ink);
    }

    painter.text(
        pos2(axes.center().x, axes.bottom() + 28.0),
        Align2::CENTER_TOP,
        "x",
        label_font.clone(),
        INK,
    );
    painter.text(
        pos2(rect.left() + 12.0, axes.center().y),
        Align2::LEFT_CENTER,
        "y",
        label_font,
        INK,
    );
    painter.text(
        pos2(axes.center().x, rect.top() + 14.0),
        Align2::CENTER_TOP,
        TITLE,
        FontId::proportional(18.0),
        INK,
    );
    painter.text(
        pos2(axes.left(), rect.bottom() - 10.0),
        Align2::LEFT_BOTTOM,
        &plot.caption,
        tick_font,
        Color32::from_rgb(90, 90, 90),
    );
}

fn to_dvec(p: Pos2) -> DVec2 {
    DVec2::new(p.x as f64, p.y as f64)
}

fn to_pos(p: DVec2) -> Pos2 {
    pos2(p.x as f32, p.y as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::simulation::simulate;

    #[test]
    fn plot_bounds_cover_orbit_and_horizon() {
        let config = SimulationConfig {
            tau_max: 100.0,
            ..Default::default()
        };
        let plot = OrbitPlot::from_trajectory(&simulate(&config).unwrap());
        assert_eq!(plot.x.len(), plot.y.len());
        assert_eq!(plot.horizon_radius, 2.0);

        let bounds = plot.bounds();
        assert!(bounds.min.cmple(DVec2::splat(-2.0)).all());
        for (&x, &y) in plot.x.iter().zip(&plot.y) {
            assert!(x >= bounds.min.x && x <= bounds.max.x);
            assert!(y >= bounds.min.y && y <= bounds.max.y);
        }
        assert!(!plot.caption.contains("captured"));
    }

    #[test]
    fn caption_flags_plunge() {
        let config = SimulationConfig {
            angular_momentum: 0.0,
            ..Default::default()
        };
        let plot = OrbitPlot::from_trajectory(&simulate(&config).unwrap());
        assert!(plot.caption.contains("captured"));
    }

    #[test]
    fn figure_paints_without_panicking() {
        let ctx = egui::Context::default();
        let plot = OrbitPlot {
            x: vec![10.0, 0.0, -10.0, f64::NAN],
            y: vec![0.0, 10.0, 0.0, 1.0],
            horizon_radius: 2.0,
            caption: String::new(),
        };
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, vec2(640.0, 480.0))),
            ..Default::default()
        };
        let output = ctx.run(input, |ctx| draw_plot(ctx, &plot));
        assert!(!output.shapes.is_empty());
    }
}
