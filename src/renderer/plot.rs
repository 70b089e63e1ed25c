use glam::DVec2;

/// Axis-aligned box in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataBounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl DataBounds {
    /// Smallest box holding every finite point and the origin.
    pub fn from_points(xs: &[f64], ys: &[f64]) -> Self {
        let mut bounds = Self {
            min: DVec2::ZERO,
            max: DVec2::ZERO,
        };
        for p in xs.iter().zip(ys).map(|(&x, &y)| DVec2::new(x, y)) {
            if p.is_finite() {
                bounds.include(p);
            }
        }
        bounds
    }

    pub fn include(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec2 {
        0.5 * (self.min + self.max)
    }

    /// Grows the box by `fraction` of its larger side on every edge. A
    /// degenerate box becomes a unit square around its center.
    pub fn padded(&self, fraction: f64) -> Self {
        let extent = self.size().max_element();
        let pad = if extent > 0.0 { extent * fraction } else { 1.0 };
        Self {
            min: self.min - DVec2::splat(pad),
            max: self.max + DVec2::splat(pad),
        }
    }
}

/// Maps data coordinates into a screen rectangle with one common scale on
/// both axes. Screen y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotLayout {
    pub screen_min: DVec2,
    pub screen_max: DVec2,
    center: DVec2,
    /// Pixels per data unit, same for x and y
    scale: f64,
}

impl PlotLayout {
    pub fn fit(bounds: &DataBounds, screen_min: DVec2, screen_max: DVec2) -> Self {
        let screen = (screen_max - screen_min).max(DVec2::ONE);
        let data = bounds.size().max(DVec2::splat(f64::EPSILON));
        let scale = (screen.x / data.x).min(screen.y / data.y);
        Self {
            screen_min,
            screen_max,
            center: bounds.center(),
            scale,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn to_screen(&self, p: DVec2) -> DVec2 {
        let mid = 0.5 * (self.screen_min + self.screen_max);
        let d = (p - self.center) * self.scale;
        DVec2::new(mid.x + d.x, mid.y - d.y)
    }

    /// Data-space box covered by the whole screen rectangle. Wider than the
    /// fitted bounds along the axis with slack.
    pub fn visible(&self) -> DataBounds {
        let half = 0.5 * (self.screen_max - self.screen_min) / self.scale;
        DataBounds {
            min: self.center - half,
            max: self.center + half,
        }
    }
}

/// Tick positions on a 1-2-5 grid covering `[min, max]` with roughly
/// `target` intervals.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    let span = max - min;
    if !(span.is_finite() && span > 0.0) || target == 0 {
        return Vec::new();
    }

    let raw = span / target as f64;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude);

    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Short label for a tick value, without trailing float noise.
pub fn tick_label(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_include_origin_and_skip_nan() {
        let b = DataBounds::from_points(&[3.0, 5.0, f64::NAN], &[4.0, 6.0, 1.0]);
        assert_eq!(b.min, DVec2::ZERO);
        assert_eq!(b.max, DVec2::new(5.0, 6.0));
    }

    #[test]
    fn degenerate_bounds_pad_to_unit() {
        let b = DataBounds::from_points(&[], &[]).padded(0.05);
        assert_eq!(b.min, DVec2::splat(-1.0));
        assert_eq!(b.max, DVec2::splat(1.0));
    }

    #[test]
    fn layout_keeps_equal_aspect() {
        let bounds = DataBounds {
            min: DVec2::new(-10.0, -2.0),
            max: DVec2::new(10.0, 2.0),
        };
        let layout = PlotLayout::fit(&bounds, DVec2::ZERO, DVec2::new(800.0, 600.0));

        let origin = layout.to_screen(DVec2::ZERO);
        let ux = layout.to_screen(DVec2::X) - origin;
        let uy = layout.to_screen(DVec2::Y) - origin;
        assert!((ux.x - (-uy.y)).abs() < 1e-12);
        assert_eq!(ux.y, 0.0);
        assert_eq!(uy.x, 0.0);
        assert!((layout.scale() - 40.0).abs() < 1e-12);
    }

    #[test]
    fn fitted_points_land_on_screen() {
        let xs = [-14.7, 3.0, 10.0, -2.0];
        let ys = [1.0, 12.0, -9.0, -14.0];
        let bounds = DataBounds::from_points(&xs, &ys).padded(0.05);
        let (lo, hi) = (DVec2::new(60.0, 40.0), DVec2::new(1200.0, 680.0));
        let layout = PlotLayout::fit(&bounds, lo, hi);

        for (&x, &y) in xs.iter().zip(&ys) {
            let p = layout.to_screen(DVec2::new(x, y));
            assert!(p.cmpge(lo).all() && p.cmple(hi).all(), "{p:?}");
        }
        let visible = layout.visible();
        assert!(visible.min.cmple(bounds.min + 1e-9).all());
        assert!(visible.max.cmpge(bounds.max - 1e-9).all());
    }

    #[test]
    fn ticks_follow_one_two_five() {
        let ticks = nice_ticks(-14.3, 12.1, 6);
        assert_eq!(ticks, vec![-10.0, -5.0, 0.0, 5.0, 10.0]);

        let ticks = nice_ticks(0.0, 1.0, 5);
        assert_eq!(ticks.len(), 6);
        assert!((ticks[1] - 0.2).abs() < 1e-12);

        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }

    #[test]
    fn tick_labels_are_trimmed() {
        assert_eq!(tick_label(0.30000000000000004), "0.3");
        assert_eq!(tick_label(-10.0), "-10");
        assert_eq!(tick_label(-0.0), "0");
    }
}
