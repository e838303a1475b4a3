//! Embed geometry: map a region's natural size onto bounded embed extents.
//!
//! Both steps scale uniformly, so the aspect ratio of the captured region
//! is always preserved.
//!
//! ## Step order
//!
//! The shrink step is evaluated against the *natural* size, not against the
//! result of the expand step, and when it fires it overwrites that result.
//! A region that is too small on one axis and too large on the other
//! (a long thin banner) therefore ends up shrunk only: it may finish below
//! the minimum on its short axis. This is observable behaviour that callers
//! and tests rely on.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum and maximum embed extents, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbedBounds {
    pub min_width: f64,
    pub min_height: f64,
    pub max_width: f64,
    pub max_height: f64,
}

impl Default for EmbedBounds {
    fn default() -> Self {
        Self {
            min_width: 100.0,
            min_height: 100.0,
            max_width: 400.0,
            max_height: 300.0,
        }
    }
}

/// Final width/height used to place a snapshot in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledGeometry {
    pub embed_width: f64,
    pub embed_height: f64,
}

/// Which correction, if any, produced a [`ScaledGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleStep {
    Unchanged,
    Expanded,
    Shrunk,
}

/// Scale `(natural_width, natural_height)` into `bounds`.
///
/// Expects strictly positive natural dimensions; the harvester drops
/// zero-area regions before they reach this point.
pub fn scale(natural_width: f64, natural_height: f64, bounds: &EmbedBounds) -> ScaledGeometry {
    scale_with_step(natural_width, natural_height, bounds).0
}

/// [`scale`], also reporting which step decided the result.
pub fn scale_with_step(
    natural_width: f64,
    natural_height: f64,
    bounds: &EmbedBounds,
) -> (ScaledGeometry, ScaleStep) {
    let mut geometry = ScaledGeometry {
        embed_width: natural_width,
        embed_height: natural_height,
    };
    let mut step = ScaleStep::Unchanged;

    if natural_width < bounds.min_width || natural_height < bounds.min_height {
        let factor = (bounds.min_width / natural_width).max(bounds.min_height / natural_height);
        geometry = ScaledGeometry {
            embed_width: natural_width * factor,
            embed_height: natural_height * factor,
        };
        step = ScaleStep::Expanded;
    }

    if natural_width > bounds.max_width || natural_height > bounds.max_height {
        let factor = (bounds.max_width / natural_width).min(bounds.max_height / natural_height);
        geometry = ScaledGeometry {
            embed_width: natural_width * factor,
            embed_height: natural_height * factor,
        };
        step = ScaleStep::Shrunk;
    }

    debug!(
        "Scaled {:.1}x{:.1} → {:.1}x{:.1} ({:?})",
        natural_width, natural_height, geometry.embed_width, geometry.embed_height, step
    );
    (geometry, step)
}

/// One-sided variant used by the flow layout: shrink to `max_width` if wider,
/// never expand.
pub fn shrink_to_width(natural_width: f64, natural_height: f64, max_width: f64) -> ScaledGeometry {
    if natural_width > max_width {
        let factor = max_width / natural_width;
        ScaledGeometry {
            embed_width: max_width,
            embed_height: natural_height * factor,
        }
    } else {
        ScaledGeometry {
            embed_width: natural_width,
            embed_height: natural_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> EmbedBounds {
        EmbedBounds::default()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn small_square_expands_to_minimum() {
        let (g, step) = scale_with_step(80.0, 80.0, &bounds());
        assert_eq!(step, ScaleStep::Expanded);
        assert!(approx(g.embed_width, 100.0));
        assert!(approx(g.embed_height, 100.0));
    }

    #[test]
    fn wide_region_shrinks_to_width_bound() {
        let g = scale(500.0, 200.0, &bounds());
        assert!(approx(g.embed_width, 400.0));
        assert!(approx(g.embed_height, 160.0));
    }

    #[test]
    fn tall_region_shrinks_to_height_bound() {
        let g = scale(200.0, 600.0, &bounds());
        assert!(approx(g.embed_width, 100.0));
        assert!(approx(g.embed_height, 300.0));
    }

    #[test]
    fn in_range_region_is_unchanged() {
        let (g, step) = scale_with_step(250.0, 150.0, &bounds());
        assert_eq!(step, ScaleStep::Unchanged);
        assert_eq!(
            g,
            ScaledGeometry {
                embed_width: 250.0,
                embed_height: 150.0
            }
        );
    }

    #[test]
    fn banner_below_min_and_above_max_keeps_only_shrink() {
        // 500x50: too short (<100) and too wide (>400). Expand would give
        // 1000x100; shrink from the natural size gives 400x40 and wins.
        let (g, step) = scale_with_step(500.0, 50.0, &bounds());
        assert_eq!(step, ScaleStep::Shrunk);
        assert!(approx(g.embed_width, 400.0));
        assert!(approx(g.embed_height, 40.0));
        assert!(g.embed_height < bounds().min_height);
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        for (w, h) in [(80.0, 80.0), (500.0, 200.0), (500.0, 50.0), (30.0, 90.0), (1200.0, 900.0)] {
            let g = scale(w, h, &bounds());
            assert!(
                approx(g.embed_width / g.embed_height, w / h),
                "{w}x{h} → {g:?}"
            );
        }
    }

    #[test]
    fn shrink_to_width_never_expands() {
        let g = shrink_to_width(50.0, 20.0, 225.0);
        assert_eq!(g.embed_width, 50.0);
        assert_eq!(g.embed_height, 20.0);

        let g = shrink_to_width(450.0, 300.0, 225.0);
        assert!(approx(g.embed_width, 225.0));
        assert!(approx(g.embed_height, 150.0));
    }
}
