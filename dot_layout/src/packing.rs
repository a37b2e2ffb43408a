use log::{debug, warn};
use rand::seq::index;
use rand::Rng;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct Grid {
    rows: usize,
    cols: usize,
}

impl Grid {
    fn cells(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }
}

/// Places `num_points` dots of radius `point_radius` in a rectangle.
///
/// The rectangle is divided into a grid of cells ("windows"), each large enough to hold a dot,
/// with just enough cells for all the dots. Each dot is then placed at a random position inside
/// its own cell, so that no two dots overlap. The cells left empty are picked at random.
///
/// When even the densest grid does not have enough cells, the dots are placed at the centers of
/// a `ceil(sqrt(n))` square grid stretched over the rectangle, and `error` is set: the dots
/// overlap but none is dropped.
///
/// The returned list always holds exactly `num_points` positions.
pub fn point_positions<R: Rng + ?Sized>(
    rect: &Rect,
    num_points: usize,
    point_radius: f64,
    rng: &mut R,
) -> Result<PointPositions, LayoutError> {
    if num_points == 0 {
        return Ok(PointPositions::default());
    }
    if !(point_radius.is_finite() && point_radius > 0.0) {
        return Err(LayoutError::InvalidPointRadius {
            radius: point_radius,
        });
    }
    if !rect.is_well_formed() {
        return Err(LayoutError::InvalidRectangle {
            width: rect.width,
            height: rect.height,
        });
    }

    // The smallest windows that still fit a dot.
    let diameter = 2.0 * point_radius;
    let densest = Grid {
        rows: (rect.height / diameter).floor() as usize,
        cols: (rect.width / diameter).floor() as usize,
    };

    if densest.cells() < num_points {
        let side = fallback_side(num_points);
        let grid = Grid {
            rows: side,
            cols: side,
        };
        warn!(
            "point_positions: {} points do not fit in {}x{} with radius {} (capacity {}), using overlapping {}x{} grid",
            num_points,
            rect.width,
            rect.height,
            point_radius,
            densest.cells(),
            side,
            side
        );
        let data = place_in_grid(rect, grid, num_points, point_radius, false, rng);
        return Ok(PointPositions { error: true, data });
    }

    let grid = tightest_grid(densest, num_points);
    debug!(
        "point_positions: {} points in {}x{}: densest grid {:?}, chosen grid {:?}",
        num_points, rect.width, rect.height, densest, grid
    );
    let data = place_in_grid(rect, grid, num_points, point_radius, true, rng);
    Ok(PointPositions { error: false, data })
}

// Shrinks the rows and the columns alternately (columns first) for as long as
// the grid keeps at least `num_points` cells. When only one of them can
// shrink, it shrinks without consuming a turn.
//
// The result is computed in a bounded number of steps: the rounds where both
// dimensions shrink are skipped at once, and so is the final run on a single
// dimension.
fn tightest_grid(densest: Grid, num_points: usize) -> Grid {
    // An overflowing product has more cells than any number of points.
    let fits = |rows: usize, cols: usize| {
        rows.checked_mul(cols)
            .map_or(true, |cells| cells >= num_points)
    };
    let can_shrink_rows = |g: Grid| g.rows > 1 && fits(g.rows - 1, g.cols);
    let can_shrink_cols = |g: Grid| g.cols > 1 && fits(g.rows, g.cols - 1);
    // A round removes one column then one row, with both shrinkable at each step.
    let full_round = |g: Grid| {
        let g = Grid {
            rows: g.rows,
            cols: g.cols - 1,
        };
        g.cols > 0 && can_shrink_rows(g) && can_shrink_cols(g)
    };

    // Rounds only get harder as the grid shrinks: binary search on their count.
    let (mut lo, mut hi) = (0, densest.rows.min(densest.cols));
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        let start = Grid {
            rows: densest.rows - (mid - 1),
            cols: densest.cols - (mid - 1),
        };
        if full_round(start) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    let mut grid = Grid {
        rows: densest.rows - lo,
        cols: densest.cols - lo,
    };

    let mut shrink_cols = true;
    loop {
        match (can_shrink_rows(grid), can_shrink_cols(grid)) {
            (false, false) => break,
            (false, true) => {
                grid.cols = ceil_div(num_points, grid.rows);
                break;
            }
            (true, false) => {
                grid.rows = ceil_div(num_points, grid.cols);
                break;
            }
            (true, true) => {
                if shrink_cols {
                    grid.cols -= 1;
                } else {
                    grid.rows -= 1;
                }
                shrink_cols = !shrink_cols;
            }
        }
    }
    grid
}

fn ceil_div(num: usize, den: usize) -> usize {
    num / den + usize::from(num % den != 0)
}

fn fallback_side(num_points: usize) -> usize {
    let mut side = (num_points as f64).sqrt().ceil() as usize;
    while side.saturating_mul(side) < num_points {
        side += 1;
    }
    side
}

fn place_in_grid<R: Rng + ?Sized>(
    rect: &Rect,
    grid: Grid,
    num_points: usize,
    point_radius: f64,
    jitter: bool,
    rng: &mut R,
) -> Vec<PointPosition> {
    let num_cells = grid.cells();
    let mut empty = vec![false; num_cells];
    for idx in index::sample(rng, num_cells, num_cells - num_points).iter() {
        empty[idx] = true;
    }

    let cell_width = rect.width / grid.cols as f64;
    let cell_height = rect.height / grid.rows as f64;
    let mut res: Vec<PointPosition> = Vec::with_capacity(num_points);
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            if empty[r * grid.cols + c] {
                continue;
            }
            let left = rect.x + c as f64 * cell_width;
            let top = rect.y + r as f64 * cell_height;
            let (cx, cy) = if jitter {
                // Keep the whole dot inside its window.
                (
                    left + point_radius + rng.gen::<f64>() * (cell_width - 2.0 * point_radius),
                    top + point_radius + rng.gen::<f64>() * (cell_height - 2.0 * point_radius),
                )
            } else {
                (left + 0.5 * cell_width, top + 0.5 * cell_height)
            };
            res.push(PointPosition {
                x: cx - point_radius,
                y: cy - point_radius,
                cx,
                cy,
            });
        }
    }
    res
}
