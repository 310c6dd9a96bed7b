//! Grid transforms: rectangle drawing and 4-connected flood fill.
//!
//! Both transforms validate their arguments before touching the canvas, so
//! on error the buffer is left exactly as it was. Once validation passes,
//! application cannot fail.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, Coordinates};
use crate::error::{check_violations, CanvasError, Result};

/// Draw an axis-aligned rectangle, filled and/or outlined.
///
/// A size of 0 on an axis collapses that axis to a single line. The far
/// corner is clamped to the canvas; nothing outside it is drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRectangleArgs {
    #[serde(default)]
    pub top_left: Coordinates,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub fill: String,
    #[serde(default)]
    pub outline: String,
}

impl TransformRectangleArgs {
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();

        if self.top_left.x < 0 {
            errs.push("top_left.x must not be negative");
        }
        if self.top_left.y < 0 {
            errs.push("top_left.y must not be negative");
        }
        if self.width < 0 {
            errs.push("width cannot be negative");
        }
        if self.height < 0 {
            errs.push("height cannot be negative");
        }
        if self.width == 0 && self.height == 0 {
            errs.push("at least one of width and height must be greater than zero");
        }
        if self.fill.is_empty() && self.outline.is_empty() {
            errs.push("at least one of fill and outline is required");
        }
        if !self.fill.is_empty() && self.fill.chars().count() != 1 {
            errs.push("fill must be exactly one character");
        }
        if !self.outline.is_empty() && self.outline.chars().count() != 1 {
            errs.push("outline must be exactly one character");
        }

        check_violations(errs)
    }
}

/// Replace the region 4-connected to `start` that shares its character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformFloodfillArgs {
    #[serde(default)]
    pub start: Coordinates,
    #[serde(default)]
    pub fill: String,
}

impl TransformFloodfillArgs {
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();

        if self.start.x < 0 {
            errs.push("start.x must not be negative");
        }
        if self.start.y < 0 {
            errs.push("start.y must not be negative");
        }
        if self.fill_char().is_err() {
            errs.push(FLOOD_FILL_LENGTH);
        }

        check_violations(errs)
    }

    /// The single fill character.
    pub fn fill_char(&self) -> Result<char> {
        let mut chars = self.fill.chars();
        match (chars.next(), chars.next()) {
            (Some(fill), None) => Ok(fill),
            _ => Err(CanvasError::InvalidArgument(FLOOD_FILL_LENGTH.into())),
        }
    }
}

const FLOOD_FILL_LENGTH: &str = "fill must contain exactly 1 character";

/// Last cell index covered on one axis, or `None` if the line starts past
/// the canvas edge.
fn far_edge(start: i64, size: i64, bound: usize) -> Option<usize> {
    let start = usize::try_from(start).ok()?;
    let size = usize::try_from(size).ok()?;
    let far = match size {
        0 => start,
        n => start.saturating_add(n - 1),
    };
    let far = far.min(bound.checked_sub(1)?);
    (start <= far).then_some(far)
}

/// Draw a rectangle onto `canvas` in place.
pub fn apply_rectangle(canvas: &mut Canvas, args: &TransformRectangleArgs) -> Result<()> {
    args.validate()?;

    let (Some(max_x), Some(max_y)) = (
        far_edge(args.top_left.x, args.width, canvas.width),
        far_edge(args.top_left.y, args.height, canvas.height),
    ) else {
        return Ok(());
    };
    let (min_x, min_y) = (args.top_left.x as usize, args.top_left.y as usize);
    let mut grid = canvas.as_grid();

    if let Some(fill) = args.fill.chars().next() {
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                grid.set(x, y, fill);
            }
        }
    }

    // Outline goes last so the border always wins over the fill.
    if let Some(outline) = args.outline.chars().next() {
        for x in min_x..=max_x {
            grid.set(x, min_y, outline);
            grid.set(x, max_y, outline);
        }
        for y in min_y..=max_y {
            grid.set(min_x, y, outline);
            grid.set(max_x, y, outline);
        }
    }

    canvas.apply_grid(&grid);
    Ok(())
}

/// Flood fill `canvas` in place, breadth first from `args.start`.
pub fn apply_flood_fill(canvas: &mut Canvas, args: &TransformFloodfillArgs) -> Result<()> {
    if !canvas.contains(args.start) {
        return Err(CanvasError::OutOfBounds);
    }
    let fill = args.fill_char()?;

    let mut grid = canvas.as_grid();
    let Some(seed) = grid.offset(args.start) else {
        return Err(CanvasError::OutOfBounds);
    };
    let pattern = grid.cell(seed);

    let mut visited = vec![false; grid.width() * grid.height()];
    let mut queue = VecDeque::from([args.start]);

    while let Some(p) = queue.pop_front() {
        let Some(i) = grid.offset(p) else {
            continue;
        };
        if visited[i] {
            continue;
        }
        visited[i] = true;

        if grid.cell(i) != pattern {
            continue;
        }
        grid.set_cell(i, fill);

        for next in p.neighbours() {
            match grid.offset(next) {
                Some(j) if !visited[j] && grid.cell(j) == pattern => queue.push_back(next),
                _ => {}
            }
        }
    }

    canvas.apply_grid(&grid);
    Ok(())
}
