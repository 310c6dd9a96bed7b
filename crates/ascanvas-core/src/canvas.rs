//! Canvas model: identity, the row-major character buffer, and the grid codec.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{check_violations, Result};

/// Largest canvas accepted, in cells.
pub const MAX_CELLS: usize = 1 << 20;

/// Cell count for `width x height`, or `None` when it exceeds [`MAX_CELLS`].
fn cell_count(width: u64, height: u64) -> Option<usize> {
    let cells = usize::try_from(width.checked_mul(height)?).ok()?;
    (cells <= MAX_CELLS).then_some(cells)
}

/// An ASCII-art drawing.
///
/// `content` is row-major: the character at `(x, y)` is the
/// `y * width + x`-th character of the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub id: String,
    pub name: String,
    pub content: String,
    pub width: usize,
    pub height: usize,
}

/// A position on a cartesian plane. Not necessarily inside any canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i64,
    pub y: i64,
}

impl Coordinates {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The four 4-connected neighbours, in N, S, E, W order.
    pub fn neighbours(self) -> [Coordinates; 4] {
        [
            Coordinates::new(self.x, self.y - 1),
            Coordinates::new(self.x, self.y + 1),
            Coordinates::new(self.x + 1, self.y),
            Coordinates::new(self.x - 1, self.y),
        ]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A canvas buffer decoded into addressable cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<char>,
    width: usize,
    height: usize,
}

impl Grid {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Panics if `(x, y)` lies outside the grid.
    pub fn get(&self, x: usize, y: usize) -> char {
        self.cells[self.index(x, y)]
    }

    /// Panics if `(x, y)` lies outside the grid.
    pub fn set(&mut self, x: usize, y: usize, ch: char) {
        let i = self.index(x, y);
        self.cells[i] = ch;
    }

    /// Row-major cell index of `coords`, or `None` when outside the grid.
    pub fn offset(&self, coords: Coordinates) -> Option<usize> {
        if coords.x < 0 || coords.y < 0 {
            return None;
        }
        let (x, y) = (coords.x as usize, coords.y as usize);
        (x < self.width && y < self.height).then(|| self.index(x, y))
    }

    pub(crate) fn cell(&self, offset: usize) -> char {
        self.cells[offset]
    }

    pub(crate) fn set_cell(&mut self, offset: usize, ch: char) {
        self.cells[offset] = ch;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.cells.chunks(self.width.max(1))
    }
}

impl Canvas {
    /// Build a canvas from a multi-line picture.
    ///
    /// Surrounding newlines are trimmed; the height is the number of lines
    /// and the width is the length of the first line.
    pub fn from_text(id: impl Into<String>, name: impl Into<String>, text: &str) -> Self {
        let lines: Vec<&str> = text.trim_matches('\n').split('\n').collect();
        let width = lines.first().map(|l| l.chars().count()).unwrap_or(0);

        Self {
            id: id.into(),
            name: name.into(),
            content: lines.concat(),
            width,
            height: lines.len(),
        }
    }

    /// Whether `coords` addresses a cell of this canvas.
    pub fn contains(&self, coords: Coordinates) -> bool {
        coords.y >= 0
            && (coords.y as u64) < self.height as u64
            && coords.x >= 0
            && (coords.x as u64) < self.width as u64
    }

    /// Check dimensions and the `content.len() == width * height` invariant.
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();
        if self.width == 0 {
            errs.push("width cannot be less than 1");
        }
        if self.height == 0 {
            errs.push("height cannot be less than 1");
        }
        match cell_count(self.width as u64, self.height as u64) {
            None => errs.push("canvas cannot have more than 1048576 cells"),
            Some(cells) if self.content.chars().count() != cells => {
                errs.push("content length must equal width * height")
            }
            Some(_) => {}
        }
        check_violations(errs)
    }

    /// Decode the buffer into a grid.
    pub fn as_grid(&self) -> Grid {
        let mut cells: Vec<char> = self.content.chars().collect();
        cells.resize(self.width * self.height, ' ');

        Grid {
            cells,
            width: self.width,
            height: self.height,
        }
    }

    /// Encode `grid` back into the buffer.
    pub fn apply_grid(&mut self, grid: &Grid) {
        self.content = grid.cells.iter().collect();
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "id = {}, name = {}, w = {}, h = {}",
            self.id, self.name, self.width, self.height
        )?;
        for row in self.as_grid().rows() {
            let line: String = row.iter().map(|&c| if c == ' ' { '_' } else { c }).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Parameters for creating a canvas filled with a single character.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateArgs {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fill: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

impl CreateArgs {
    pub fn validate(&self) -> Result<()> {
        let mut errs = Vec::new();

        if self.name.is_empty() {
            errs.push("name cannot be empty");
        }
        if self.fill.chars().count() != 1 {
            errs.push("fill must be exactly one character");
        }
        if self.width < 1 {
            errs.push("width cannot be less than 1");
        }
        if self.height < 1 {
            errs.push("height cannot be less than 1");
        }
        if self.width >= 1
            && self.height >= 1
            && cell_count(self.width as u64, self.height as u64).is_none()
        {
            errs.push("canvas cannot have more than 1048576 cells");
        }

        check_violations(errs)
    }

    /// Validate and build the canvas under `id`. An empty fill means blank.
    pub fn into_canvas(mut self, id: String) -> Result<Canvas> {
        if self.fill.is_empty() {
            self.fill = " ".into();
        }
        self.validate()?;

        let (width, height) = (self.width as usize, self.height as usize);
        Ok(Canvas {
            id,
            name: self.name,
            content: self.fill.repeat(width * height),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CanvasError;

    #[test]
    fn test_from_text() {
        let canvas = Canvas::from_text("1", "c1", "\nab\ncd\nef\n");
        assert_eq!(canvas.width, 2);
        assert_eq!(canvas.height, 3);
        assert_eq!(canvas.content, "abcdef");
        assert!(canvas.validate().is_ok());
    }

    #[test]
    fn test_contains() {
        let canvas = Canvas::from_text("1", "c1", "abc\ndef");
        assert!(canvas.contains(Coordinates::new(0, 0)));
        assert!(canvas.contains(Coordinates::new(2, 1)));
        assert!(!canvas.contains(Coordinates::new(3, 1)));
        assert!(!canvas.contains(Coordinates::new(2, 2)));
        assert!(!canvas.contains(Coordinates::new(-1, 0)));
        assert!(!canvas.contains(Coordinates::new(0, -1)));
    }

    #[test]
    fn test_grid_codec() {
        let mut canvas = Canvas::from_text("1", "c1", "abc\ndef");
        let mut grid = canvas.as_grid();
        assert_eq!(grid.get(1, 0), 'b');
        assert_eq!(grid.get(0, 1), 'd');

        grid.set(2, 1, 'Z');
        canvas.apply_grid(&grid);
        assert_eq!(canvas.content, "abcdeZ");
        assert_eq!(grid.offset(Coordinates::new(2, 1)), Some(5));
        assert_eq!(grid.offset(Coordinates::new(3, 0)), None);
    }

    #[test]
    fn test_display_marks_spaces() {
        let canvas = Canvas::from_text("7", "pic", "a b\n c ");
        assert_eq!(
            canvas.to_string(),
            "id = 7, name = pic, w = 3, h = 2\na_b\n_c_\n"
        );
    }

    #[test]
    fn test_validate_rejects_bad_length() {
        let canvas = Canvas {
            id: "1".into(),
            name: "bad".into(),
            content: "abc".into(),
            width: 2,
            height: 2,
        };
        let err = canvas.validate().unwrap_err();
        assert!(err.to_string().contains("content length"));
    }

    #[test]
    fn test_create_args_default_fill() {
        let args = CreateArgs {
            name: "Foo".into(),
            fill: String::new(),
            width: 2,
            height: 1,
        };
        let canvas = args.into_canvas("1".into()).unwrap();
        assert_eq!(canvas.content, "  ");
        assert_eq!(canvas.width, 2);
    }

    #[test]
    fn test_create_args_collects_violations() {
        let args = CreateArgs {
            name: String::new(),
            fill: "ab".into(),
            width: 0,
            height: -1,
        };
        let err = args.validate().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CanvasError::InvalidArgument(_)));
        assert!(msg.contains("name cannot be empty"));
        assert!(msg.contains("fill must be exactly one character"));
        assert!(msg.contains("width cannot be less than 1"));
        assert!(msg.contains("height cannot be less than 1"));
        assert!(!msg.contains("cells"));
    }

    #[test]
    fn test_create_args_rejects_oversized_canvas() {
        for (width, height) in [(1 << 32, 1 << 32), (100_000, 100_000), (i64::MAX, 2)] {
            let args = CreateArgs {
                name: "huge".into(),
                fill: "x".into(),
                width,
                height,
            };
            let err = args.into_canvas("1".into()).unwrap_err();
            assert!(matches!(err, CanvasError::InvalidArgument(_)));
            assert!(err.to_string().contains("1048576 cells"));
        }

        let largest = CreateArgs {
            name: "largest".into(),
            fill: "x".into(),
            width: 1024,
            height: 1024,
        };
        assert_eq!(largest.into_canvas("1".into()).unwrap().content.len(), MAX_CELLS);
    }

    #[test]
    fn test_validate_rejects_oversized_dimensions() {
        let canvas = Canvas {
            id: "1".into(),
            name: "corrupt".into(),
            content: String::new(),
            width: usize::MAX,
            height: 2,
        };
        assert!(canvas.validate().unwrap_err().to_string().contains("cells"));
    }
}
