use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern needs at least 2x2 inner corners (got {columns}x{rows})")]
    TooSmall { columns: u32, rows: u32 },
    #[error("invalid pattern `{0}`, expected COLUMNSxROWS such as 9x6")]
    Parse(String),
}

/// Inner-corner layout of a chessboard: `columns` intersections per row,
/// `rows` intersections per column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PatternDims", into = "PatternDims")]
pub struct PatternSpec {
    columns: u32,
    rows: u32,
}

#[derive(Serialize, Deserialize)]
struct PatternDims {
    columns: u32,
    rows: u32,
}

impl TryFrom<PatternDims> for PatternSpec {
    type Error = PatternError;

    fn try_from(dims: PatternDims) -> Result<Self, Self::Error> {
        PatternSpec::new(dims.columns, dims.rows)
    }
}

impl From<PatternSpec> for PatternDims {
    fn from(p: PatternSpec) -> Self {
        Self {
            columns: p.columns,
            rows: p.rows,
        }
    }
}

impl PatternSpec {
    pub fn new(columns: u32, rows: u32) -> Result<Self, PatternError> {
        if columns < 2 || rows < 2 {
            return Err(PatternError::TooSmall { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of inner corners, `columns * rows`.
    pub fn corner_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Board-frame coordinates of every inner corner in square units.
    ///
    /// Ordered row-major by `(row, column)`; corner `(r, c)` sits at
    /// `(c, -r, 0)` so that board y grows upwards while image rows grow down.
    pub fn world_points(&self) -> Vec<Point3<f64>> {
        let mut out = Vec::with_capacity(self.corner_count());
        for r in 0..self.rows {
            for c in 0..self.columns {
                out.push(Point3::new(c as f64, 0.0 - r as f64, 0.0));
            }
        }
        out
    }
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self {
            columns: 9,
            rows: 6,
        }
    }
}

impl fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

impl FromStr for PatternSpec {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || PatternError::Parse(s.to_string());
        let (c, r) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(parse_err)?;
        let columns = c.trim().parse().map_err(|_| parse_err())?;
        let rows = r.trim().parse().map_err(|_| parse_err())?;
        Self::new(columns, rows)
    }
}
