//! Work-group size grids for kernel sweeps.
//!
//! A [`Grid`] is three independent [`GridAxis`] values, one per work-group
//! dimension. [`Grid::points`] walks their Cartesian product in a fixed order:
//! axis 0 varies slowest and axis 2 fastest, the same order as three nested
//! loops written in declaration order.

use std::collections::HashSet;
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of sweep dimensions.
pub const GRID_DIMS: usize = 3;

/// Errors raised when validating a single axis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AxisError {
    #[error("axis has no candidate values")]
    Empty,

    #[error("value {0} appears more than once")]
    Duplicate(u32),

    #[error("values must be positive, found 0")]
    Zero,
}

/// An axis error tagged with the dimension it was found on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("grid axis {axis} is invalid: {source}")]
pub struct GridError {
    pub axis: usize,
    #[source]
    pub source: AxisError,
}

/// Ordered, non-empty set of distinct positive candidate values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct GridAxis(Vec<u32>);

impl GridAxis {
    pub fn new(values: Vec<u32>) -> Result<Self, AxisError> {
        if values.is_empty() {
            return Err(AxisError::Empty);
        }
        let mut seen = HashSet::with_capacity(values.len());
        for &value in &values {
            if value == 0 {
                return Err(AxisError::Zero);
            }
            if !seen.insert(value) {
                return Err(AxisError::Duplicate(value));
            }
        }
        Ok(Self(values))
    }

    /// Single-value axis.
    pub fn single(value: u32) -> Result<Self, AxisError> {
        Self::new(vec![value])
    }

    /// `[1, 2, 4, ..., 2^(count-1)]`.
    pub fn powers_of_two(count: u32) -> Result<Self, AxisError> {
        Self::new((0..count.min(32)).map(|shift| 1u32 << shift).collect())
    }

    pub fn values(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed axis; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<u32>> for GridAxis {
    type Error = AxisError;

    fn try_from(values: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<GridAxis> for Vec<u32> {
    fn from(axis: GridAxis) -> Self {
        axis.0
    }
}

/// One concrete `(v0, v1, v2)` drawn from a grid.
///
/// Displays as `v0,v1,v2`, which is also the key used for it in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationPoint(pub [u32; GRID_DIMS]);

impl ConfigurationPoint {
    pub const fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self([v0, v1, v2])
    }

    pub fn values(&self) -> [u32; GRID_DIMS] {
        self.0
    }

    /// Work items per work-group.
    pub fn volume(&self) -> u64 {
        self.0.iter().map(|&v| u64::from(v)).product()
    }
}

impl fmt::Display for ConfigurationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [v0, v1, v2] = self.0;
        write!(f, "{v0},{v1},{v2}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration point `{0}`: expected three comma-separated integers")]
pub struct PointParseError(String);

impl FromStr for ConfigurationPoint {
    type Err = PointParseError;

    /// Accepts `1,4,1` and the parenthesized `(1, 4, 1)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut values = [0u32; GRID_DIMS];
        let mut parts = inner.split(',');
        for slot in &mut values {
            let part = parts.next().ok_or_else(|| PointParseError(s.to_string()))?;
            *slot = part.trim().parse().map_err(|_| PointParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(PointParseError(s.to_string()));
        }
        Ok(Self(values))
    }
}

/// Three sweep axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    axes: [GridAxis; GRID_DIMS],
}

impl Grid {
    pub fn new(axes: [GridAxis; GRID_DIMS]) -> Self {
        Self { axes }
    }

    /// Validate raw axis values, reporting the first offending dimension.
    pub fn from_values(values: [Vec<u32>; GRID_DIMS]) -> Result<Self, GridError> {
        let [a0, a1, a2] = values;
        let axis = |axis: usize, values: Vec<u32>| {
            GridAxis::new(values).map_err(|source| GridError { axis, source })
        };
        Ok(Self::new([axis(0, a0)?, axis(1, a1)?, axis(2, a2)?]))
    }

    /// The 1x1x1 grid used by programs that ignore work-group tuning.
    pub fn single_point() -> Self {
        let one = GridAxis(vec![1]);
        Self::new([one.clone(), one.clone(), one])
    }

    /// Powers of two from 1 to 512 on the first two axes, `[1]` on the third.
    pub fn work_group_default() -> Self {
        let sweep = GridAxis((0..10).map(|shift| 1u32 << shift).collect());
        Self::new([sweep.clone(), sweep, GridAxis(vec![1])])
    }

    pub fn axis(&self, dim: usize) -> &GridAxis {
        &self.axes[dim]
    }

    pub fn axes(&self) -> &[GridAxis; GRID_DIMS] {
        &self.axes
    }

    /// Number of configuration points, `a * b * c`.
    pub fn len(&self) -> usize {
        self.axes.iter().map(GridAxis::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_single_point(&self) -> bool {
        self.len() == 1
    }

    /// Lazily enumerate the Cartesian product, axis 2 varying fastest.
    pub fn points(&self) -> Points<'_> {
        Points { grid: self, cursor: [0; GRID_DIMS], remaining: self.len() }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::work_group_default()
    }
}

impl<'a> IntoIterator for &'a Grid {
    type Item = ConfigurationPoint;
    type IntoIter = Points<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.points()
    }
}

/// Odometer over a [`Grid`]; see [`Grid::points`].
#[derive(Debug, Clone)]
pub struct Points<'a> {
    grid: &'a Grid,
    cursor: [usize; GRID_DIMS],
    remaining: usize,
}

impl Iterator for Points<'_> {
    type Item = ConfigurationPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let axes = &self.grid.axes;
        let point = ConfigurationPoint([
            axes[0].0[self.cursor[0]],
            axes[1].0[self.cursor[1]],
            axes[2].0[self.cursor[2]],
        ]);
        self.remaining -= 1;

        for dim in (0..GRID_DIMS).rev() {
            self.cursor[dim] += 1;
            if self.cursor[dim] < axes[dim].len() {
                break;
            }
            self.cursor[dim] = 0;
        }
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Points<'_> {}

impl FusedIterator for Points<'_> {}
