//! Row-major precipitation fields.

/// A 2D precipitation field, row-major. NaN marks a cell with no data.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipField {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

impl PrecipField {
    /// Build a field, returning `None` if `values` does not hold `rows * cols` cells.
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Option<Self> {
        (rows.checked_mul(cols)? == values.len()).then_some(Self { rows, cols, values })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            self.values.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}
