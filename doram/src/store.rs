use num_traits::Zero;

use crate::error::Error;
use crate::ring::Ring31;

/// One party's additive share of the logical array.
///
/// Cells start at zero and are only ever mutated by oblivious writes,
/// which add a share of `v * e_idx` component-wise.
pub struct ShareStore {
    cells: Vec<Ring31>,
}

impl ShareStore {
    /// Zero-filled store with the given number of rows.
    pub fn new(rows: usize) -> Self {
        Self {
            cells: vec![Ring31::zero(); rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn read(&self, row: usize) -> Result<Ring31, Error> {
        self.cells.get(row).copied().ok_or(Error::IndexOutOfRange {
            index: row,
            rows: self.cells.len(),
        })
    }

    pub fn write(&mut self, row: usize, value: Ring31) -> Result<(), Error> {
        let rows = self.cells.len();
        match self.cells.get_mut(row) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index: row, rows }),
        }
    }

    /// Add a full-length share vector into the store component-wise.
    pub fn oblivious_add(&mut self, delta: &[Ring31]) -> Result<(), Error> {
        if delta.len() != self.cells.len() {
            return Err(Error::LengthMismatch {
                expected: self.cells.len(),
                found: delta.len(),
            });
        }
        for (cell, &d) in self.cells.iter_mut().zip(delta) {
            *cell += d;
        }
        Ok(())
    }

    /// Copy of the current cells, taken at the start of a read session.
    pub fn snapshot(&self) -> Vec<Ring31> {
        self.cells.clone()
    }
}
