//! Table grids rebuilt from classified cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::TableCell;
use crate::error::{Error, Result};

/// A table on one page, as an ordered grid of cell texts.
///
/// Row indices are contiguous from 0 and every row has the same number of
/// columns; [`Table::from_cells`] refuses anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Rows of cell text, top to bottom
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Rebuild a grid from the cells of one detected region.
    ///
    /// Fails with [`Error::TableGrid`] when the cells are empty, leave a
    /// row or column gap, repeat a position, or form ragged rows.
    pub fn from_cells(page_number: u32, cells: &[TableCell]) -> Result<Self> {
        let grid_error = |reason: String| Error::TableGrid {
            page: page_number,
            reason,
        };

        if cells.is_empty() {
            return Err(grid_error("region has no cells".to_string()));
        }

        let mut grid: BTreeMap<usize, BTreeMap<usize, &str>> = BTreeMap::new();
        for cell in cells {
            let row = grid.entry(cell.row_index).or_default();
            if row.insert(cell.col_index, cell.text.as_str()).is_some() {
                return Err(grid_error(format!(
                    "duplicate cell at row {} column {}",
                    cell.row_index, cell.col_index
                )));
            }
        }

        let mut rows = Vec::with_capacity(grid.len());
        let mut width: Option<usize> = None;
        for (expected_row, (row_index, columns)) in grid.into_iter().enumerate() {
            if row_index != expected_row {
                return Err(grid_error(format!(
                    "row indices are not contiguous (missing row {})",
                    expected_row
                )));
            }
            for (expected_col, col_index) in columns.keys().enumerate() {
                if *col_index != expected_col {
                    return Err(grid_error(format!(
                        "row {} is missing column {}",
                        row_index, expected_col
                    )));
                }
            }
            match width {
                None => width = Some(columns.len()),
                Some(w) if w != columns.len() => {
                    return Err(grid_error(format!(
                        "ragged rows: row {} has {} columns, expected {}",
                        row_index,
                        columns.len(),
                        w
                    )));
                }
                Some(_) => {}
            }
            rows.push(columns.into_values().map(str::to_string).collect());
        }

        Ok(Self { page_number, rows })
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// One line per row, cells separated by `" | "`.
    pub fn render_compact(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The first `limit` rows that contain any text, each rendered as
    /// `a | b | c` and joined with `"; "`.
    pub fn summary(&self, limit: usize) -> String {
        self.rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .take(limit)
            .map(|row| row.join(" | "))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
