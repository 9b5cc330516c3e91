//! Runtime state: parameter values plus one materialised matrix per grid

use std::collections::BTreeMap;
use serde::Serialize;

use flux_lang::{FluxCell, FluxDocument, FluxGrid, Value};

/// A grid materialised as a row-major `rows x cols` matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridState {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<FluxCell>>,
}

impl GridState {
    /// Materialise a declared grid, padding unfilled positions with blank cells
    pub fn from_decl(grid: &FluxGrid) -> Self {
        let (rows, cols) = grid_dimensions(grid);
        let capacity = rows * cols;

        if grid.cells.len() > capacity {
            log::warn!(
                "Grid '{}' declares {} cells but is {}x{}; dropping {} cell(s)",
                grid.name,
                grid.cells.len(),
                rows,
                cols,
                grid.cells.len() - capacity
            );
        }

        let mut declared = grid.cells.iter();
        let cells = (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| declared.next().cloned().unwrap_or_else(|| blank_cell(row, col)))
                    .collect()
            })
            .collect();

        Self {
            name: grid.name.clone(),
            rows,
            cols,
            cells,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&FluxCell> {
        self.cells.get(row).and_then(|r| r.get(col))
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut FluxCell> {
        self.cells.get_mut(row).and_then(|r| r.get_mut(col))
    }

    /// Row-major iterator over `(row, col, cell)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &FluxCell)> {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells.iter().enumerate().map(move |(col, cell)| (row, col, cell))
        })
    }

    /// Content of every cell in row-major order
    pub fn contents(&self) -> Vec<&str> {
        self.iter().map(|(_, _, cell)| cell.content.as_str()).collect()
    }
}

/// In-memory state of a document between docsteps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    pub docstep_index: u64,
    pub params: BTreeMap<String, Value>,
    pub grids: BTreeMap<String, GridState>,
}

impl RuntimeState {
    pub fn grid(&self, name: &str) -> Option<&GridState> {
        self.grids.get(name)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// Initial state: declared parameter initials and freshly materialised grids
pub fn init_runtime_state(doc: &FluxDocument) -> RuntimeState {
    let params = doc.state.params.iter()
        .map(|param| (param.name.clone(), param.initial.clone()))
        .collect();

    let grids = doc.grids.iter()
        .map(|grid| (grid.name.clone(), GridState::from_decl(grid)))
        .collect();

    RuntimeState {
        docstep_index: 0,
        params,
        grids,
    }
}

/// Effective `(rows, cols)` of a grid.
///
/// Missing dimensions are derived from the number of declared cells: only
/// `cols` gives `ceil(n / cols)` rows, only `rows` gives `ceil(n / rows)`
/// columns, and neither gives a single row of `n` cells.
pub fn grid_dimensions(grid: &FluxGrid) -> (usize, usize) {
    let n = grid.cells.len();
    match (grid.rows, grid.cols) {
        (Some(rows), Some(cols)) => (rows, cols),
        (None, Some(cols)) => (if cols == 0 { 0 } else { n.div_ceil(cols) }, cols),
        (Some(rows), None) => (rows, if rows == 0 { 0 } else { n.div_ceil(rows) }),
        (None, None) if n == 0 => (0, 0),
        (None, None) => (1, n),
    }
}

/// Placeholder for a position with no declared cell
pub fn blank_cell(row: usize, col: usize) -> FluxCell {
    FluxCell {
        id: format!("r{}c{}", row, col),
        ..FluxCell::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_lang::parse_document;

    fn grid(source: &str) -> FluxGrid {
        let doc = parse_document(&format!("document {{ {} }}", source)).unwrap();
        doc.grids.into_iter().next().unwrap()
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(grid_dimensions(&grid("grid g { rows = 2; cols = 3; }")), (2, 3));
        assert_eq!(grid_dimensions(&grid("grid g { cols = 2; cell a {} cell b {} cell c {} }")), (2, 2));
        assert_eq!(grid_dimensions(&grid("grid g { rows = 2; cell a {} cell b {} cell c {} }")), (2, 2));
        assert_eq!(grid_dimensions(&grid("grid g { cell a {} cell b {} cell c {} }")), (1, 3));
        assert_eq!(grid_dimensions(&grid("grid g { }")), (0, 0));
    }

    #[test]
    fn test_padding_with_blank_cells() {
        let state = GridState::from_decl(&grid("grid g { size { rows = 2; cols = 2; } cell a { content = \"x\"; } }"));
        assert_eq!(state.get(0, 0).unwrap().id, "a");
        assert_eq!(state.get(0, 1).unwrap().id, "r0c1");
        assert_eq!(state.get(1, 1).unwrap().id, "r1c1");
        assert_eq!(state.get(1, 1).unwrap().dynamic, 0.0);
        assert!(state.get(2, 0).is_none());
    }

    #[test]
    fn test_overflow_cells_dropped() {
        let state = GridState::from_decl(&grid("grid g { rows = 1; cols = 1; cell a {} cell b {} }"));
        assert_eq!(state.iter().count(), 1);
        assert_eq!(state.get(0, 0).unwrap().id, "a");
    }

    #[test]
    fn test_init_runtime_state() {
        let doc = parse_document(r#"document {
            state { param tempo: float @ 120; param label: string @ "x"; }
            grid g { cols = 2; cell a {} }
        }"#).unwrap();
        let state = init_runtime_state(&doc);
        assert_eq!(state.docstep_index, 0);
        assert_eq!(state.param("tempo"), Some(&Value::Float(120.0)));
        assert_eq!(state.grid("g").unwrap().contents(), vec!["", ""]);
    }
}
