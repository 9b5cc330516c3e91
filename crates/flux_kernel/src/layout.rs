//! Derived `(row, col)` view of grid-topology grids

use serde::Serialize;

use flux_lang::{FluxDocument, Topology};

use crate::state::{grid_dimensions, RuntimeState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutCell {
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub tags: Vec<String>,
    pub content: String,
    pub dynamic: f64,
    pub density: f64,
    pub salience: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    pub name: String,
    pub page: Option<i64>,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<LayoutCell>,
}

/// Lay out every `grid`-topology grid of `doc` using the cells in `snapshot`.
///
/// Grids with another topology are not laid out and are left out.
pub fn compute_grid_layout(doc: &FluxDocument, snapshot: &RuntimeState) -> Vec<GridLayout> {
    doc.grids.iter()
        .filter(|grid| grid.topology == Topology::Grid)
        .filter_map(|grid| {
            let Some(state) = snapshot.grid(&grid.name) else {
                log::warn!("Grid '{}' missing from runtime snapshot", grid.name);
                return None;
            };
            let (rows, cols) = grid_dimensions(grid);
            let cells = state.iter()
                .map(|(row, col, cell)| LayoutCell {
                    id: cell.id.clone(),
                    row,
                    col,
                    tags: cell.tags.clone(),
                    content: cell.content.clone(),
                    dynamic: cell.dynamic,
                    density: cell.density,
                    salience: cell.salience,
                })
                .collect();
            Some(GridLayout {
                name: grid.name.clone(),
                page: grid.page,
                rows,
                cols,
                cells,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::init_runtime_state;
    use flux_lang::parse_document;

    #[test]
    fn test_layout_positions() {
        let doc = parse_document(r#"document {
            grid board { cols = 2; page = 3; cell a {} cell b {} cell c {} }
            grid web { topology = graph; cell n {} }
        }"#).unwrap();
        let layout = compute_grid_layout(&doc, &init_runtime_state(&doc));

        assert_eq!(layout.len(), 1);
        let board = &layout[0];
        assert_eq!((board.rows, board.cols, board.page), (2, 2, Some(3)));
        let positions: Vec<_> = board.cells.iter().map(|c| (c.id.as_str(), c.row, c.col)).collect();
        assert_eq!(positions, vec![("a", 0, 0), ("b", 0, 1), ("c", 1, 0), ("r1c1", 1, 1)]);
    }

    #[test]
    fn test_single_row_without_dimensions() {
        let doc = parse_document("document { grid strip { cell a {} cell b {} cell c {} } }").unwrap();
        let layout = compute_grid_layout(&doc, &init_runtime_state(&doc));
        assert_eq!((layout[0].rows, layout[0].cols), (1, 3));
        assert!(layout[0].cells.iter().all(|c| c.row == 0));
    }
}
