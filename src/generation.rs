//! One row of an elementary automaton and the step that produces the next one.
//!
//! Rows are finite rings: the left neighbor of cell 0 is the last cell and the
//! right neighbor of the last cell is cell 0. Every backend must reproduce this
//! wraparound exactly; open-boundary (zero padded) stepping gives different
//! edge cells.

use crate::rules::RuleTable;

/// Cell states of one generation, each 0 or 1
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Row {
    cells: Vec<u8>,
}

impl Row {
    pub fn zeros(len: usize) -> Self {
        Self { cells: vec![0; len] }
    }

    /// All zeros except a single live cell at `len / 2`
    pub fn seed_centered(len: usize) -> Self {
        let mut row = Self::zeros(len);
        if len > 0 {
            row.cells[len / 2] = 1;
        }
        row
    }

    /// Build a row from arbitrary cell values; any non-zero value is live.
    pub fn from_cells<I, T>(cells: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<u32>,
    {
        Self {
            cells: cells.into_iter().map(|c| u8::from(c.into() != 0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Cell at `index` with ring wraparound; negative indices count from the end.
    pub fn get_wrapped(&self, index: isize) -> u8 {
        let len = self.cells.len() as isize;
        if len == 0 {
            return 0;
        }
        self.cells[index.rem_euclid(len) as usize]
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// Copy of this row at a new width, keeping the pattern centered.
    ///
    /// Cells move by `new_len / 2 - len / 2`. Cells shifted past either edge
    /// are dropped and uncovered cells are 0.
    pub fn recentered(&self, new_len: usize) -> Row {
        let shift = (new_len / 2) as isize - (self.len() / 2) as isize;
        let mut out = Row::zeros(new_len);
        for (i, &cell) in self.cells.iter().enumerate() {
            let target = i as isize + shift;
            if (0..new_len as isize).contains(&target) {
                out.cells[target as usize] = cell;
            }
        }
        out
    }

    /// Cells as `u32`, the layout the GPU storage buffers use
    pub fn to_u32_cells(&self) -> Vec<u32> {
        self.cells.iter().map(|&c| u32::from(c)).collect()
    }

    /// Next generation of this row under `rule`
    pub fn next(&self, rule: &RuleTable) -> Row {
        next_row(self, rule)
    }
}

impl From<Vec<u8>> for Row {
    fn from(cells: Vec<u8>) -> Self {
        Row::from_cells(cells)
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &cell in &self.cells {
            f.write_str(if cell != 0 { "#" } else { "." })?;
        }
        Ok(())
    }
}

/// Compute the generation following `current` under `rule`.
///
/// The output has the same length as the input. Neighbors of cell `i` are
/// `current[(i - 1 + len) % len]` and `current[(i + 1) % len]`.
pub fn next_row(current: &Row, rule: &RuleTable) -> Row {
    let len = current.len();
    let cells = &current.cells;
    let mut next = Vec::with_capacity(len);
    for i in 0..len {
        let left = cells[(i + len - 1) % len];
        let center = cells[i];
        let right = cells[(i + 1) % len];
        next.push(rule.apply(left, center, right));
    }
    Row { cells: next }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(cells: &[u8]) -> Row {
        Row::from(cells.to_vec())
    }

    #[test]
    fn rule_30_single_step_from_center() {
        let next = next_row(&row(&[0, 0, 1, 0, 0]), &RuleTable::new(30));
        assert_eq!(next, row(&[0, 1, 1, 1, 0]));
    }

    #[test]
    fn edges_use_ring_neighbors() {
        // Cell 4 sees (0, 0, 1) through the wrap and becomes live under rule 30;
        // zero padding would have left it dead.
        let next = next_row(&row(&[1, 0, 0, 0, 0]), &RuleTable::new(30));
        assert_eq!(next, row(&[1, 1, 0, 0, 1]));
    }

    #[test]
    fn stepping_is_deterministic() {
        let rule = RuleTable::new(110);
        let start = row(&[0, 1, 1, 0, 1, 0, 0, 1, 1, 1, 0]);
        assert_eq!(next_row(&start, &rule), next_row(&start, &rule));
    }

    #[test]
    fn length_is_preserved() {
        let rule = RuleTable::new(90);
        for len in 1..40 {
            assert_eq!(next_row(&Row::seed_centered(len), &rule).len(), len);
        }
        assert!(next_row(&Row::zeros(0), &rule).is_empty());
    }

    #[test]
    fn single_cell_ring_is_its_own_neighbor() {
        // Neighborhood is (1, 1, 1) -> bit 7 of the rule
        assert_eq!(next_row(&row(&[1]), &RuleTable::new(128)), row(&[1]));
        assert_eq!(next_row(&row(&[1]), &RuleTable::new(127)), row(&[0]));
    }

    #[test]
    fn seed_puts_one_cell_at_floor_half() {
        assert_eq!(Row::seed_centered(5), row(&[0, 0, 1, 0, 0]));
        assert_eq!(Row::seed_centered(4), row(&[0, 0, 1, 0]));
        assert_eq!(Row::seed_centered(1), row(&[1]));
        assert!(Row::seed_centered(0).is_empty());
    }

    #[test]
    fn recenter_wider_pads_and_shifts_right() {
        let mut cells = vec![0u8; 10];
        cells[0] = 1;
        cells[5] = 1;
        cells[9] = 1;
        let wider = Row::from(cells).recentered(14);
        let mut expected = vec![0u8; 14];
        expected[2] = 1;
        expected[7] = 1;
        expected[11] = 1;
        assert_eq!(wider, Row::from(expected));
    }

    #[test]
    fn recenter_narrower_drops_out_of_range() {
        let mut cells = vec![0u8; 10];
        cells[1] = 1;
        cells[4] = 1;
        cells[5] = 1;
        cells[8] = 1;
        let narrower = Row::from(cells).recentered(6);
        // Shift is -2: cell 1 falls off the left, cell 8 off the right
        assert_eq!(narrower, row(&[0, 0, 1, 1, 0, 0]));
    }

    #[test]
    fn wrapped_lookup() {
        let r = row(&[1, 0, 0, 1]);
        assert_eq!(r.get_wrapped(-1), 1);
        assert_eq!(r.get_wrapped(4), 1);
        assert_eq!(r.get_wrapped(5), 0);
        assert_eq!(r.to_string(), "#..#");
    }

    #[test]
    fn from_cells_normalizes() {
        assert_eq!(Row::from_cells([0u32, 7, 1, 0]), row(&[0, 1, 1, 0]));
    }
}
