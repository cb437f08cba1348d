//! Named-column relation tables and the sort-merge join.
//!
//! A [`Table`] holds one column per synonym and one row per satisfying
//! binding. Cells are raw `u32`s: statement numbers for statement synonyms
//! and interned name ids for variables, constants and procedures. Rendering
//! to strings happens once, at final projection.
//!
//! Rows are kept duplicate-free by construction: clause evaluators emit
//! distinct bindings, and a join of duplicate-free tables is duplicate-free.

use std::cmp::Ordering;

/// Raw cell value. Statement number or interned name id depending on the
/// column's synonym kind; the projection stage knows which.
pub type Cell = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    cols: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(cols: Vec<String>) -> Table {
        Table {
            cols,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.cols.len());
        self.rows.push(row);
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.cols.iter().position(|c| c == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Natural join on columns with equal names. No shared column means a
    /// cross product; otherwise both row sets are sorted on the shared key
    /// and merged with a double pointer, emitting every combination within
    /// each equal-key block.
    pub fn join(self, other: Table) -> Table {
        let shared: Vec<(usize, usize)> = self
            .cols
            .iter()
            .enumerate()
            .filter_map(|(i, col)| other.col_index(col).map(|j| (i, j)))
            .collect();
        if shared.is_empty() {
            return self.cross(other);
        }

        let left_key: Vec<usize> = shared.iter().map(|&(i, _)| i).collect();
        let right_key: Vec<usize> = shared.iter().map(|&(_, j)| j).collect();
        let right_keep: Vec<usize> = (0..other.cols.len())
            .filter(|j| !right_key.contains(j))
            .collect();

        let mut cols = self.cols;
        cols.extend(right_keep.iter().map(|&j| other.cols[j].clone()));

        let mut left = self.rows;
        let mut right = other.rows;
        left.sort_unstable_by(|a, b| cmp_key(&left_key, a, &left_key, b));
        right.sort_unstable_by(|a, b| cmp_key(&right_key, a, &right_key, b));

        let mut out = Table::new(cols);
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            match cmp_key(&left_key, &left[i], &right_key, &right[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    let i_end = block_end(&left, i, &left_key);
                    let j_end = block_end(&right, j, &right_key);
                    for l in &left[i..i_end] {
                        for r in &right[j..j_end] {
                            let mut row = l.clone();
                            row.extend(right_keep.iter().map(|&k| r[k]));
                            out.rows.push(row);
                        }
                    }
                    i = i_end;
                    j = j_end;
                }
            }
        }
        out
    }

    fn cross(self, other: Table) -> Table {
        let mut cols = self.cols;
        cols.extend(other.cols);
        let mut out = Table::new(cols);
        for l in &self.rows {
            for r in &other.rows {
                let mut row = l.clone();
                row.extend_from_slice(r);
                out.rows.push(row);
            }
        }
        out
    }
}

/// Compare two rows on their respective key column lists, position by
/// position.
fn cmp_key(a_key: &[usize], a: &[Cell], b_key: &[usize], b: &[Cell]) -> Ordering {
    for (&x, &y) in a_key.iter().zip(b_key) {
        match a[x].cmp(&b[y]) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// First index past the run of rows sharing `rows[start]`'s key.
fn block_end(rows: &[Vec<Cell>], start: usize, key: &[usize]) -> usize {
    let mut end = start + 1;
    while end < rows.len() && cmp_key(key, &rows[start], key, &rows[end]) == Ordering::Equal {
        end += 1;
    }
    end
}

/// What evaluating one clause produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalOutcome {
    /// The clause binds no synonyms and holds. (A synonym-free clause that
    /// fails yields an empty zero-column table instead, which annihilates
    /// its group.)
    Unit,
    Rows(Table),
}

impl EvalOutcome {
    pub fn truth(holds: bool) -> EvalOutcome {
        if holds {
            EvalOutcome::Unit
        } else {
            EvalOutcome::Rows(Table::new(Vec::new()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cols: &[&str], rows: &[&[Cell]]) -> Table {
        let mut t = Table::new(cols.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row.to_vec());
        }
        t
    }

    #[test]
    fn join_without_shared_columns_is_a_cross_product() {
        let a = table(&["s"], &[&[1], &[2]]);
        let b = table(&["v"], &[&[7], &[8]]);
        let j = a.join(b);
        assert_eq!(j.cols(), ["s", "v"]);
        let mut rows = j.rows().to_vec();
        rows.sort();
        assert_eq!(rows, vec![vec![1, 7], vec![1, 8], vec![2, 7], vec![2, 8]]);
    }

    #[test]
    fn join_matches_rows_on_the_shared_column() {
        let a = table(&["s", "t"], &[&[1, 10], &[2, 20], &[3, 30]]);
        let b = table(&["t", "v"], &[&[20, 5], &[30, 6], &[40, 7]]);
        let j = a.join(b);
        assert_eq!(j.cols(), ["s", "t", "v"]);
        let mut rows = j.rows().to_vec();
        rows.sort();
        assert_eq!(rows, vec![vec![2, 20, 5], vec![3, 30, 6]]);
    }

    #[test]
    fn equal_key_blocks_emit_every_combination() {
        let a = table(&["s", "t"], &[&[1, 9], &[2, 9], &[3, 8]]);
        let b = table(&["t", "u"], &[&[9, 100], &[9, 200], &[8, 300]]);
        let j = a.join(b);
        let mut rows = j.rows().to_vec();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                vec![1, 9, 100],
                vec![1, 9, 200],
                vec![2, 9, 100],
                vec![2, 9, 200],
                vec![3, 8, 300],
            ]
        );
    }

    #[test]
    fn join_on_two_shared_columns_uses_the_whole_key() {
        let a = table(&["s", "t"], &[&[1, 2], &[1, 3]]);
        let b = table(&["t", "s"], &[&[2, 1], &[3, 9]]);
        let j = a.join(b);
        assert_eq!(j.cols(), ["s", "t"]);
        assert_eq!(j.rows(), [vec![1, 2]]);
    }

    #[test]
    fn empty_and_zero_column_tables_annihilate() {
        let a = table(&["s"], &[&[1]]);
        let empty = Table::new(vec!["s".to_string()]);
        assert!(a.clone().join(empty).is_empty());

        let falsy = match EvalOutcome::truth(false) {
            EvalOutcome::Rows(t) => t,
            EvalOutcome::Unit => unreachable!(),
        };
        assert!(a.join(falsy).is_empty());
    }
}
