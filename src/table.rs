//! Plain text tables for command output and the menu.
//!
//! Widths are measured in terminal columns, so the status emoji line up.
use std::fmt::Display;

use console::measure_text_width;

/// Gap between two columns.
const COLUMN_GAP: usize = 2;

pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Column name and the function producing the cell for an item.
pub type TableColumn<S, T> = (S, fn(&T) -> String);

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn from_iter<'a, S, Iter, Item>(iter: Iter, columns: &[TableColumn<S, Item>]) -> Self
    where
        S: Display,
        Iter: IntoIterator<Item = &'a Item>,
        Item: 'a,
    {
        let header = columns.iter().map(|(name, _)| name.to_string()).collect();
        let rows = iter
            .into_iter()
            .map(|item| columns.iter().map(|(_, cell)| cell(item)).collect())
            .collect();

        Self::new(header, rows)
    }

    fn rows(&self) -> impl Iterator<Item = &Vec<String>> {
        std::iter::once(&self.header).chain(self.rows.iter())
    }

    /// Widest cell of every column, header included.
    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.header.len()];
        for row in self.rows() {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(measure_text_width(cell));
            }
        }
        widths
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.column_widths();

        for row in self.rows() {
            let mut line = String::new();
            for (cell, width) in row.iter().zip(&widths) {
                line.push_str(cell);
                let padding = width.saturating_sub(measure_text_width(cell)) + COLUMN_GAP;
                line.extend(std::iter::repeat_n(' ', padding));
            }
            writeln!(f, "{}", line.trim_end())?;
        }

        Ok(())
    }
}

/// Shorten `text` to at most `width` columns, marking the cut with `...`.
pub fn truncate(text: &str, width: usize) -> String {
    if measure_text_width(text) <= width {
        return text.to_string();
    }
    console::truncate_str(text, width, "...").into_owned()
}
