//! Measure stage of table rendering. Everything here is pure arithmetic over
//! strings; drawing lives in `report`.

use crate::error::RenderError;
use crate::pdf::{text_width, Font};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.headers.is_empty() {
            return Err(RenderError::EmptySchema);
        }
        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != self.headers.len() {
                return Err(RenderError::ColumnMismatch {
                    row: index,
                    expected: self.headers.len(),
                    found: row.len(),
                });
            }
        }
        Ok(())
    }
}

/// Width budget for one table, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBounds {
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    pub font: Font,
    pub size: f64,
    pub line_height: f64,
}

/// Proportional to each column's longest rendered text (header included),
/// clamped to `[min, max]`. If the minimums alone overflow the budget the
/// widths are scaled down to fit.
pub fn column_widths(table: &Table, bounds: ColumnBounds) -> Vec<f64> {
    let lengths: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            table
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .chain(std::iter::once(header))
                .flat_map(|cell| cell.lines())
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect();
    let sum: usize = lengths.iter().sum();

    let widths: Vec<f64> = lengths
        .iter()
        .map(|&len| (bounds.total * len as f64 / sum as f64).clamp(bounds.min, bounds.max))
        .collect();

    let used: f64 = widths.iter().sum();
    if used > bounds.total {
        let scale = bounds.total / used;
        widths.into_iter().map(|w| w * scale).collect()
    } else {
        widths
    }
}

fn split_long_word(word: &str, width: f64, style: CellStyle) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        current.push(c);
        if text_width(&current, style.font, style.size) > width && current.chars().count() > 1 {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedy word wrap. Explicit newlines are kept; words wider than the cell are
/// broken by character. Always returns at least one line.
pub fn wrap_text(text: &str, width: f64, style: CellStyle) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, style.font, style.size) <= width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, style.font, style.size) <= width {
                current = word.to_string();
            } else {
                let mut pieces = split_long_word(word, width, style);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Shared between the measure and draw stages of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub widths: Vec<f64>,
    pub header_style: CellStyle,
    pub body_style: CellStyle,
    /// Horizontal padding inside each cell, per side.
    pub padding: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowMetrics {
    pub lines: Vec<Vec<String>>,
    pub height: f64,
}

impl TableLayout {
    pub fn measure(
        table: &Table,
        bounds: ColumnBounds,
        header_style: CellStyle,
        body_style: CellStyle,
    ) -> Result<Self, RenderError> {
        table.validate()?;
        Ok(Self {
            widths: column_widths(table, bounds),
            header_style,
            body_style,
            padding: 1.0,
        })
    }

    /// Every cell in the row gets the height of the tallest one.
    pub fn measure_row(&self, cells: &[String], style: CellStyle) -> RowMetrics {
        let lines: Vec<Vec<String>> = cells
            .iter()
            .zip(&self.widths)
            .map(|(cell, width)| wrap_text(cell, (width - 2.0 * self.padding).max(1.0), style))
            .collect();
        let tallest = lines.iter().map(Vec::len).max().unwrap_or(1).max(1);

        RowMetrics {
            lines,
            height: tallest as f64 * style.line_height,
        }
    }
}
