//! Results table

use std::io::{self, Write};

use owo_colors::{OwoColorize, Style};

use super::{DimensionKey, Outcome};

const HEADER: [&str; 5] = ["Model", "OS version", "Orientation", "Locale", "Outcome"];
const COLUMN_PADDING: usize = 3;

/// Outcome colors
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeStyles {
    pub success: Style,
    pub failure: Style,
    pub inconclusive: Style,
    pub skipped: Style,
}

impl OutcomeStyles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.failure = Style::new().red();
        self.inconclusive = Style::new().yellow();
        self.skipped = Style::new().blue();
    }

    fn for_outcome(&self, outcome: &Outcome) -> Style {
        match outcome {
            Outcome::Success => self.success,
            Outcome::Failure(_) => self.failure,
            Outcome::Inconclusive(_) => self.inconclusive,
            Outcome::Skipped(_) => self.skipped,
        }
    }
}

/// One row per step, aligned columns, outcome last
#[derive(Debug, Default)]
pub struct ResultsTable {
    rows: Vec<(DimensionKey, Outcome)>,
    styles: OutcomeStyles,
    colored: bool,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color the outcome column
    pub fn colorize(&mut self) {
        self.styles.colorize();
        self.colored = true;
    }

    pub fn push(&mut self, key: DimensionKey, outcome: Outcome) {
        self.rows.push((key, outcome));
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths are computed on plain text, before coloring
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let cells: Vec<([String; 4], &Outcome)> = self
            .rows
            .iter()
            .map(|(key, outcome)| {
                (
                    [
                        key.model.clone(),
                        key.os_version.clone(),
                        key.orientation.clone(),
                        key.locale.clone(),
                    ],
                    outcome,
                )
            })
            .collect();

        let mut widths = [0usize; 4];
        for (i, width) in widths.iter_mut().enumerate() {
            *width = HEADER[i].chars().count();
        }
        for (row, _) in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for (i, title) in HEADER[..4].iter().enumerate() {
            write!(out, "{:<width$}", title, width = widths[i] + COLUMN_PADDING)?;
        }
        writeln!(out, "{}", HEADER[4])?;

        for (row, outcome) in &cells {
            for (i, cell) in row.iter().enumerate() {
                write!(out, "{:<width$}", cell, width = widths[i] + COLUMN_PADDING)?;
            }
            let label = outcome.label();
            if self.colored {
                writeln!(out, "{}", label.style(self.styles.for_outcome(outcome)))?;
            } else {
                writeln!(out, "{}", label)?;
            }
        }

        out.flush()
    }
}
