//! QR code matrices.

use super::SheetError;
use qrcode::{Color, QrCode};

/// Light modules around the code
pub const QUIET_ZONE: usize = 1;

/// A QR code as a square grid of modules, quiet zone included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    size: usize,
    dark: Vec<bool>,
}

/// A horizontal run of dark modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DarkRun {
    /// Row, 0 at the top
    pub row: usize,
    /// First dark column
    pub column: usize,
    /// Number of dark modules
    pub len: usize,
}

impl QrMatrix {
    /// Encode `data` at the smallest version that fits.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::Qr`] if the data is too long for a QR code.
    pub fn encode(data: &str) -> Result<Self, SheetError> {
        let code = QrCode::new(data.as_bytes())?;
        let width = code.width();
        let size = width + 2 * QUIET_ZONE;

        let mut dark = vec![false; size * size];
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color == Color::Dark {
                let (row, column) = (i / width + QUIET_ZONE, i % width + QUIET_ZONE);
                dark[row * size + column] = true;
            }
        }

        Ok(Self { size, dark })
    }

    /// Modules per side, quiet zone included
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether the module at `row`, `column` is dark
    #[must_use]
    pub fn is_dark(&self, row: usize, column: usize) -> bool {
        row < self.size && column < self.size && self.dark[row * self.size + column]
    }

    /// Dark modules merged into horizontal runs, row by row
    pub fn dark_runs(&self) -> impl Iterator<Item = DarkRun> + '_ {
        (0..self.size).flat_map(move |row| {
            let cells = &self.dark[row * self.size..(row + 1) * self.size];
            let mut runs = Vec::new();
            let mut start = None;
            for (column, &is_dark) in cells.iter().enumerate() {
                match (is_dark, start) {
                    (true, None) => start = Some(column),
                    (false, Some(first)) => {
                        runs.push(DarkRun {
                            row,
                            column: first,
                            len: column - first,
                        });
                        start = None;
                    },
                    _ => {},
                }
            }
            if let Some(first) = start {
                runs.push(DarkRun {
                    row,
                    column: first,
                    len: self.size - first,
                });
            }
            runs
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn test_quiet_zone_is_light() {
        let matrix = QrMatrix::encode("42").unwrap();
        // Version 1 is 21 modules wide
        assert_eq!(matrix.size(), 21 + 2 * QUIET_ZONE);

        let last = matrix.size() - 1;
        for i in 0..matrix.size() {
            assert!(!matrix.is_dark(0, i));
            assert!(!matrix.is_dark(last, i));
            assert!(!matrix.is_dark(i, 0));
            assert!(!matrix.is_dark(i, last));
        }
        // Finder pattern corner
        assert!(matrix.is_dark(QUIET_ZONE, QUIET_ZONE));
    }

    #[test]
    fn test_runs_cover_exactly_the_dark_modules() {
        let matrix = QrMatrix::encode("https://example.com/user?ticket=1234").unwrap();

        let mut covered = vec![false; matrix.size() * matrix.size()];
        for run in matrix.dark_runs() {
            assert!(run.len > 0);
            for column in run.column..run.column + run.len {
                covered[run.row * matrix.size() + column] = true;
            }
        }

        for row in 0..matrix.size() {
            for column in 0..matrix.size() {
                assert_eq!(
                    covered[row * matrix.size() + column],
                    matrix.is_dark(row, column)
                );
            }
        }
    }

    #[test]
    fn test_longer_data_needs_a_bigger_code() {
        let short = QrMatrix::encode("7").unwrap();
        let long = QrMatrix::encode(&"x".repeat(200)).unwrap();
        assert!(long.size() > short.size());
    }

    #[test]
    fn test_oversized_data_is_an_error() {
        assert!(matches!(
            QrMatrix::encode(&"x".repeat(8000)),
            Err(SheetError::Qr(_))
        ));
    }
}
