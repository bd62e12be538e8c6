use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use csv::{ReaderBuilder, Trim};
use nalgebra::DMatrix;

use crate::error::{FlowError, Result};

/// Reads a comma separated numeric matrix.
///
/// Every row must have the same number of fields. With `skip_first_line`
/// the first line is discarded unread, whatever it contains. An empty file
/// yields a `0 x 0` matrix.
pub fn read_matrix(path: impl AsRef<Path>, skip_first_line: bool) -> Result<DMatrix<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FlowError::io(path, e))?;
    let mut input = BufReader::new(file);
    let mut skipped = 0;
    if skip_first_line {
        let mut title = Vec::new();
        input
            .read_until(b'\n', &mut title)
            .map_err(|e| FlowError::io(path, e))?;
        skipped = 1;
    }
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let mut values = Vec::new();
    let mut rows = 0;
    let mut cols = 0;
    for record in rdr.records() {
        let record = record.map_err(|e| FlowError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line()) + skipped;
        if rows == 0 {
            cols = record.len();
        } else if record.len() != cols {
            return Err(FlowError::RowWidth {
                path: path.to_path_buf(),
                line,
                expected: cols,
                found: record.len(),
            });
        }
        for field in record.iter() {
            let value = field.parse::<f64>().map_err(|_| FlowError::NotNumeric {
                path: path.to_path_buf(),
                line,
                value: field.to_string(),
            })?;
            values.push(value);
        }
        rows += 1;
    }
    Ok(DMatrix::from_row_slice(rows, cols, &values))
}
