//! This module provides utilities for loading test problems from files.
//!
//! The accepted format is the ASCII triplet layout used by Matrix-Market
//! collections: any number of comment lines starting with `%`, one header
//! line `rows cols nnz`, then one `i j value` triplet per line with
//! 1-based indices. Entries whose magnitude falls below the numerical
//! tolerance are dropped on ingestion. The matrix must be square.
//!
//! [`load_csc`] expects the triplets grouped by column (the layout the
//! collections ship in) and builds the column pointer incrementally,
//! advancing it over empty columns; [`load_csr`] is the row-major
//! counterpart.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use thiserror::Error;

use crate::scalar::Real;
use crate::sparse::{CscMatrix, CsrMatrix};

/// Represents all possible errors that can occur during data loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Wraps a standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Occurs when a token cannot be parsed into an integer.
    #[error("Parse error: failed to parse integer from '{0}'")]
    ParseInt(String),
    /// Occurs when a token cannot be parsed into a real number.
    #[error("Parse error: failed to parse real from '{0}'")]
    ParseFloat(String),
    /// The `rows cols nnz` header line is missing or malformed.
    #[error("Format error: the 'rows cols nnz' header line was not found or was malformed.")]
    HeaderMissing,
    /// A triplet line did not have the `i j value` shape.
    #[error("Format error: malformed triplet line '{0}'")]
    MalformedTriplet(String),
    /// An index fell outside the declared matrix shape.
    #[error("Format error: index ({row}, {col}) outside the declared {rows}x{cols} shape.")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    /// The loaders only accept square operators.
    #[error("Shape error: matrix is {rows}x{cols}, but a square operator is required.")]
    NonSquare { rows: usize, cols: usize },
    /// Triplets were not grouped in the order the target layout assumes.
    #[error("Format error: entries are not in {expected} order (saw {kind} {seen} after {current}).")]
    OutOfOrder {
        expected: &'static str,
        kind: &'static str,
        seen: usize,
        current: usize,
    },
}

struct Header {
    rows: usize,
    cols: usize,
    nnz: usize,
}

/// One parsed triplet, 0-based.
struct Entry<R> {
    row: usize,
    col: usize,
    value: R,
}

fn parse_usize(token: &str) -> Result<usize, LoaderError> {
    token
        .parse::<usize>()
        .map_err(|_| LoaderError::ParseInt(token.to_string()))
}

fn parse_header(line: &str) -> Result<Header, LoaderError> {
    let mut fields = line.split_whitespace();
    let rows = parse_usize(fields.next().ok_or(LoaderError::HeaderMissing)?)?;
    let cols = parse_usize(fields.next().ok_or(LoaderError::HeaderMissing)?)?;
    let nnz = parse_usize(fields.next().ok_or(LoaderError::HeaderMissing)?)?;
    Ok(Header { rows, cols, nnz })
}

fn parse_entry<R: Real>(line: &str, header: &Header) -> Result<Entry<R>, LoaderError> {
    let mut fields = line.split_whitespace();
    let (Some(i), Some(j), Some(v)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(LoaderError::MalformedTriplet(line.to_string()));
    };
    let row = parse_usize(i)?;
    let col = parse_usize(j)?;
    let value = v
        .parse::<f64>()
        .map_err(|_| LoaderError::ParseFloat(v.to_string()))?;
    if row == 0 || row > header.rows || col == 0 || col > header.cols {
        return Err(LoaderError::IndexOutOfRange {
            row,
            col,
            rows: header.rows,
            cols: header.cols,
        });
    }
    Ok(Entry {
        row: row - 1,
        col: col - 1,
        value: R::from_f64(value),
    })
}

/// Streams the file once, feeding each kept triplet to `sink`.
fn scan<R: Real>(
    path: impl AsRef<Path>,
    mut sink: impl FnMut(Entry<R>) -> Result<(), LoaderError>,
) -> Result<Header, LoaderError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // The first non-comment line is the header.
    let mut header: Option<Header> = None;
    for line in &mut lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        header = Some(parse_header(trimmed)?);
        break;
    }
    let header = header.ok_or(LoaderError::HeaderMissing)?;
    if header.rows != header.cols {
        return Err(LoaderError::NonSquare {
            rows: header.rows,
            cols: header.cols,
        });
    }

    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let entry = parse_entry::<R>(trimmed, &header)?;
        // Sparse drop: magnitudes below the tolerance are treated as
        // structural zeros.
        if entry.value.abs() < R::TOL {
            continue;
        }
        sink(entry)?;
    }

    Ok(header)
}

/// Loads a square sparse matrix in CSC form.
///
/// Entries must be grouped by column with increasing rows inside each
/// column, which is how the collections (and the `datagen` binary) write
/// them.
pub fn load_csc<R: Real>(path: impl AsRef<Path>) -> Result<CscMatrix<R>, LoaderError> {
    let mut colptr: Vec<usize> = vec![0];
    let mut rowidx: Vec<usize> = Vec::new();
    let mut values: Vec<R> = Vec::new();
    let mut cur_col = 0usize;

    let header = scan::<R>(&path, |entry| {
        if entry.col < cur_col {
            return Err(LoaderError::OutOfOrder {
                expected: "column-major",
                kind: "column",
                seen: entry.col + 1,
                current: cur_col + 1,
            });
        }
        // Close out every column up to the one this entry starts.
        while cur_col < entry.col {
            colptr.push(values.len());
            cur_col += 1;
        }
        rowidx.push(entry.row);
        values.push(entry.value);
        Ok(())
    })?;

    while cur_col < header.cols {
        colptr.push(values.len());
        cur_col += 1;
    }
    Ok(CscMatrix::from_parts(
        header.rows,
        header.cols,
        colptr,
        rowidx,
        values,
    ))
}

/// Loads a square sparse matrix in CSR form. Entries must be grouped by
/// row.
pub fn load_csr<R: Real>(path: impl AsRef<Path>) -> Result<CsrMatrix<R>, LoaderError> {
    let mut rowptr: Vec<usize> = vec![0];
    let mut colidx: Vec<usize> = Vec::new();
    let mut values: Vec<R> = Vec::new();
    let mut cur_row = 0usize;

    let header = scan::<R>(&path, |entry| {
        if entry.row < cur_row {
            return Err(LoaderError::OutOfOrder {
                expected: "row-major",
                kind: "row",
                seen: entry.row + 1,
                current: cur_row + 1,
            });
        }
        while cur_row < entry.row {
            rowptr.push(values.len());
            cur_row += 1;
        }
        colidx.push(entry.col);
        values.push(entry.value);
        Ok(())
    })?;

    while cur_row < header.rows {
        rowptr.push(values.len());
        cur_row += 1;
    }
    Ok(CsrMatrix::from_parts(
        header.rows,
        header.cols,
        rowptr,
        colidx,
        values,
    ))
}
