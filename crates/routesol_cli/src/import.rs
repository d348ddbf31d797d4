//! Bulk import row reader.
//!
//! Reads a JSON array of row objects keyed by the import sheet columns
//! (`ID`, `Store Name`, `Store Address`, `Store Postcode`, `Kilometers`,
//! `Tail Lift`). Values stay untyped; the core validates each row.

use routesol_core::StoreInput;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ImportError {
    Io { path: PathBuf, source: io::Error },
    Parse(serde_json::Error),
    /// Top-level value is not an array of rows.
    NotAnArray,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Parse(err) => write!(f, "invalid JSON: {err}"),
            Self::NotAnArray => write!(f, "import file must contain a JSON array of rows"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::NotAnArray => None,
        }
    }
}

pub fn read_rows(path: &Path) -> Result<Vec<StoreInput>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rows(BufReader::new(file))
}

/// Parses rows in file order.
///
/// Elements that are not objects become empty rows so that row numbers stay
/// aligned with the file; the core rejects them as missing fields.
pub fn parse_rows(reader: impl Read) -> Result<Vec<StoreInput>, ImportError> {
    let document: Value = serde_json::from_reader(reader).map_err(ImportError::Parse)?;
    let Value::Array(rows) = document else {
        return Err(ImportError::NotAnArray);
    };

    Ok(rows
        .into_iter()
        .map(|row| match row {
            Value::Object(_) => serde_json::from_value(row).unwrap_or_default(),
            _ => StoreInput::default(),
        })
        .collect())
}
