//! NPY (format version 1.0) codec for two-dimensional `f64` arrays.
//!
//! Layout: magic `\x93NUMPY`, version bytes `1 0`, a little-endian `u16` header
//! length, an ASCII dict header padded with spaces to a 64-byte boundary and
//! terminated by `\n`, then the raw little-endian values. Only `<f8` arrays of
//! rank two are written; reading also accepts Fortran order.

use std::path::Path;

use faer::Mat;

use super::ensure_parent_dir;
use crate::error::{PipelineError, Result, Stage, StageContext};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;
/// magic + version + header length field
const PREAMBLE_LEN: usize = 10;

/// Encode a matrix as NPY bytes (C order)
pub fn encode_npy(array: &Mat<f64>) -> Vec<u8> {
    let (rows, cols) = (array.nrows(), array.ncols());
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // header + trailing newline must end on an alignment boundary
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(PREAMBLE_LEN + header.len() + rows * cols * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for i in 0..rows {
        for j in 0..cols {
            out.extend_from_slice(&array[(i, j)].to_le_bytes());
        }
    }
    out
}

/// Decode NPY bytes into a matrix
pub fn decode_npy(bytes: &[u8]) -> std::result::Result<Mat<f64>, String> {
    if bytes.len() < PREAMBLE_LEN || &bytes[..6] != MAGIC {
        return Err("not an NPY file (magic mismatch)".to_string());
    }
    let (major, _minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, PREAMBLE_LEN),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated NPY preamble".to_string());
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => return Err(format!("unsupported NPY version {}", v)),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated NPY header".to_string());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "NPY header is not valid ASCII".to_string())?;

    let descr = header_value(header, "descr").ok_or("NPY header has no 'descr'")?;
    if descr.trim_matches(|c| c == '\'' || c == '"') != "<f8" {
        return Err(format!("unsupported dtype {}, expected '<f8'", descr));
    }
    let fortran_order = header_value(header, "fortran_order")
        .map(|v| v.starts_with("True"))
        .unwrap_or(false);
    let (rows, cols) = parse_shape(header)?;

    let data = &bytes[data_start..];
    if data.len() != rows * cols * 8 {
        return Err(format!(
            "NPY payload has {} bytes, shape ({}, {}) needs {}",
            data.len(),
            rows,
            cols,
            rows * cols * 8
        ));
    }

    let value = |k: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&data[k * 8..k * 8 + 8]);
        f64::from_le_bytes(buf)
    };

    Ok(Mat::from_fn(rows, cols, |i, j| {
        if fortran_order {
            value(j * rows + i)
        } else {
            value(i * cols + j)
        }
    }))
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{}':", key);
    let start = header.find(&needle)? + needle.len();
    let rest = header[start..].trim_start();
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn parse_shape(header: &str) -> std::result::Result<(usize, usize), String> {
    let start = header.find("'shape':").ok_or("NPY header has no 'shape'")?;
    let rest = &header[start..];
    let open = rest.find('(').ok_or("malformed NPY shape")?;
    let close = rest.find(')').ok_or("malformed NPY shape")?;
    let dims: Vec<usize> = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("bad NPY dimension '{}'", s)))
        .collect::<std::result::Result<_, _>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(format!("expected a 2-D array, found shape {:?}", dims)),
    }
}

/// Write a matrix to an `.npy` file, creating parent directories
pub fn save_numpy_array(path: &Path, array: &Mat<f64>, stage: Stage) -> Result<()> {
    ensure_parent_dir(path, stage)?;
    std::fs::write(path, encode_npy(array)).at_path(stage, path)
}

/// Read a matrix from an `.npy` file
pub fn load_numpy_array(path: &Path, stage: Stage) -> Result<Mat<f64>> {
    let bytes = std::fs::read(path).at_path(stage, path)?;
    decode_npy(&bytes).map_err(|msg| PipelineError::validation_at(stage, path, msg))
}
