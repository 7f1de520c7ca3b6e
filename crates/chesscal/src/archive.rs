//! Calibration archive: a ZIP of NumPy `.npy` members, readable by `numpy.load`.
//!
//! | member      | shape       |
//! |-------------|-------------|
//! | `repError`  | `()`        |
//! | `camMatrix` | `(3, 3)`    |
//! | `distCoeff` | `(1, 5)`    |
//! | `rvecs`     | `(N, 3, 1)` |
//! | `tvecs`     | `(N, 3, 1)` |
//!
//! All arrays are little-endian `f64`, C order. Members are stored
//! uncompressed.

use chesscal_calib::CalibrationResult;
use chesscal_core::{CameraMatrix, Distortion};
use nalgebra::{Matrix3, Vector3};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid .npy member {member}: {reason}")]
    InvalidNpy { member: String, reason: String },

    #[error("member {member} has shape {found:?}, expected {expected}")]
    UnexpectedShape {
        member: &'static str,
        found: Vec<usize>,
        expected: &'static str,
    },
}

/// Write `result` to `path`, replacing any existing file.
pub fn save_calibration(path: impl AsRef<Path>, result: &CalibrationResult) -> Result<(), ArchiveError> {
    let file = File::create(path)?;
    write_calibration(BufWriter::new(file), result)?;
    Ok(())
}

/// Read a calibration previously written by [`save_calibration`] (or by
/// `numpy.savez` with the same member names).
pub fn load_calibration(path: impl AsRef<Path>) -> Result<CalibrationResult, ArchiveError> {
    let file = File::open(path)?;
    read_calibration(BufReader::new(file))
}

pub fn write_calibration<W: Write + Seek>(writer: W, result: &CalibrationResult) -> Result<W, ArchiveError> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let k = result.camera_matrix.matrix();
    let cam: Vec<f64> = (0..3)
        .flat_map(|r| (0..3).map(move |c| k[(r, c)]))
        .collect();
    let n = result.rvecs.len();
    let flatten = |vs: &[Vector3<f64>]| vs.iter().flat_map(|v| [v.x, v.y, v.z]).collect::<Vec<_>>();

    let members: [(&str, Vec<usize>, Vec<f64>); 5] = [
        ("repError", vec![], vec![result.rms_error]),
        ("camMatrix", vec![3, 3], cam),
        ("distCoeff", vec![1, 5], result.distortion.coeffs().to_vec()),
        ("rvecs", vec![n, 3, 1], flatten(result.rvecs.as_slice())),
        ("tvecs", vec![result.tvecs.len(), 3, 1], flatten(result.tvecs.as_slice())),
    ];
    for (name, shape, data) in members {
        zip.start_file(format!("{name}.npy"), options)?;
        zip.write_all(&npy_encode(&shape, &data))?;
    }

    Ok(zip.finish()?)
}

pub fn read_calibration<R: Read + Seek>(reader: R) -> Result<CalibrationResult, ArchiveError> {
    let mut zip = ZipArchive::new(reader)?;

    let (shape, rep) = read_member(&mut zip, "repError")?;
    if !shape.is_empty() && shape.iter().product::<usize>() != 1 {
        return Err(unexpected("repError", shape, "()"));
    }

    let (shape, cam) = read_member(&mut zip, "camMatrix")?;
    if shape != [3, 3] {
        return Err(unexpected("camMatrix", shape, "(3, 3)"));
    }
    let camera_matrix = CameraMatrix::from_matrix(&Matrix3::from_row_slice(&cam));

    let (shape, dist) = read_member(&mut zip, "distCoeff")?;
    if dist.len() < 4 || dist.len() > 5 || shape.iter().product::<usize>() != dist.len() {
        return Err(unexpected("distCoeff", shape, "(1, 5)"));
    }
    let mut coeffs = [0.0; 5];
    coeffs[..dist.len()].copy_from_slice(&dist);

    let rvecs = read_vectors(&mut zip, "rvecs")?;
    let tvecs = read_vectors(&mut zip, "tvecs")?;

    Ok(CalibrationResult {
        rms_error: rep[0],
        camera_matrix,
        distortion: Distortion::from_coeffs(coeffs),
        rvecs,
        tvecs,
        per_view_errors: Vec::new(),
    })
}

fn unexpected(member: &'static str, found: Vec<usize>, expected: &'static str) -> ArchiveError {
    ArchiveError::UnexpectedShape {
        member,
        found,
        expected,
    }
}

fn read_member<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<(Vec<usize>, Vec<f64>), ArchiveError> {
    let mut bytes = Vec::new();
    zip.by_name(&format!("{name}.npy"))?.read_to_end(&mut bytes)?;
    npy_decode(&bytes).map_err(|reason| ArchiveError::InvalidNpy {
        member: name.to_string(),
        reason,
    })
}

fn read_vectors<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &'static str) -> Result<Vec<Vector3<f64>>, ArchiveError> {
    let (shape, data) = read_member(zip, name)?;
    if !matches!(shape.as_slice(), [_, 3, 1] | [_, 1, 3] | [_, 3]) {
        return Err(unexpected(name, shape, "(N, 3, 1)"));
    }
    Ok(data
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect())
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Serialise an `f64` array in `.npy` format version 1.0.
fn npy_encode(shape: &[usize], data: &[f64]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(shape)
    );
    // magic + version + u16 length + header + newline
    let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
    let pad = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    let mut out = Vec::with_capacity(NPY_MAGIC.len() + 4 + header.len() + 8 * data.len());
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.find(&format!("'{key}'"))? + key.len() + 2;
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();
    Some(rest)
}

/// Parse a `.npy` `<f8` C-order array of any shape.
fn npy_decode(bytes: &[u8]) -> Result<(Vec<usize>, Vec<f64>), String> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err("missing NUMPY magic".to_string());
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => return Err(format!("unsupported format version {v}")),
    };
    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| "truncated header".to_string())?;

    let descr = header_value(header, "descr").ok_or("missing descr")?;
    if !descr.starts_with("'<f8'") {
        return Err(format!("unsupported dtype {}", descr.split(',').next().unwrap_or(descr)));
    }
    let fortran = header_value(header, "fortran_order").ok_or("missing fortran_order")?;
    if !fortran.starts_with("False") {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }
    let shape_src = header_value(header, "shape").ok_or("missing shape")?;
    let inner = shape_src
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or("malformed shape")?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|e| format!("bad dimension {s:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    let count: usize = shape.iter().product();
    let payload = &bytes[data_start..];
    if payload.len() < count * 8 {
        return Err(format!("expected {} data bytes, found {}", count * 8, payload.len()));
    }
    let data = payload[..count * 8]
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    Ok((shape, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npy_header_is_aligned_and_parseable() {
        for shape in [vec![], vec![3, 3], vec![7, 3, 1]] {
            let count = shape.iter().product::<usize>();
            let data: Vec<f64> = (0..count).map(|i| i as f64 * 0.5 - 1.0).collect();
            let bytes = npy_encode(&shape, &data);

            let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
            assert_eq!((10 + header_len) % 64, 0);
            assert_eq!(bytes[10 + header_len - 1], b'\n');

            let (back_shape, back) = npy_decode(&bytes).unwrap();
            assert_eq!(back_shape, shape);
            assert_eq!(back, data);
        }
    }

    #[test]
    fn scalar_header_matches_numpy() {
        let bytes = npy_encode(&[], &[0.25]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert_eq!(bytes.len(), 10 + header_len + 8);
        assert_eq!(&bytes[10 + header_len..], &0.25f64.to_le_bytes());
        assert!(header.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (), }"));
    }

    #[test]
    fn archive_round_trip_keeps_every_member() {
        let result = CalibrationResult {
            rms_error: 0.137,
            camera_matrix: CameraMatrix::new(812.5, 809.25, 321.0, 239.75),
            distortion: Distortion::from_coeffs([-0.21, 0.07, 0.001, -0.002, 0.01]),
            rvecs: vec![Vector3::new(0.1, -0.2, 0.03), Vector3::new(-0.05, 0.3, 1.2)],
            tvecs: vec![Vector3::new(-4.0, -3.0, 20.0), Vector3::new(1.5, 2.0, 25.0)],
            per_view_errors: vec![0.1, 0.17],
        };

        let cursor = write_calibration(std::io::Cursor::new(Vec::new()), &result).unwrap();
        let bytes = cursor.into_inner();

        let zip = ZipArchive::new(std::io::Cursor::new(bytes.clone())).unwrap();
        let mut names: Vec<&str> = zip.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            ["camMatrix.npy", "distCoeff.npy", "repError.npy", "rvecs.npy", "tvecs.npy"]
        );

        let back = read_calibration(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(back.rms_error, result.rms_error);
        assert_eq!(back.camera_matrix, result.camera_matrix);
        assert_eq!(back.distortion, result.distortion);
        assert_eq!(back.rvecs, result.rvecs);
        assert_eq!(back.tvecs, result.tvecs);
        assert!(back.per_view_errors.is_empty());
    }

    #[test]
    fn missing_member_is_a_zip_error() {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("repError.npy", SimpleFileOptions::default()).unwrap();
        zip.write_all(&npy_encode(&[], &[0.5])).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(
            read_calibration(std::io::Cursor::new(bytes)),
            Err(ArchiveError::Zip(_))
        ));
    }

    #[test]
    fn rejects_foreign_dtype() {
        let mut bytes = npy_encode(&[2], &[1.0, 2.0]);
        let pos = bytes.windows(3).position(|w| w == b"<f8").unwrap();
        bytes[pos + 1] = b'i';
        assert!(npy_decode(&bytes).unwrap_err().contains("dtype"));
        assert!(npy_decode(b"not an npy file").is_err());
    }
}
