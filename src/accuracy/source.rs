//! Where correspondence data for an identifier comes from.
//!
//! The matcher that produces correspondences is external. It leaves one
//! NumPy array per identifier at `{root}/{id}/{id}_MATCHES.npy`, shaped
//! `(2, N, 2)`: index 0 holds the source points, index 1 the destination
//! points. An identifier without that file is simply absent.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::types::{CorrespondenceSet, Point2};

/// Read-only access to per-identifier correspondences.
pub trait CorrespondenceSource {
    /// `Ok(None)` when nothing exists for `identifier`.
    fn load(&self, identifier: &str) -> Result<Option<CorrespondenceSet>, SourceError>;
}

/// Correspondences kept in memory, keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    sets: HashMap<String, CorrespondenceSet>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: impl Into<String>, set: CorrespondenceSet) {
        self.sets.insert(identifier.into(), set);
    }
}

impl CorrespondenceSource for InMemorySource {
    fn load(&self, identifier: &str) -> Result<Option<CorrespondenceSet>, SourceError> {
        Ok(self.sets.get(identifier).cloned())
    }
}

/// Directory of `.npy` match files written by the matcher.
#[derive(Debug, Clone)]
pub struct NpyMatchStore {
    root: PathBuf,
}

impl NpyMatchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.root
            .join(identifier)
            .join(format!("{identifier}_MATCHES.npy"))
    }

    /// Write `set` for `identifier` as a little-endian `f64` array.
    pub fn store(&self, identifier: &str, set: &CorrespondenceSet) -> Result<PathBuf, SourceError> {
        let path = self.path_for(identifier);
        let io_err = |source| SourceError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, encode_matches(set)).map_err(io_err)?;
        Ok(path)
    }
}

impl CorrespondenceSource for NpyMatchStore {
    fn load(&self, identifier: &str) -> Result<Option<CorrespondenceSet>, SourceError> {
        let path = self.path_for(identifier);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        decode_matches(&bytes)
            .map(Some)
            .map_err(|reason| SourceError::MalformedNpy { path, reason })
    }
}

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Dtype {
    F4 { big_endian: bool },
    F8 { big_endian: bool },
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, String> {
        let mut chars = descr.chars();
        let big_endian = match chars.next() {
            Some('<' | '|' | '=') => false,
            Some('>') => true,
            _ => return Err(format!("unsupported dtype '{descr}'")),
        };
        match chars.as_str() {
            "f4" => Ok(Dtype::F4 { big_endian }),
            "f8" => Ok(Dtype::F8 { big_endian }),
            _ => Err(format!("unsupported dtype '{descr}'")),
        }
    }

    fn size(&self) -> usize {
        match self {
            Dtype::F4 { .. } => 4,
            Dtype::F8 { .. } => 8,
        }
    }

    fn read(&self, b: &[u8]) -> f64 {
        match *self {
            Dtype::F4 { big_endian } => {
                let raw = [b[0], b[1], b[2], b[3]];
                let v = if big_endian {
                    f32::from_be_bytes(raw)
                } else {
                    f32::from_le_bytes(raw)
                };
                f64::from(v)
            }
            Dtype::F8 { big_endian } => {
                let raw = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
                if big_endian {
                    f64::from_be_bytes(raw)
                } else {
                    f64::from_le_bytes(raw)
                }
            }
        }
    }
}

/// Value of `'key': <value>` inside the header dict literal.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, String> {
    let needle = format!("'{key}':");
    let start = header
        .find(&needle)
        .ok_or_else(|| format!("header has no '{key}'"))?
        + needle.len();
    let rest = header[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(|c: char| c == ',' || c == '}')
    }
    .ok_or_else(|| format!("unterminated '{key}' entry"))?;
    Ok(rest[..end].trim())
}

fn decode_matches(bytes: &[u8]) -> Result<CorrespondenceSet, String> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err("missing NUMPY magic".to_string());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".to_string());
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(format!("unsupported npy version {v}")),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated header".to_string());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "header is not valid text".to_string())?;

    let descr = header_value(header, "descr")?.trim_matches(|c| c == '\'' || c == '"');
    let dtype = Dtype::parse(descr)?;
    let fortran = match header_value(header, "fortran_order")? {
        "False" => false,
        "True" => true,
        other => return Err(format!("invalid fortran_order '{other}'")),
    };
    let shape: Vec<usize> = header_value(header, "shape")?
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("invalid shape entry '{s}'")))
        .collect::<Result<_, _>>()?;

    let n = match shape.as_slice() {
        [2, n, 2] => *n,
        _ => return Err(format!("expected shape (2, N, 2), got {shape:?}")),
    };

    let size = dtype.size();
    let needed = n
        .checked_mul(4)
        .and_then(|count| count.checked_mul(size))
        .ok_or_else(|| format!("shape (2, {n}, 2) is too large"))?;
    let data = &bytes[data_start..];
    if data.len() < needed {
        return Err(format!(
            "expected {needed} data bytes, found {}",
            data.len()
        ));
    }

    // Flat offset of element [image, point, coord].
    let offset = |image: usize, point: usize, coord: usize| {
        if fortran {
            image + 2 * point + 2 * n * coord
        } else {
            (image * n + point) * 2 + coord
        }
    };
    let value = |image, point, coord| {
        let at = offset(image, point, coord) * size;
        dtype.read(&data[at..at + size])
    };

    let points = |image: usize| -> Vec<Point2> {
        (0..n)
            .map(|i| Point2::new(value(image, i, 0), value(image, i, 1)))
            .collect()
    };
    CorrespondenceSet::new(points(0), points(1)).map_err(|e| e.to_string())
}

fn encode_matches(set: &CorrespondenceSet) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': (2, {}, 2), }}",
        set.len()
    );
    // Magic + version + length + header + newline, padded to 64 bytes.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + 32 * set.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for points in [set.src(), set.dst()] {
        for p in points {
            out.extend_from_slice(&p.x.to_le_bytes());
            out.extend_from_slice(&p.y.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> CorrespondenceSet {
        CorrespondenceSet::from_pairs(
            &[(1.0, 2.0), (3.0, 4.0), (5.5, 6.5)],
            &[(10.0, 20.0), (30.0, 40.0), (55.0, 65.0)],
        )
        .unwrap()
    }

    #[test]
    fn encoded_header_is_aligned() {
        let bytes = encode_matches(&sample_set());
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
    }

    #[test]
    fn decodes_what_it_encodes() {
        let set = sample_set();
        assert_eq!(decode_matches(&encode_matches(&set)).unwrap(), set);
    }

    #[test]
    fn decodes_little_endian_f4() {
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (2, 1, 2), }\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in [1.5f32, 2.5, 7.0, 8.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let set = decode_matches(&bytes).unwrap();
        assert_eq!(set.src()[0], Point2::new(1.5, 2.5));
        assert_eq!(set.dst()[0], Point2::new(7.0, 8.0));
    }

    #[test]
    fn rejects_wrong_shape_and_magic() {
        let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (3, 4), }\n";
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        assert!(decode_matches(&bytes).unwrap_err().contains("shape"));
        assert!(decode_matches(b"not an npy file").is_err());
    }

    #[test]
    fn oversized_shape_is_malformed() {
        let header = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': (2, {}, 2), }}\n",
            usize::MAX / 4 + 1
        );
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 64]);
        assert!(decode_matches(&bytes).unwrap_err().contains("too large"));

        let dir = tempfile::tempdir().unwrap();
        let store = NpyMatchStore::new(dir.path());
        let path = store.path_for("huge");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            store.load("huge"),
            Err(SourceError::MalformedNpy { .. })
        ));
    }

    #[test]
    fn store_then_load_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = NpyMatchStore::new(dir.path());
        let path = store.store("M3G20090212T082712", &sample_set()).unwrap();
        assert!(path.ends_with("M3G20090212T082712/M3G20090212T082712_MATCHES.npy"));

        assert_eq!(
            store.load("M3G20090212T082712").unwrap(),
            Some(sample_set())
        );
        assert_eq!(store.load("M3G_unknown").unwrap(), None);
    }

    #[test]
    fn unreadable_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = NpyMatchStore::new(dir.path());
        let path = store.path_for("bad");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            store.load("bad"),
            Err(SourceError::MalformedNpy { .. })
        ));
    }
}
