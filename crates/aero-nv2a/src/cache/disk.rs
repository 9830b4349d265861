//! On-disk program binaries and the reload index.
//!
//! Entry layout (little-endian):
//!
//! ```text
//! u64 version_len, version bytes
//! u64 vendor_len,  vendor bytes
//! u32 binary_format
//! u64 state_len,   ShaderState image
//! u64 payload_len, program binary
//! ```
//!
//! The index is a flat list of `u64` content hashes, most recently used first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use tracing::warn;

use crate::host::ProgramBinary;
use crate::state::ShaderState;

pub const INDEX_FILE: &str = "shader_cache_list";
pub const SHADER_DIR: &str = "shaders";

/// Upper bound on any length field; anything larger is corruption.
const MAX_FIELD_LEN: u64 = 256 * 1024 * 1024;

/// Host identity an entry was produced under. Entries only load under an equal stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub version: String,
    pub vendor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub state: ShaderState,
    pub binary: ProgramBinary,
}

pub fn entry_dir(base: &Path, hash: u64) -> PathBuf {
    base.join(SHADER_DIR).join(format!("{:04x}", hash >> 48))
}

pub fn entry_path(base: &Path, hash: u64) -> PathBuf {
    entry_dir(base, hash).join(format!("{:012x}", hash & 0xffff_ffff_ffff))
}

pub fn index_path(base: &Path) -> PathBuf {
    base.join(INDEX_FILE)
}

pub fn encode_entry(stamp: &Stamp, state: &ShaderState, binary: &ProgramBinary) -> Vec<u8> {
    let state_bytes = state.to_bytes();
    let mut out = Vec::with_capacity(
        36 + stamp.version.len() + stamp.vendor.len() + state_bytes.len() + binary.bytes.len(),
    );
    fn put_field(out: &mut Vec<u8>, bytes: &[u8]) {
        out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(bytes);
    }
    put_field(&mut out, stamp.version.as_bytes());
    put_field(&mut out, stamp.vendor.as_bytes());
    out.extend_from_slice(&binary.format.to_le_bytes());
    put_field(&mut out, &state_bytes);
    put_field(&mut out, &binary.bytes);
    out
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .with_context(|| format!("truncated {what} at offset {}", self.pos))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let bytes = self.take(8, what)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn field(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u64(what)?;
        ensure!(len <= MAX_FIELD_LEN, "{what} length {len} is implausible");
        self.take(len as usize, what)
    }
}

/// Decodes an entry, rejecting it unless it was written under `stamp`.
pub fn decode_entry(bytes: &[u8], stamp: &Stamp) -> Result<DiskEntry> {
    let mut cur = Cursor { bytes, pos: 0 };
    let version = cur.field("version stamp")?;
    if version != stamp.version.as_bytes() {
        bail!(
            "version stamp mismatch: entry has {:?}, running {:?}",
            String::from_utf8_lossy(version),
            stamp.version
        );
    }
    let vendor = cur.field("vendor stamp")?;
    if vendor != stamp.vendor.as_bytes() {
        bail!(
            "vendor stamp mismatch: entry has {:?}, host is {:?}",
            String::from_utf8_lossy(vendor),
            stamp.vendor
        );
    }
    let format = cur.u32("binary format")?;
    let state = ShaderState::from_bytes(cur.field("shader state")?).context("decoding shader state")?;
    let payload = cur.field("program binary")?.to_vec();
    ensure!(
        cur.pos == bytes.len(),
        "{} trailing bytes after program binary",
        bytes.len() - cur.pos
    );
    Ok(DiskEntry {
        state,
        binary: ProgramBinary {
            format,
            bytes: payload,
        },
    })
}

/// Writes an entry through a temporary file so readers never see a partial one.
pub fn write_entry(
    base: &Path,
    hash: u64,
    stamp: &Stamp,
    state: &ShaderState,
    binary: &ProgramBinary,
) -> Result<()> {
    let dir = entry_dir(base, hash);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = entry_path(base, hash);
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, encode_entry(stamp, state, binary))
        .with_context(|| format!("writing {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, &path) {
        if let Err(err) = fs::remove_file(&tmp) {
            warn!(path = %tmp.display(), %err, "failed to remove temporary cache entry");
        }
        return Err(err).with_context(|| format!("renaming into {}", path.display()));
    }
    Ok(())
}

/// Loads the entry for `hash`, checking both the stamp and that the stored state really
/// hashes to `hash`.
pub fn load_entry(base: &Path, hash: u64, stamp: &Stamp) -> Result<DiskEntry> {
    let path = entry_path(base, hash);
    let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let entry = decode_entry(&bytes, stamp)?;
    let actual = entry.state.content_hash();
    ensure!(
        actual == hash,
        "stored state hashes to {actual:016x}, expected {hash:016x}"
    );
    Ok(entry)
}

pub fn remove_entry(base: &Path, hash: u64) -> io::Result<()> {
    match fs::remove_file(entry_path(base, hash)) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Reads the reload index. A missing index is an empty cache.
pub fn read_index(base: &Path) -> Result<Vec<u64>> {
    let path = index_path(base);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    // A trailing partial hash is ignored, like a short read of the last record.
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            u64::from_le_bytes(raw)
        })
        .collect())
}

pub fn write_index(base: &Path, hashes: &[u64]) -> io::Result<()> {
    fs::create_dir_all(base)?;
    let bytes: Vec<u8> = hashes.iter().flat_map(|h| h.to_le_bytes()).collect();
    fs::write(index_path(base), bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stamp() -> Stamp {
        Stamp {
            version: "aero-nv2a-test".into(),
            vendor: "Mock Vendor".into(),
        }
    }

    fn binary() -> ProgramBinary {
        ProgramBinary {
            format: 0x8741,
            bytes: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn paths_split_hash() {
        let base = Path::new("/cache");
        assert_eq!(
            entry_path(base, 0x0123_4567_89ab_cdef),
            Path::new("/cache/shaders/0123/456789abcdef")
        );
        assert_eq!(index_path(base), Path::new("/cache/shader_cache_list"));
    }

    #[test]
    fn entry_layout_starts_with_stamp() {
        let bytes = encode_entry(&stamp(), &ShaderState::default(), &binary());
        assert_eq!(&bytes[..8], &14u64.to_le_bytes());
        assert_eq!(&bytes[8..22], b"aero-nv2a-test");
        assert_eq!(&bytes[bytes.len() - 5..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn decode_checks_stamp() {
        let bytes = encode_entry(&stamp(), &ShaderState::default(), &binary());
        let entry = decode_entry(&bytes, &stamp()).unwrap();
        assert_eq!(entry.binary, binary());
        assert_eq!(entry.state, ShaderState::default());

        let other = Stamp {
            vendor: "Other".into(),
            ..stamp()
        };
        let err = decode_entry(&bytes, &other).unwrap_err();
        assert!(err.to_string().contains("vendor stamp mismatch"), "{err}");
    }

    #[test]
    fn decode_rejects_truncation_and_trailing_bytes() {
        let mut bytes = encode_entry(&stamp(), &ShaderState::default(), &binary());
        assert!(decode_entry(&bytes[..bytes.len() - 1], &stamp()).is_err());
        bytes.push(0);
        let err = decode_entry(&bytes, &stamp()).unwrap_err();
        assert!(err.to_string().contains("trailing"), "{err}");
    }

    #[test]
    fn index_round_trip_and_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_index(dir.path()).unwrap(), Vec::<u64>::new());
        write_index(dir.path(), &[3, u64::MAX, 1]).unwrap();
        assert_eq!(read_index(dir.path()).unwrap(), vec![3, u64::MAX, 1]);
    }

    #[test]
    fn load_rejects_wrong_hash() {
        let dir = tempfile::tempdir().unwrap();
        let state = ShaderState::default();
        let wrong = state.content_hash() ^ 1;
        write_entry(dir.path(), wrong, &stamp(), &state, &binary()).unwrap();
        let err = load_entry(dir.path(), wrong, &stamp()).unwrap_err();
        assert!(err.to_string().contains("hashes to"), "{err}");

        let hash = state.content_hash();
        write_entry(dir.path(), hash, &stamp(), &state, &binary()).unwrap();
        assert_eq!(load_entry(dir.path(), hash, &stamp()).unwrap().state, state);
        remove_entry(dir.path(), hash).unwrap();
        remove_entry(dir.path(), hash).unwrap();
        assert!(!entry_path(dir.path(), hash).exists());
    }
}
