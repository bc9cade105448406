//! Framing for the store files: a fixed header followed by a JSON payload.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::types::checksum::store_file_crc32;
use crate::types::{BatchError, Result};

/// Magic bytes opening every store file.
pub const STORE_FILE_MAGIC: [u8; 4] = *b"BTCH";
/// Current store file format version.
pub const STORE_FILE_VERSION: u16 = 1;
/// Length of the fixed header preceding the payload.
pub const STORE_FILE_HDR_LEN: usize = 20;

pub mod header {
    //! Byte offsets for fixed header fields.
    use core::ops::Range;

    pub const MAGIC: Range<usize> = 0..4;
    pub const FORMAT_VERSION: Range<usize> = 4..6;
    pub const RESERVED: Range<usize> = 6..8;
    pub const PAYLOAD_LEN: Range<usize> = 8..16;
    pub const CRC32: Range<usize> = 16..20;
}

/// Serializes `value` and atomically replaces the file at `path`.
pub fn write_store_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    let mut hdr = [0u8; STORE_FILE_HDR_LEN];
    hdr[header::MAGIC].copy_from_slice(&STORE_FILE_MAGIC);
    hdr[header::FORMAT_VERSION].copy_from_slice(&STORE_FILE_VERSION.to_be_bytes());
    hdr[header::PAYLOAD_LEN].copy_from_slice(&(payload.len() as u64).to_be_bytes());
    let crc = store_file_crc32(STORE_FILE_VERSION, &payload);
    hdr[header::CRC32].copy_from_slice(&crc.to_be_bytes());

    let tmp = path.with_extension("tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&hdr)?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    trace!(path = %path.display(), bytes = payload.len(), "store_file.write");
    Ok(())
}

/// Reads and validates a store file, returning `None` when it does not exist yet.
pub fn read_store_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    if buf.len() < STORE_FILE_HDR_LEN {
        return Err(corrupt(path, "header truncated"));
    }
    let (hdr, payload) = buf.split_at(STORE_FILE_HDR_LEN);
    if hdr[header::MAGIC] != STORE_FILE_MAGIC {
        return Err(corrupt(path, "invalid magic"));
    }
    let version = u16::from_be_bytes([hdr[4], hdr[5]]);
    if version != STORE_FILE_VERSION {
        return Err(corrupt(path, "unsupported format version"));
    }
    if hdr[header::RESERVED].iter().any(|b| *b != 0) {
        return Err(corrupt(path, "reserved header bytes not zero"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&hdr[header::PAYLOAD_LEN]);
    if u64::from_be_bytes(len_bytes) != payload.len() as u64 {
        return Err(corrupt(path, "payload length mismatch"));
    }
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&hdr[header::CRC32]);
    if u32::from_be_bytes(crc_bytes) != store_file_crc32(version, payload) {
        return Err(corrupt(path, "checksum mismatch"));
    }
    Ok(Some(serde_json::from_slice(payload)?))
}

fn corrupt(path: &Path, what: &str) -> BatchError {
    BatchError::corruption(format!("{}: {what}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let loaded: Option<Vec<u32>> = read_store_file(&dir.path().join("absent.db"))?;
        assert!(loaded.is_none());
        Ok(())
    }

    #[test]
    fn written_file_reads_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("counts.db");
        let mut value = BTreeMap::new();
        value.insert("nodes".to_string(), 3u64);
        write_store_file(&path, &value)?;
        let loaded: Option<BTreeMap<String, u64>> = read_store_file(&path)?;
        assert_eq!(loaded, Some(value));
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn flipped_payload_byte_is_corruption() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("flip.db");
        write_store_file(&path, &vec![1u64, 2, 3])?;
        let mut raw = fs::read(&path)?;
        let last = raw.len() - 2;
        raw[last] = b'9';
        fs::write(&path, raw)?;
        let err = read_store_file::<Vec<u64>>(&path).unwrap_err();
        assert!(matches!(err, BatchError::Corruption(_)), "{err}");
        Ok(())
    }

    #[test]
    fn bad_magic_is_corruption() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("magic.db");
        write_store_file(&path, &0u8)?;
        let mut raw = fs::read(&path)?;
        raw[0] = b'X';
        fs::write(&path, raw)?;
        assert!(matches!(
            read_store_file::<u8>(&path),
            Err(BatchError::Corruption(_))
        ));
        Ok(())
    }
}
