#![forbid(unsafe_code)]

/// Checksum algorithm protecting store file payloads.
pub trait Checksum {
    /// Checksum of `payload` written with format `version`.
    fn store_file(&self, version: u16, payload: &[u8]) -> u32;
}

/// CRC32 (IEEE) over the format version, the payload length and the payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32;

impl Checksum for Crc32 {
    fn store_file(&self, version: u16, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&version.to_be_bytes());
        hasher.update(&(payload.len() as u64).to_be_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}

/// [`Crc32`] checksum of a store file payload.
pub fn store_file_crc32(version: u16, payload: &[u8]) -> u32 {
    Crc32.store_file(version, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_fields_are_hashed_before_the_payload() {
        let payload = b"{\"high_id\":3}";
        let mut framed = Vec::new();
        framed.extend_from_slice(&1u16.to_be_bytes());
        framed.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        framed.extend_from_slice(payload);
        assert_eq!(store_file_crc32(1, payload), crc32fast::hash(&framed));
    }

    #[test]
    fn version_and_payload_changes_are_detected() {
        let payload = b"{\"high_id\":3}".to_vec();
        let base = store_file_crc32(1, &payload);
        assert_ne!(base, store_file_crc32(2, &payload));

        let mut flipped = payload.clone();
        flipped[0] ^= 0xFF;
        assert_ne!(base, store_file_crc32(1, &flipped));
    }
}
