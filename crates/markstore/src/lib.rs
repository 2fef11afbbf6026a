//! The stub mark's on-disk wire format, and a thin convenience wrapper over
//! [`ReparseHost`] that fixes the owning tag/guid for every call.
//!
//! On-disk layout: `{tag: u32, data_length: u16, reserved: u16, guid: [u8; 16],
//! payload}`, where `payload = {remote_size: i64, remote_path:
//! nul-terminated UTF-16}` and `data_length` counts the payload only (not
//! the fixed header). A real host reads these bytes off its own reparse
//! API; [`decode_record`]/[`encode_record`] are the shared codec every host
//! adapter — real or fake — builds on.

use lazyfetch_error::{CoreError, CoreResult};
pub use lazyfetch_platform::{RawMark, ReparseHost};

/// Fixed header size: `tag` (4) + `data_length` (2) + `reserved` (2) +
/// `guid` (16).
pub const HEADER_LEN: usize = 4 + 2 + 2 + 16;

/// Decode one stub-mark record. Returns `Ok(None)` if the record's tag
/// doesn't match `own_tag` (it's a reparse point of a different kind, not
/// one of ours). Returns [`CoreError::Malformed`] if the buffer is shorter
/// than its own header, or `data_length` doesn't leave room for at least
/// an 8-byte `remote_size` plus a terminating nul char.
pub fn decode_record(bytes: &[u8], own_tag: u32) -> CoreResult<Option<RawMark>> {
    if bytes.len() < HEADER_LEN {
        return Err(CoreError::Malformed(format!(
            "record of {} bytes shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let tag = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if tag != own_tag {
        return Ok(None);
    }
    let data_length = u16::from_le_bytes(bytes[4..6].try_into().unwrap()) as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() < data_length {
        return Err(CoreError::Malformed(format!(
            "data_length {data_length} exceeds the {}-byte payload actually present",
            payload.len()
        )));
    }
    let payload = &payload[..data_length];
    if payload.len() < 8 + 2 {
        return Err(CoreError::Malformed(
            "payload too short for a remote_size and a terminated path".into(),
        ));
    }

    let remote_size = i64::from_le_bytes(payload[0..8].try_into().unwrap());
    if remote_size < 0 {
        return Err(CoreError::Malformed(format!(
            "negative remote_size {remote_size}"
        )));
    }
    let path_bytes = &payload[8..];
    let remote_path = decode_nul_terminated_u16(path_bytes)?;

    Ok(Some(RawMark {
        remote_size: remote_size as u64,
        remote_path,
    }))
}

/// Encode a mark the way [`decode_record`] expects to read it back. Used by
/// fake hosts and by tests that need a byte-exact round trip.
#[must_use]
pub fn encode_record(mark: &RawMark, own_tag: u32, guid: [u8; 16]) -> Vec<u8> {
    let path_units: Vec<u16> = mark.remote_path.encode_utf16().chain(std::iter::once(0)).collect();
    let path_bytes: Vec<u8> = path_units.iter().flat_map(|u| u.to_le_bytes()).collect();

    let mut payload = Vec::with_capacity(8 + path_bytes.len());
    payload.extend_from_slice(&(mark.remote_size as i64).to_le_bytes());
    payload.extend_from_slice(&path_bytes);

    let data_length = u16::try_from(payload.len()).expect("mark payload exceeds u16::MAX");

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&own_tag.to_le_bytes());
    out.extend_from_slice(&data_length.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // reserved
    out.extend_from_slice(&guid);
    out.extend_from_slice(&payload);
    out
}

fn decode_nul_terminated_u16(bytes: &[u8]) -> CoreResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(CoreError::Malformed(
            "remote_path byte length is not a multiple of 2".into(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16(&units)
        .map_err(|e| CoreError::Malformed(format!("remote_path is not valid UTF-16: {e}")))
}

/// Convenience wrapper that fixes `own_tag`/`own_guid` so call sites don't
/// thread them through every read/clear.
pub struct MarkStore<H> {
    host: H,
    own_tag: u32,
    own_guid: [u8; 16],
}

impl<H: ReparseHost> MarkStore<H> {
    pub fn new(host: H, own_tag: u32, own_guid: [u8; 16]) -> Self {
        Self { host, own_tag, own_guid }
    }

    #[must_use]
    pub fn own_tag(&self) -> u32 {
        self.own_tag
    }

    /// Read the mark at `path`, if one of ours is present.
    ///
    /// # Errors
    /// Propagates whatever the host reports, plus [`CoreError::Malformed`]
    /// if the mark's wire format is internally inconsistent.
    pub async fn read(&self, path: &str) -> CoreResult<Option<RawMark>> {
        self.host.read_mark(path).await
    }

    /// Clear the mark at `path`. Idempotent: clearing an absent mark
    /// succeeds with no side effects, matching the host contract.
    ///
    /// # Errors
    /// Propagates whatever the host reports while breaking the oplock,
    /// removing the mark, or restoring attributes.
    pub async fn clear(&self, path: &str) -> CoreResult<()> {
        self.host.clear_mark(path, self.own_tag, self.own_guid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUR_TAG: u32 = 0x8421_5a3c;
    const GUID: [u8; 16] = [7; 16];

    #[test]
    fn round_trips_through_encode_decode() {
        let mark = RawMark {
            remote_size: 1500,
            remote_path: "//src/a.bin".to_string(),
        };
        let bytes = encode_record(&mark, OUR_TAG, GUID);
        let decoded = decode_record(&bytes, OUR_TAG).unwrap().unwrap();
        assert_eq!(decoded, mark);
    }

    #[test]
    fn foreign_tag_decodes_to_none() {
        let mark = RawMark {
            remote_size: 1,
            remote_path: "x".to_string(),
        };
        let bytes = encode_record(&mark, 0xDEAD_BEEF, GUID);
        assert!(decode_record(&bytes, OUR_TAG).unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_malformed() {
        let bytes = vec![0u8; HEADER_LEN - 1];
        let err = decode_record(&bytes, OUR_TAG).unwrap_err();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn data_length_overrunning_buffer_is_malformed() {
        let mark = RawMark { remote_size: 4, remote_path: "a".to_string() };
        let mut bytes = encode_record(&mark, OUR_TAG, GUID);
        // Inflate the declared data_length beyond what's actually present.
        let bogus = u16::MAX.to_le_bytes();
        bytes[4] = bogus[0];
        bytes[5] = bogus[1];
        let err = decode_record(&bytes, OUR_TAG).unwrap_err();
        assert!(matches!(err, CoreError::Malformed(_)));
    }

    #[test]
    fn empty_remote_path_decodes_to_empty_string() {
        let mark = RawMark { remote_size: 0, remote_path: String::new() };
        let bytes = encode_record(&mark, OUR_TAG, GUID);
        let decoded = decode_record(&bytes, OUR_TAG).unwrap().unwrap();
        assert_eq!(decoded.remote_path, "");
        assert_eq!(decoded.remote_size, 0);
    }
}
