//! Command/notification discriminants, payload codecs, and the buffer
//! hygiene rules (alignment + fault-mapping) the protocol requires.

use std::time::Duration;

use lazyfetch_error::CoreError;
use thiserror::Error;

/// Client-to-core commands. Discriminants match the original driver's
/// `DRIVER_COMMAND_TYPE`; `ReloadConfig` is the Rust-facing name for what
/// the wire calls `ReadRegistryParameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandKind {
    GetVersion = 1,
    ReloadConfig = 100,
    SetMode = 101,
    SetWatchPaths = 102,
    SetReportRate = 103,
}

impl TryFrom<u32> for CommandKind {
    type Error = HelperTransportError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CommandKind::GetVersion),
            100 => Ok(CommandKind::ReloadConfig),
            101 => Ok(CommandKind::SetMode),
            102 => Ok(CommandKind::SetWatchPaths),
            103 => Ok(CommandKind::SetReportRate),
            other => Err(HelperTransportError::Malformed(format!(
                "unrecognized command kind {other}"
            ))),
        }
    }
}

/// Core-to-client notifications. Discriminants match `DRIVER_NOTIFICATION_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NotificationKind {
    OpenInHelper = 1,
    CloseInHelper = 2,
    /// Declared by the original protocol with no call site; kept for wire
    /// completeness.
    FetchInHelper = 3,
}

/// Errors specific to the transport/codec layer, narrower than
/// [`lazyfetch_error::CoreError`]; every variant has a defined mapping into
/// it once an operation reaches the interception layer.
#[derive(Debug, Error)]
pub enum HelperTransportError {
    #[error("no helper session is connected")]
    NoSession,
    #[error("client buffer access faulted")]
    FaultedAccess,
    #[error("misaligned output buffer: expected alignment {expected}, pointer {pointer:#x}")]
    Misaligned { expected: usize, pointer: usize },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("reply timed out")]
    Timeout,
}

impl From<HelperTransportError> for CoreError {
    fn from(err: HelperTransportError) -> Self {
        match err {
            HelperTransportError::NoSession => CoreError::Disconnected,
            HelperTransportError::FaultedAccess => {
                CoreError::AccessDenied("client buffer access faulted".into())
            }
            HelperTransportError::Misaligned { expected, pointer } => {
                CoreError::Misaligned { expected, pointer }
            }
            HelperTransportError::Malformed(msg) => CoreError::Malformed(msg),
            HelperTransportError::Timeout => CoreError::Timeout(Duration::default()),
        }
    }
}

/// Required alignment for an output buffer pointer: 4 bytes for a 32-bit
/// caller running under a 64-bit core, otherwise the core's own
/// pointer-size.
#[must_use]
pub fn required_alignment(is_32bit_caller: bool) -> usize {
    if is_32bit_caller {
        4
    } else {
        std::mem::size_of::<usize>()
    }
}

/// Check a caller-supplied pointer against the required alignment.
///
/// # Errors
/// [`HelperTransportError::Misaligned`] if `pointer` doesn't satisfy `expected`.
pub fn check_alignment(pointer: usize, expected: usize) -> Result<(), HelperTransportError> {
    if pointer % expected == 0 {
        Ok(())
    } else {
        Err(HelperTransportError::Misaligned { expected, pointer })
    }
}

/// `set_mode{mode: u32}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetModePayload {
    pub mode: u32,
}

impl SetModePayload {
    /// # Errors
    /// [`HelperTransportError::Malformed`] if `data` isn't exactly 4 bytes.
    pub fn decode(data: &[u8]) -> Result<Self, HelperTransportError> {
        let mode = read_u32(data, 0)?;
        Ok(Self { mode })
    }
}

/// `set_report_rate{rate: u32}`, clamped by the config store on apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetReportRatePayload {
    pub rate: u32,
}

impl SetReportRatePayload {
    /// # Errors
    /// [`HelperTransportError::Malformed`] if `data` isn't exactly 4 bytes.
    pub fn decode(data: &[u8]) -> Result<Self, HelperTransportError> {
        let rate = read_u32(data, 0)?;
        Ok(Self { rate })
    }
}

/// `set_watch_paths{count: u32, paths: u16-string[count]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetWatchPathsPayload {
    pub paths: Vec<String>,
}

impl SetWatchPathsPayload {
    /// # Errors
    /// [`HelperTransportError::Malformed`] if `data` is truncated or
    /// contains an odd number of path bytes.
    pub fn decode(data: &[u8]) -> Result<Self, HelperTransportError> {
        let count = read_u32(data, 0)? as usize;
        let mut cursor = 4usize;
        let mut paths = Vec::with_capacity(count);
        for _ in 0..count {
            let (path, consumed) = read_nul_terminated_u16_string(data, cursor)?;
            paths.push(path);
            cursor += consumed;
        }
        Ok(Self { paths })
    }
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, HelperTransportError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| HelperTransportError::Malformed("payload shorter than a u32".into()))
}

fn read_nul_terminated_u16_string(
    data: &[u8],
    start: usize,
) -> Result<(String, usize), HelperTransportError> {
    let mut units = Vec::new();
    let mut cursor = start;
    loop {
        let pair = data
            .get(cursor..cursor + 2)
            .ok_or_else(|| HelperTransportError::Malformed("unterminated path string".into()))?;
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        cursor += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    let s = String::from_utf16(&units)
        .map_err(|e| HelperTransportError::Malformed(format!("not valid UTF-16: {e}")))?;
    Ok((s, cursor - start))
}
