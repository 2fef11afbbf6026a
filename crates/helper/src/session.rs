//! The single concurrent helper session: connect/disconnect lifecycle,
//! command dispatch, and the three outbound notifications.

use std::sync::{Arc, Mutex};

use lazyfetch_config::{Config, ConfigSource};
use lazyfetch_error::{CoreError, CoreResult};
use lazyfetch_platform::HelperTransport;

use crate::wire::{
    CommandKind, HelperTransportError, NotificationKind, SetModePayload, SetReportRatePayload,
    SetWatchPathsPayload,
};

const PROTOCOL_MAJOR: u16 = 1;
const PROTOCOL_MINOR: u16 = 0;

/// A helper connection. Handle-table bookkeeping (the helper-process and
/// system-process handles the real driver opens on connect) is host
/// responsibility and out of scope here; this crate owns only the
/// protocol-level state: who's connected, and the config store commands
/// mutate.
pub struct HelperSession {
    config: Arc<Config>,
    source: Arc<dyn ConfigSource>,
    transport: Arc<dyn HelperTransport>,
    connected_pid: Mutex<Option<u32>>,
}

impl HelperSession {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn ConfigSource>,
        transport: Arc<dyn HelperTransport>,
    ) -> Self {
        Self {
            config,
            source,
            transport,
            connected_pid: Mutex::new(None),
        }
    }

    /// Record the connecting helper's pid and trust it. Exactly one
    /// session is ever live; connecting over an existing one replaces it
    /// (the previous helper is presumed gone).
    pub fn connect(&self, pid: u32) {
        let mut guard = self.connected_pid.lock().expect("session lock poisoned");
        if let Some(previous) = guard.take() {
            self.config.untrust_pid(previous);
        }
        self.config.trust_pid(pid);
        *guard = Some(pid);
        #[cfg(feature = "tracing")]
        tracing::info!(pid, "helper connected");
    }

    /// Reverse everything `connect` did.
    pub fn disconnect(&self) {
        let mut guard = self.connected_pid.lock().expect("session lock poisoned");
        if let Some(pid) = guard.take() {
            self.config.untrust_pid(pid);
            #[cfg(feature = "tracing")]
            tracing::info!(pid, "helper disconnected");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected_pid.lock().expect("session lock poisoned").is_some()
    }

    fn require_connected(&self) -> Result<(), HelperTransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(HelperTransportError::NoSession)
        }
    }

    /// Dispatch one client-to-core command. Returns the reply payload
    /// (empty for commands with no reply).
    ///
    /// # Errors
    /// [`CoreError::Disconnected`] if no session is connected; otherwise a
    /// decode or config-store failure.
    pub fn handle_command(&self, kind: CommandKind, data: &[u8]) -> CoreResult<Vec<u8>> {
        self.require_connected()?;
        match kind {
            CommandKind::GetVersion => {
                let mut reply = Vec::with_capacity(4);
                reply.extend_from_slice(&PROTOCOL_MAJOR.to_le_bytes());
                reply.extend_from_slice(&PROTOCOL_MINOR.to_le_bytes());
                Ok(reply)
            }
            CommandKind::ReloadConfig => {
                self.config.reload_from(self.source.as_ref())?;
                Ok(Vec::new())
            }
            CommandKind::SetMode => {
                let payload = SetModePayload::decode(data)?;
                self.config
                    .set_mode(lazyfetch_config::Mode::from_bits_truncate(payload.mode));
                Ok(Vec::new())
            }
            CommandKind::SetWatchPaths => {
                let payload = SetWatchPathsPayload::decode(data)?;
                self.config.set_watch_paths(payload.paths)?;
                Ok(Vec::new())
            }
            CommandKind::SetReportRate => {
                let payload = SetReportRatePayload::decode(data)?;
                self.config.set_report_rate(payload.rate);
                Ok(Vec::new())
            }
        }
    }

    /// `open_in_helper{path}` → `{handle}`. The returned handle is valid in
    /// the helper's address space; the caller is responsible for
    /// duplicating it into its own handle table before use.
    ///
    /// # Errors
    /// Whatever the transport reports, converted to [`CoreError`].
    pub async fn open_in_helper(&self, path: &str) -> CoreResult<u64> {
        self.require_connected()?;
        let data = encode_u16_string(path);
        let reply = self
            .transport
            .notify(NotificationKind::OpenInHelper as u32, data)
            .await?;
        decode_u64(&reply).map_err(CoreError::from)
    }

    /// `close_in_helper{handle}`, no reply.
    ///
    /// # Errors
    /// Whatever the transport reports, converted to [`CoreError`].
    pub async fn close_in_helper(&self, handle: u64) -> CoreResult<()> {
        self.require_connected()?;
        let data = handle.to_le_bytes().to_vec();
        self.transport
            .notify(NotificationKind::CloseInHelper as u32, data)
            .await?;
        Ok(())
    }

    /// `fetch_in_helper{source, target}` → `{bytes_copied}`. Declared by
    /// the protocol with no production call site; kept for completeness.
    ///
    /// # Errors
    /// Whatever the transport reports, converted to [`CoreError`].
    pub async fn fetch_in_helper(&self, source: &str, target: &str) -> CoreResult<i64> {
        self.require_connected()?;
        let mut data = encode_u16_string(source);
        data.extend(encode_u16_string(target));
        let reply = self
            .transport
            .notify(NotificationKind::FetchInHelper as u32, data)
            .await?;
        decode_i64(&reply).map_err(CoreError::from)
    }
}

fn encode_u16_string(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

fn decode_u64(bytes: &[u8]) -> Result<u64, HelperTransportError> {
    bytes
        .get(0..8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| HelperTransportError::Malformed("reply shorter than a u64".into()))
}

fn decode_i64(bytes: &[u8]) -> Result<i64, HelperTransportError> {
    bytes
        .get(0..8)
        .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| HelperTransportError::Malformed("reply shorter than an i64".into()))
}
