//! The helper-delegation protocol: a single concurrent session with a
//! privileged user-mode helper, the five core-facing commands it can issue,
//! and the three notifications the core sends back to it.
//!
//! Wire encodings use the exact discriminants the original driver's
//! `DRIVER_COMMAND_TYPE`/`DRIVER_NOTIFICATION_TYPE` enums carry, so a
//! capture of the real wire traffic decodes against this crate unchanged.

mod session;
mod wire;

pub use session::HelperSession;
pub use wire::{
    CommandKind, HelperTransportError, NotificationKind, SetModePayload, SetReportRatePayload,
    SetWatchPathsPayload,
};
