//! Characteristic payload formats
//!
//! The device exposes one GATT characteristic per [`WireField`]. The
//! submodules decode and build the payloads that are more than raw bytes.

use core::fmt;

use serde::{Deserialize, Serialize};

pub mod device;
pub mod instructions;
pub mod status;

pub use device::{BatteryReading, BuiltinPattern, DisconnectReason, FirmwareVersion, VersionInfo};
pub use instructions::{MovesRecord, MAX_INSTRUCTIONS};
pub use status::{NotifyFlags, SolutionPhase, SolutionProgress, StatusEvent};

use crate::errors::PayloadError;

// ----------------------------------------------------------------------------
// Wire Fields
// ----------------------------------------------------------------------------

/// Logical characteristic identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireField {
    Version,
    Battery,
    Config,
    CubeState,
    Status,
    MatchState,
    Instructions,
    Action,
    Accel,
    Moves,
}

impl WireField {
    pub const ALL: [WireField; 10] = [
        WireField::Version,
        WireField::Battery,
        WireField::Config,
        WireField::CubeState,
        WireField::Status,
        WireField::MatchState,
        WireField::Instructions,
        WireField::Action,
        WireField::Accel,
        WireField::Moves,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WireField::Version => "Version",
            WireField::Battery => "Battery",
            WireField::Config => "Config",
            WireField::CubeState => "CubeState",
            WireField::Status => "Status",
            WireField::MatchState => "MatchState",
            WireField::Instructions => "Instructions",
            WireField::Action => "Action",
            WireField::Accel => "Accel",
            WireField::Moves => "Moves",
        }
    }
}

impl fmt::Display for WireField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fails unless `payload` holds at least `expected` bytes
pub(crate) fn require_len(
    field: &'static str,
    payload: &[u8],
    expected: usize,
) -> Result<(), PayloadError> {
    if payload.len() < expected {
        Err(PayloadError::TooShort {
            field,
            expected,
            actual: payload.len(),
        })
    } else {
        Ok(())
    }
}

/// Sequence-number distance, modulo 256
pub fn sequence_delta(previous: u8, current: u8) -> u8 {
    current.wrapping_sub(previous)
}
