//! Version, battery and configuration payloads, plus built-in patterns

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::require_len;
use crate::errors::PayloadError;

// ----------------------------------------------------------------------------
// Version
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Why the previous BLE link ended, as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    RemoteUserTerminated,
    AcceptTimeoutExceeded,
    SupervisionTimeout,
    Other(u8),
}

impl DisconnectReason {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x13 => DisconnectReason::RemoteUserTerminated,
            0x10 => DisconnectReason::AcceptTimeoutExceeded,
            0x08 => DisconnectReason::SupervisionTimeout,
            other => DisconnectReason::Other(other),
        }
    }
}

/// Decoded Version characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: FirmwareVersion,
    pub battery_ok: bool,
    pub motion_enabled: bool,
    pub full6_moves: bool,
    pub custom_config: bool,
    pub hints_enabled: bool,
    pub disconnect_reason: DisconnectReason,
}

impl VersionInfo {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        require_len("Version", payload, 4)?;
        let flags = payload[2];
        Ok(Self {
            version: FirmwareVersion {
                major: payload[1],
                minor: payload[0],
            },
            battery_ok: flags & 0x02 != 0,
            motion_enabled: flags & 0x04 != 0,
            full6_moves: flags & 0x08 != 0,
            custom_config: flags & 0x10 != 0,
            hints_enabled: flags & 0x20 == 0,
            disconnect_reason: DisconnectReason::from_code(payload[3]),
        })
    }
}

// ----------------------------------------------------------------------------
// Battery
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    /// Cell voltage in volts
    pub voltage: f32,
    pub charging: bool,
}

impl BatteryReading {
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        require_len("Battery", payload, 2)?;
        // unsigned 3.9 fixed point over the low 12 bits
        let raw = u16::from(payload[0]) | u16::from(payload[1] & 0x0f) << 8;
        Ok(Self {
            voltage: f32::from(raw) / 512.0,
            charging: payload[1] & 0x10 != 0,
        })
    }
}

// ----------------------------------------------------------------------------
// Config
// ----------------------------------------------------------------------------

const MAJOR_SOUND: u8 = 0x08;
const MINOR_SOUND: u8 = 0x10;

/// Rewrites the sound bits of config byte 0, leaving the others untouched
pub fn with_sounds(config: u8, major: bool, minor: bool) -> u8 {
    let mut value = config & !(MAJOR_SOUND | MINOR_SOUND);
    if major {
        value |= MAJOR_SOUND;
    }
    if minor {
        value |= MINOR_SOUND;
    }
    value
}

// ----------------------------------------------------------------------------
// Built-in Patterns
// ----------------------------------------------------------------------------

const ENABLE_PATTERN_ACTION: u8 = 0x08;

/// Patterns the device can guide the user through once it is solved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinPattern {
    Checkerboard,
    SixSpots,
    CubeInCube,
    Anaconda,
    Tetris,
    DontCrossLine,
    GreenMamba,
    SpiralPattern,
    Python,
    Kilt,
    CubeInCubeInCube,
    OrderInChaos,
    PlusMinus,
    DisplacedMotif,
    CuAround,
    VerticalStripes,
}

impl BuiltinPattern {
    pub const ALL: [BuiltinPattern; 16] = [
        BuiltinPattern::Checkerboard,
        BuiltinPattern::SixSpots,
        BuiltinPattern::CubeInCube,
        BuiltinPattern::Anaconda,
        BuiltinPattern::Tetris,
        BuiltinPattern::DontCrossLine,
        BuiltinPattern::GreenMamba,
        BuiltinPattern::SpiralPattern,
        BuiltinPattern::Python,
        BuiltinPattern::Kilt,
        BuiltinPattern::CubeInCubeInCube,
        BuiltinPattern::OrderInChaos,
        BuiltinPattern::PlusMinus,
        BuiltinPattern::DisplacedMotif,
        BuiltinPattern::CuAround,
        BuiltinPattern::VerticalStripes,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinPattern::Checkerboard => "checkerboard",
            BuiltinPattern::SixSpots => "sixspots",
            BuiltinPattern::CubeInCube => "cubeincube",
            BuiltinPattern::Anaconda => "anaconda",
            BuiltinPattern::Tetris => "tetris",
            BuiltinPattern::DontCrossLine => "dontcrossline",
            BuiltinPattern::GreenMamba => "greenmamba",
            BuiltinPattern::SpiralPattern => "spiralpattern",
            BuiltinPattern::Python => "python",
            BuiltinPattern::Kilt => "kilt",
            BuiltinPattern::CubeInCubeInCube => "cubeincubeincube",
            BuiltinPattern::OrderInChaos => "orderinchaos",
            BuiltinPattern::PlusMinus => "plusminus",
            BuiltinPattern::DisplacedMotif => "displacedmotif",
            BuiltinPattern::CuAround => "cuaround",
            BuiltinPattern::VerticalStripes => "verticalstripes",
        }
    }

    /// Action write that starts this pattern's instructions
    pub fn action_payload(self) -> [u8; 2] {
        [ENABLE_PATTERN_ACTION, self.index()]
    }
}

impl FromStr for BuiltinPattern {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.name() == s)
            .ok_or_else(|| PayloadError::UnknownPattern(s.to_string()))
    }
}

impl fmt::Display for BuiltinPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let info = VersionInfo::parse(&[7, 1, 0x2a, 0x13]).unwrap();
        assert_eq!(info.version.to_string(), "v1.7");
        assert!(info.battery_ok);
        assert!(!info.motion_enabled);
        assert!(info.full6_moves);
        assert!(!info.custom_config);
        assert!(!info.hints_enabled);
        assert_eq!(info.disconnect_reason, DisconnectReason::RemoteUserTerminated);

        let info = VersionInfo::parse(&[0, 2, 0, 0x3e]).unwrap();
        assert!(info.hints_enabled);
        assert_eq!(info.disconnect_reason, DisconnectReason::Other(0x3e));
        assert!(VersionInfo::parse(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_battery_parse() {
        let reading = BatteryReading::parse(&[0x00, 0x18]).unwrap();
        assert_eq!(reading.voltage, 4.0);
        assert!(reading.charging);

        let reading = BatteryReading::parse(&[0x80, 0x07]).unwrap();
        assert_eq!(reading.voltage, 3.75);
        assert!(!reading.charging);
    }

    #[test]
    fn test_sound_bits() {
        assert_eq!(with_sounds(0xff, false, false), 0xe7);
        assert_eq!(with_sounds(0x00, true, false), 0x08);
        assert_eq!(with_sounds(0x01, true, true), 0x19);
    }

    #[test]
    fn test_patterns() {
        assert_eq!(BuiltinPattern::ALL.len(), 16);
        assert_eq!("tetris".parse::<BuiltinPattern>().unwrap().action_payload(), [0x08, 4]);
        assert_eq!(BuiltinPattern::from_index(15), Some(BuiltinPattern::VerticalStripes));
        assert!("rubik".parse::<BuiltinPattern>().is_err());
        for pattern in BuiltinPattern::ALL {
            assert_eq!(BuiltinPattern::from_index(pattern.index()), Some(pattern));
        }
    }
}
