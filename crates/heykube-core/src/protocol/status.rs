//! Status events and notification-enable flags

use core::fmt;
use core::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::require_len;
use crate::codec::DeviceTimestamp;
use crate::errors::PayloadError;

// ----------------------------------------------------------------------------
// Notification Flags
// ----------------------------------------------------------------------------

/// Event bit-set shared by the Status enable byte and status records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotifyFlags(u8);

impl NotifyFlags {
    pub const SOLUTION: NotifyFlags = NotifyFlags(0x01);
    pub const MOVE: NotifyFlags = NotifyFlags(0x02);
    pub const MATCH: NotifyFlags = NotifyFlags(0x04);
    pub const DOUBLE_TAP: NotifyFlags = NotifyFlags(0x08);
    pub const INSTRUCTION_EMPTY: NotifyFlags = NotifyFlags(0x10);
    pub const INSTRUCTION_MAX: NotifyFlags = NotifyFlags(0x20);

    const NAMED: [(NotifyFlags, &'static str); 6] = [
        (Self::SOLUTION, "solution"),
        (Self::MOVE, "move"),
        (Self::MATCH, "match"),
        (Self::DOUBLE_TAP, "double_tap"),
        (Self::INSTRUCTION_EMPTY, "instruction_empty"),
        (Self::INSTRUCTION_MAX, "instruction_max"),
    ];

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(0x3f)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: NotifyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: NotifyFlags) {
        self.0 |= other.0;
    }

    /// Names of the set flags
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for NotifyFlags {
    type Output = NotifyFlags;

    fn bitor(self, rhs: NotifyFlags) -> NotifyFlags {
        NotifyFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for NotifyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ----------------------------------------------------------------------------
// Solution Progress
// ----------------------------------------------------------------------------

/// Stage of the beginner method the device believes the cube is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolutionPhase {
    Scrambled,
    BottomCross,
    BottomLayer,
    MiddleLayer,
    TopLayerCross,
    TopLayerFace,
    TopLayerCorner,
    Solved,
}

impl SolutionPhase {
    pub fn from_index(index: u8) -> SolutionPhase {
        match index & 0x7 {
            0 => SolutionPhase::Scrambled,
            1 => SolutionPhase::BottomCross,
            2 => SolutionPhase::BottomLayer,
            3 => SolutionPhase::MiddleLayer,
            4 => SolutionPhase::TopLayerCross,
            5 => SolutionPhase::TopLayerFace,
            6 => SolutionPhase::TopLayerCorner,
            _ => SolutionPhase::Solved,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SolutionPhase::Scrambled => "scrambled",
            SolutionPhase::BottomCross => "bottom_cross",
            SolutionPhase::BottomLayer => "bottom_layer",
            SolutionPhase::MiddleLayer => "middle_layer",
            SolutionPhase::TopLayerCross => "top_layer_cross",
            SolutionPhase::TopLayerFace => "top_layer_face",
            SolutionPhase::TopLayerCorner => "top_layer_corner",
            SolutionPhase::Solved => "solved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolutionProgress {
    pub phase: SolutionPhase,
    /// Pieces already correct within the phase, 0..=3
    pub count: u8,
}

impl SolutionProgress {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            phase: SolutionPhase::from_index(byte >> 2),
            count: byte & 0x3,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.phase as u8) << 2 | (self.count & 0x3)
    }
}

impl fmt::Display for SolutionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.phase.name(), self.count)
    }
}

// ----------------------------------------------------------------------------
// Status Events
// ----------------------------------------------------------------------------

/// One 5-byte status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub flags: NotifyFlags,
    /// Present when the solution flag is set
    pub solution: Option<SolutionProgress>,
    pub seq_num: u8,
    pub timestamp: DeviceTimestamp,
}

impl StatusEvent {
    pub const RECORD_BYTES: usize = 5;
    pub const HISTORY_RECORDS: usize = 4;

    /// Decodes `[flags, solution, seq, ts_lo, ts_hi]`; a zero flag byte is no event
    pub fn parse_record(record: &[u8]) -> Result<Option<Self>, PayloadError> {
        require_len("Status", record, Self::RECORD_BYTES)?;

        let flags = NotifyFlags::from_bits(record[0]);
        if flags.is_empty() {
            return Ok(None);
        }
        let solution = flags
            .contains(NotifyFlags::SOLUTION)
            .then(|| SolutionProgress::from_byte(record[1]));

        Ok(Some(Self {
            flags,
            solution,
            seq_num: record[2],
            timestamp: DeviceTimestamp::from_le_bytes([record[3], record[4]]),
        }))
    }

    /// Decodes a Status notification, whose record follows one leading byte
    pub fn parse_notification(payload: &[u8]) -> Result<Option<Self>, PayloadError> {
        require_len("Status", payload, 1 + Self::RECORD_BYTES)?;
        Self::parse_record(&payload[1..1 + Self::RECORD_BYTES])
    }

    /// Decodes the recent-events history returned by a Status read
    pub fn parse_history(payload: &[u8]) -> Result<Vec<Self>, PayloadError> {
        require_len("Status", payload, 1 + Self::RECORD_BYTES)?;

        let mut events = Vec::with_capacity(Self::HISTORY_RECORDS);
        for k in 0..Self::HISTORY_RECORDS {
            let start = 1 + k * Self::RECORD_BYTES;
            let Some(record) = payload.get(start..start + Self::RECORD_BYTES) else {
                break;
            };
            if let Some(event) = Self::parse_record(record)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    pub fn to_record(&self) -> [u8; Self::RECORD_BYTES] {
        let [lo, hi] = self.timestamp.to_le_bytes();
        [
            self.flags.bits(),
            self.solution.map_or(0, SolutionProgress::to_byte),
            self.seq_num,
            lo,
            hi,
        ]
    }
}
