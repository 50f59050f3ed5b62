//! Instruction queue and moves log payloads

use serde::{Deserialize, Serialize};

use super::{require_len, sequence_delta};
use crate::codec::{unpack_moves, DeviceTimestamp, EMPTY_SLOT};
use crate::errors::{HeykubeError, PayloadError};
use crate::moves::{Move, MoveSequence};

/// Largest instruction list the device accepts in one write
pub const MAX_INSTRUCTIONS: usize = 52;

const APPEND_FLAG: u8 = 0x80;

// ----------------------------------------------------------------------------
// Instructions
// ----------------------------------------------------------------------------

/// Builds an Instructions write: count byte then nibble-packed face turns
///
/// An empty list is sent as `[0, 0xFF]`, which clears the queue.
pub fn encode_instructions(moves: &MoveSequence, append: bool) -> Result<Vec<u8>, HeykubeError> {
    if moves.len() > MAX_INSTRUCTIONS {
        return Err(PayloadError::TooManyInstructions {
            count: moves.len(),
            max: MAX_INSTRUCTIONS,
        }
        .into());
    }
    if moves.is_empty() {
        return Ok(vec![0x00, 0xff]);
    }

    let mut out = Vec::with_capacity(1 + moves.len().div_ceil(2));
    let count = moves.len() as u8;
    out.push(if append { count | APPEND_FLAG } else { count });
    for pair in moves.as_slice().chunks(2) {
        let low = pair[0].wire_nibble()?;
        let high = match pair.get(1) {
            Some(mv) => mv.wire_nibble()?,
            None => EMPTY_SLOT,
        };
        out.push(low | high << 4);
    }
    Ok(out)
}

/// Payload that drops all queued instructions
pub fn clear_instructions() -> Vec<u8> {
    vec![0x00]
}

/// Reads the queued instructions back
///
/// Nibbles 6 and 7 are markers that hide themselves and the following slot.
pub fn decode_instructions(payload: &[u8]) -> Result<MoveSequence, HeykubeError> {
    require_len("Instructions", payload, 1)?;
    let count = usize::from(payload[0] & !APPEND_FLAG);
    let needed = 1 + count.div_ceil(2);
    require_len("Instructions", payload, needed)?;

    let mut moves = MoveSequence::new();
    let mut skip = false;
    for slot in 0..count {
        let byte = payload[1 + slot / 2];
        let nibble = if slot % 2 == 0 { byte & 0x0f } else { byte >> 4 };
        if skip {
            skip = false;
        } else if nibble == 0x6 || nibble == 0x7 {
            skip = true;
        } else {
            moves.push(Move::from_index(nibble)?);
        }
    }
    Ok(moves)
}

// ----------------------------------------------------------------------------
// Moves Log
// ----------------------------------------------------------------------------

/// The Moves characteristic: up to 40 recent face turns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovesRecord {
    pub seq_num: u8,
    /// Oldest first
    pub moves: MoveSequence,
    pub timestamp: DeviceTimestamp,
}

impl MovesRecord {
    pub const BYTES: usize = 23;
    const SLOTS_OFFSET: usize = 1;
    const SLOT_BYTES: usize = 20;
    const TIMESTAMP_OFFSET: usize = 21;

    pub fn parse(payload: &[u8]) -> Result<Self, HeykubeError> {
        require_len("Moves", payload, Self::BYTES)?;
        let slots = &payload[Self::SLOTS_OFFSET..Self::SLOTS_OFFSET + Self::SLOT_BYTES];
        Ok(Self {
            seq_num: payload[0],
            moves: unpack_moves(slots)?,
            timestamp: DeviceTimestamp::from_le_bytes([
                payload[Self::TIMESTAMP_OFFSET],
                payload[Self::TIMESTAMP_OFFSET + 1],
            ]),
        })
    }

    /// Keeps only the moves made after `previous_seq`
    pub fn since(mut self, previous_seq: u8) -> Self {
        let delta = usize::from(sequence_delta(previous_seq, self.seq_num));
        self.moves = self.moves.tail(delta);
        self
    }
}
