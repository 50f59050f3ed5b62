//! Compact cube state codec and the CubeState characteristic frame
//!
//! The 11-byte compact state stores edge and corner permutations as Lehmer
//! indices plus their orientations, bit packed little-endian:
//!
//! | bits      | field                                   |
//! |-----------|-----------------------------------------|
//! | 0..29     | edge permutation index (12 pieces)      |
//! | 29..41    | edge orientation, first edge in the MSB |
//! | 41..57    | corner permutation index (8 pieces)     |
//! | 57..70    | corner orientation, base 3              |
//! | 70..75    | puzzle position, always zero            |
//! | 75        | center orientation present              |
//! | 76..88    | center orientation                      |
//!
//! The full notification frame appends a sequence number, nine bytes of
//! nibble-packed move history and a 16-bit timestamp.

use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::cube::{CubeState, FACELET_CHECKSUM};
use crate::errors::{CodecError, MoveError};
use crate::facelet::{CORNER_SETS, EDGE_PAIRS};
use crate::moves::{Move, MoveSequence};

pub const STATE_BYTES: usize = 11;
pub const FRAME_BYTES: usize = 23;
pub const HISTORY_BYTES: usize = 9;
pub const HISTORY_SLOTS: usize = HISTORY_BYTES * 2;

/// Nibble value marking an unused move slot
pub const EMPTY_SLOT: u8 = 0x0F;

const SEQ_OFFSET: usize = 11;
const HISTORY_OFFSET: usize = 12;
const TIMESTAMP_OFFSET: usize = 21;
const CENTER_ORIENTATION_FLAG: u8 = 0x08;
const CORNER_ORIENTATIONS: u32 = 6561; // 3^8

// ----------------------------------------------------------------------------
// Permutation Indexing
// ----------------------------------------------------------------------------

/// Lehmer index of a permutation of `0..n`, `None` if `perm` is not one
pub fn encode_permutation(perm: &[u8]) -> Option<u32> {
    let n = perm.len();
    if n > 12 {
        return None;
    }

    let mut placed: u32 = 0;
    let mut rank: u32 = 0;
    for (i, &value) in perm.iter().enumerate() {
        if usize::from(value) >= n || placed & (1 << value) != 0 {
            return None;
        }
        let smaller = (placed & ((1u32 << value) - 1)).count_ones();
        placed |= 1 << value;
        rank = rank * (n - i) as u32 + u32::from(value) - smaller;
    }
    Some(rank)
}

/// Inverse of [`encode_permutation`]
pub fn decode_permutation(index: u32, n: usize) -> Result<SmallVec<[u8; 12]>, CodecError> {
    if n > 12 || u64::from(index) >= factorial(n) {
        return Err(CodecError::IndexOutOfRange { index, pieces: n });
    }

    let mut perm: SmallVec<[u8; 12]> = smallvec![0; n];
    let mut lex = index;
    for i in (0..n.saturating_sub(1)).rev() {
        let radix = (n - i) as u32;
        perm[i] = (lex % radix) as u8;
        lex /= radix;
        for j in i + 1..n {
            if perm[j] >= perm[i] {
                perm[j] += 1;
            }
        }
    }
    Ok(perm)
}

fn factorial(n: usize) -> u64 {
    (1..=n as u64).product()
}

/// Finds which cubie set holds `piece`, and at which offset
fn locate<const N: usize>(sets: &[[u8; N]], piece: u8) -> Option<(u8, u32)> {
    sets.iter().enumerate().find_map(|(slot, set)| {
        set.iter()
            .position(|&id| id == piece)
            .map(|offset| (slot as u8, offset as u32))
    })
}

// ----------------------------------------------------------------------------
// Compact State
// ----------------------------------------------------------------------------

/// Packs a cube state into the 11-byte wire form
///
/// Fails with [`CodecError::CentersDisplaced`] when whole-cube rotations
/// have moved the centers; call [`CubeState::reset_orientation`] first.
pub fn encode_state(state: &CubeState) -> Result<[u8; STATE_BYTES], CodecError> {
    if !state.centers_fixed() {
        return Err(CodecError::CentersDisplaced);
    }
    let facelets = state.as_array();

    let mut edges = [0u8; 12];
    let mut edge_orient: u32 = 0;
    for (k, pair) in EDGE_PAIRS.iter().enumerate() {
        let piece = facelets[usize::from(pair[0])];
        let (slot, flip) =
            locate(&EDGE_PAIRS, piece).ok_or(CodecError::InvalidPermutation { pieces: 12 })?;
        edges[k] = slot;
        edge_orient = (edge_orient << 1) | flip;
    }
    let edge_index =
        encode_permutation(&edges).ok_or(CodecError::InvalidPermutation { pieces: 12 })?;

    let mut corners = [0u8; 8];
    let mut corner_orient: u32 = 0;
    for (k, set) in CORNER_SETS.iter().enumerate() {
        let piece = facelets[usize::from(set[0])];
        let (slot, twist) =
            locate(&CORNER_SETS, piece).ok_or(CodecError::InvalidPermutation { pieces: 8 })?;
        corners[k] = slot;
        corner_orient = corner_orient * 3 + twist;
    }
    let corner_index =
        encode_permutation(&corners).ok_or(CodecError::InvalidPermutation { pieces: 8 })?;

    let mut out = [0u8; STATE_BYTES];
    out[0] = edge_index as u8;
    out[1] = (edge_index >> 8) as u8;
    out[2] = (edge_index >> 16) as u8;
    out[3] = ((edge_index >> 24) & 0x1f) as u8 | ((edge_orient & 0x7) << 5) as u8;
    out[4] = (edge_orient >> 3) as u8;
    out[5] = ((edge_orient >> 11) & 0x1) as u8 | ((corner_index & 0x7f) << 1) as u8;
    out[6] = (corner_index >> 7) as u8;
    out[7] = ((corner_index >> 15) & 0x1) as u8 | ((corner_orient & 0x7f) << 1) as u8;
    out[8] = ((corner_orient >> 7) & 0x3f) as u8;
    out[9] = CENTER_ORIENTATION_FLAG;
    out[10] = 0;
    Ok(out)
}

/// Unpacks the first 11 bytes of `bytes` into a cube state
pub fn decode_state(bytes: &[u8]) -> Result<CubeState, CodecError> {
    if bytes.len() < STATE_BYTES {
        return Err(CodecError::FrameTooShort {
            expected: STATE_BYTES,
            actual: bytes.len(),
        });
    }
    let b = |i: usize| u32::from(bytes[i]);

    let edge_index = b(0) | b(1) << 8 | b(2) << 16 | (b(3) & 0x1f) << 24;
    let mut edge_orient = b(3) >> 5 | b(4) << 3 | (b(5) & 0x1) << 11;
    let corner_index = b(5) >> 1 | b(6) << 7 | (b(7) & 0x1) << 15;
    let mut corner_orient = b(7) >> 1 | (b(8) & 0x3f) << 7;

    let position = b(8) >> 6 | (b(9) & 0x7) << 2;
    if position != 0 {
        return Err(CodecError::ReservedPosition(position as u8));
    }
    if corner_orient >= CORNER_ORIENTATIONS {
        return Err(CodecError::OrientationOutOfRange(corner_orient));
    }

    let edge_perm = decode_permutation(edge_index, 12)?;
    let corner_perm = decode_permutation(corner_index, 8)?;

    let mut facelets = *CubeState::solved().as_array();
    for k in (0..EDGE_PAIRS.len()).rev() {
        let flip = (edge_orient & 0x1) as usize;
        let source = EDGE_PAIRS[usize::from(edge_perm[k])];
        for (offset, &location) in EDGE_PAIRS[k].iter().enumerate() {
            facelets[usize::from(location)] = source[flip ^ offset];
        }
        edge_orient >>= 1;
    }
    for k in (0..CORNER_SETS.len()).rev() {
        let twist = (corner_orient % 3) as usize;
        let source = CORNER_SETS[usize::from(corner_perm[k])];
        for (offset, &location) in CORNER_SETS[k].iter().enumerate() {
            facelets[usize::from(location)] = source[(twist + offset) % 3];
        }
        corner_orient /= 3;
    }

    let sum: u32 = facelets.iter().map(|&id| u32::from(id)).sum();
    if sum != FACELET_CHECKSUM {
        return Err(CodecError::ChecksumMismatch { sum });
    }
    CubeState::from_facelets(facelets)
}

/// Center orientation carried by a compact state, when the flag is set
pub fn center_orientation(bytes: &[u8]) -> Option<u16> {
    match bytes.get(9..STATE_BYTES) {
        Some(&[b9, b10]) if b9 & CENTER_ORIENTATION_FLAG != 0 => {
            Some(u16::from(b9 >> 4) | u16::from(b10) << 4)
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Move Nibbles
// ----------------------------------------------------------------------------

/// Packs face turns two per byte, low nibble first, padding with `0xF`
pub fn pack_moves(moves: &[Move]) -> Result<Vec<u8>, MoveError> {
    moves
        .chunks(2)
        .map(|pair| {
            let low = pair[0].wire_nibble()?;
            let high = match pair.get(1) {
                Some(mv) => mv.wire_nibble()?,
                None => EMPTY_SLOT,
            };
            Ok(low | high << 4)
        })
        .collect()
}

/// Unpacks nibble-coded moves, low nibble first, skipping empty slots
pub fn unpack_moves(bytes: &[u8]) -> Result<MoveSequence, MoveError> {
    let mut moves = MoveSequence::new();
    for &byte in bytes {
        for nibble in [byte & 0x0f, byte >> 4] {
            if nibble != EMPTY_SLOT {
                moves.push(Move::from_index(nibble)?);
            }
        }
    }
    Ok(moves)
}

// ----------------------------------------------------------------------------
// Device Timestamps
// ----------------------------------------------------------------------------

/// Device clock reading in 1/512 s ticks; wraps every 128 s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceTimestamp(u16);

impl DeviceTimestamp {
    pub const TICKS_PER_SECOND: u32 = 512;

    pub fn from_ticks(ticks: u16) -> Self {
        Self(ticks)
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub fn ticks(self) -> u16 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.0) / f64::from(Self::TICKS_PER_SECOND)
    }

    pub fn as_duration(self) -> Duration {
        ticks_to_duration(self.0)
    }

    /// Time elapsed since `earlier`, assuming less than one wrap in between
    pub fn wrapping_since(self, earlier: DeviceTimestamp) -> Duration {
        ticks_to_duration(self.0.wrapping_sub(earlier.0))
    }
}

fn ticks_to_duration(ticks: u16) -> Duration {
    // 1e9 / 512 is exact
    Duration::from_nanos(u64::from(ticks) * 1_953_125)
}

impl fmt::Display for DeviceTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

// ----------------------------------------------------------------------------
// State Frame
// ----------------------------------------------------------------------------

/// The 23-byte CubeState characteristic payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFrame {
    pub state: [u8; STATE_BYTES],
    pub seq_num: u8,
    pub history: [u8; HISTORY_BYTES],
    pub timestamp: DeviceTimestamp,
}

impl StateFrame {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < FRAME_BYTES {
            return Err(CodecError::FrameTooShort {
                expected: FRAME_BYTES,
                actual: bytes.len(),
            });
        }

        let mut state = [0u8; STATE_BYTES];
        state.copy_from_slice(&bytes[..STATE_BYTES]);
        let mut history = [0u8; HISTORY_BYTES];
        history.copy_from_slice(&bytes[HISTORY_OFFSET..HISTORY_OFFSET + HISTORY_BYTES]);

        Ok(Self {
            state,
            seq_num: bytes[SEQ_OFFSET],
            history,
            timestamp: DeviceTimestamp::from_le_bytes([
                bytes[TIMESTAMP_OFFSET],
                bytes[TIMESTAMP_OFFSET + 1],
            ]),
        })
    }

    /// Frame for `state` with an empty move history
    pub fn new(state: &CubeState, seq_num: u8) -> Result<Self, CodecError> {
        Ok(Self {
            state: encode_state(state)?,
            seq_num,
            history: [0xff; HISTORY_BYTES],
            timestamp: DeviceTimestamp::default(),
        })
    }

    /// Fills the history with the last 18 of `moves`, newest in the final slot
    pub fn with_history(mut self, moves: &[Move]) -> Result<Self, MoveError> {
        let recent = &moves[moves.len().saturating_sub(HISTORY_SLOTS)..];
        let mut slots = [EMPTY_SLOT; HISTORY_SLOTS];
        let start = HISTORY_SLOTS - recent.len();
        for (slot, mv) in slots[start..].iter_mut().zip(recent) {
            *slot = mv.wire_nibble()?;
        }
        for (byte, pair) in self.history.iter_mut().zip(slots.chunks(2)) {
            *byte = pair[0] | pair[1] << 4;
        }
        Ok(self)
    }

    pub fn with_timestamp(mut self, timestamp: DeviceTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let mut out = [0u8; FRAME_BYTES];
        out[..STATE_BYTES].copy_from_slice(&self.state);
        out[SEQ_OFFSET] = self.seq_num;
        out[HISTORY_OFFSET..HISTORY_OFFSET + HISTORY_BYTES].copy_from_slice(&self.history);
        out[TIMESTAMP_OFFSET..].copy_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    pub fn decode_state(&self) -> Result<CubeState, CodecError> {
        decode_state(&self.state)
    }

    /// Recorded moves, oldest first
    pub fn history(&self) -> Result<MoveSequence, MoveError> {
        unpack_moves(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> CubeState {
        CubeState::solved().applied(&text.parse().unwrap())
    }

    #[test]
    fn test_permutation_index_extremes() {
        let identity: Vec<u8> = (0..12).collect();
        assert_eq!(encode_permutation(&identity), Some(0));
        let reversed: Vec<u8> = (0..12).rev().collect();
        assert_eq!(encode_permutation(&reversed), Some(479_001_599));
        assert_eq!(decode_permutation(479_001_599, 12).unwrap().as_slice(), &reversed[..]);
        assert!(decode_permutation(479_001_600, 12).is_err());
        assert_eq!(encode_permutation(&[0, 0, 1]), None);
    }

    #[test]
    fn test_solved_encoding() {
        assert_eq!(
            encode_state(&CubeState::solved()).unwrap(),
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 8, 0]
        );
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(
            encode_state(&state("U")).unwrap(),
            [128, 253, 157, 2, 0, 240, 45, 0, 0, 8, 0]
        );
        assert_eq!(
            encode_state(&state("F")).unwrap(),
            [48, 172, 167, 149, 17, 17, 125, 216, 18, 8, 0]
        );
        assert_eq!(
            encode_state(&state("R U R' U'")).unwrap(),
            [144, 77, 132, 1, 0, 224, 169, 252, 45, 8, 0]
        );
    }

    #[test]
    fn test_decode_known_encoding() {
        let decoded = decode_state(&[144, 77, 132, 1, 0, 224, 169, 252, 45, 8, 0]).unwrap();
        assert_eq!(decoded, state("R U R' U'"));
    }

    #[test]
    fn test_decode_rejects_reserved_position() {
        let mut bytes = [0u8, 0, 0, 0, 0, 0, 0, 0, 0, 8, 0];
        bytes[8] = 0x40;
        assert_eq!(decode_state(&bytes), Err(CodecError::ReservedPosition(1)));
    }

    #[test]
    fn test_encode_rejects_displaced_centers() {
        assert_eq!(encode_state(&state("x")), Err(CodecError::CentersDisplaced));
    }

    #[test]
    fn test_short_frame() {
        assert!(matches!(
            StateFrame::parse(&[0u8; 12]),
            Err(CodecError::FrameTooShort { expected: 23, actual: 12 })
        ));
    }

    #[test]
    fn test_frame_layout() {
        let frame = StateFrame::new(&state("R"), 42)
            .unwrap()
            .with_history(&[Move::R])
            .unwrap()
            .with_timestamp(DeviceTimestamp::from_ticks(0x1234));
        let bytes = frame.to_bytes();
        assert_eq!(bytes[11], 42);
        assert_eq!(bytes[20], 0x3f);
        assert_eq!(&bytes[12..20], &[0xff; 8]);
        assert_eq!(&bytes[21..], &[0x34, 0x12]);
        assert_eq!(StateFrame::parse(&bytes).unwrap(), frame);
        assert_eq!(frame.history().unwrap().as_slice(), &[Move::R]);
    }

    #[test]
    fn test_timestamp_units() {
        let ts = DeviceTimestamp::from_le_bytes([0x00, 0x02]);
        assert_eq!(ts.ticks(), 512);
        assert_eq!(ts.as_duration(), Duration::from_secs(1));
        let later = DeviceTimestamp::from_ticks(256);
        let earlier = DeviceTimestamp::from_ticks(u16::MAX - 255);
        assert_eq!(later.wrapping_since(earlier), Duration::from_secs(1));
    }

    #[test]
    fn test_nibble_packing() {
        let packed = pack_moves(&[Move::R, Move::UPrime, Move::D]).unwrap();
        assert_eq!(packed, vec![0x83, 0xf5]);
        let unpacked = unpack_moves(&packed).unwrap();
        assert_eq!(unpacked.as_slice(), &[Move::R, Move::UPrime, Move::D]);
        assert_eq!(unpack_moves(&[0xf6]), Err(MoveError::IllegalIndex(6)));
    }
}
