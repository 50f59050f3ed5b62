//! Live cube model kept in step with the device
//!
//! [`TrackedCube`] pairs the cube state with the device's rolling sequence
//! number, a move log and the last device timestamp. Frames from the device
//! are reconciled against the known sequence number so that moves made
//! between two frames are recovered from the frame's move history.

use tracing::{debug, warn};

use crate::codec::{DeviceTimestamp, StateFrame, HISTORY_SLOTS};
use crate::cube::CubeState;
use crate::errors::{HeykubeError, Result};
use crate::moves::{Move, MoveSequence};
use crate::pattern::Match;
use crate::protocol::sequence_delta;

/// What a reconciled frame changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUpdate {
    pub seq_num: u8,
    /// Sequence-number distance from the previous frame
    pub delta: u8,
    /// Moves recovered from the frame's history, oldest first
    pub moves: MoveSequence,
    /// Moves that happened but no longer fit in the history buffer
    pub missed: usize,
    pub timestamp: DeviceTimestamp,
}

impl FrameUpdate {
    pub fn has_gap(&self) -> bool {
        self.missed > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedCube {
    state: CubeState,
    seq_num: u8,
    moves: MoveSequence,
    timestamp: DeviceTimestamp,
    missed: usize,
}

impl TrackedCube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CubeState {
        &self.state
    }

    pub fn seq_num(&self) -> u8 {
        self.seq_num
    }

    /// Every move recorded since the log was last cleared
    pub fn moves(&self) -> &MoveSequence {
        &self.moves
    }

    pub fn timestamp(&self) -> DeviceTimestamp {
        self.timestamp
    }

    /// Total number of moves known to be missing from the log
    pub fn missed_moves(&self) -> usize {
        self.missed
    }

    pub fn is_solved(&self) -> bool {
        self.state.is_solved()
    }

    pub fn satisfies(&self, pattern: &Match) -> bool {
        self.state.satisfies(pattern)
    }

    /// Applies a move locally, advancing the sequence number like the device
    pub fn apply(&mut self, mv: Move) {
        self.state.apply(mv);
        self.moves.push(mv);
        self.seq_num = self.seq_num.wrapping_add(1);
    }

    pub fn apply_sequence(&mut self, moves: &MoveSequence) {
        for &mv in moves {
            self.apply(mv);
        }
    }

    pub fn clear_moves(&mut self) {
        self.moves.clear();
        self.missed = 0;
    }

    /// Back to a solved cube with an empty log
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Adopts a frame as the new baseline without reconciling history
    ///
    /// Used for the first read after connecting, when the previous
    /// sequence number is meaningless.
    pub fn adopt_frame(&mut self, frame: &StateFrame) -> Result<()> {
        let state = frame.decode_state()?;
        self.state = state;
        self.seq_num = frame.seq_num;
        self.timestamp = frame.timestamp;
        debug!(seq_num = frame.seq_num, "Adopted cube state baseline");
        Ok(())
    }

    /// Reconciles a device frame against the known sequence number
    ///
    /// The frame is validated completely before anything changes. On error
    /// the tracked state, sequence number and log are left untouched.
    pub fn apply_frame(&mut self, frame: &StateFrame) -> Result<FrameUpdate> {
        let decoded = frame
            .decode_state()
            .map_err(HeykubeError::from)
            .and_then(|state| Ok((state, frame.history()?)));
        let (state, history) = match decoded {
            Ok(parts) => parts,
            Err(e) => {
                warn!(
                    frame = %hex::encode(frame.to_bytes()),
                    error = %e,
                    "Rejected cube state frame"
                );
                return Err(e);
            }
        };

        let delta = sequence_delta(self.seq_num, frame.seq_num);
        let recoverable = usize::from(delta).min(history.len());
        let missed = usize::from(delta) - recoverable;
        let moves = history.tail(recoverable);

        if missed > 0 {
            warn!(
                delta,
                recovered = recoverable,
                missed,
                capacity = HISTORY_SLOTS,
                "Move log gap: some moves are unrecoverable"
            );
        }

        self.state = state;
        self.seq_num = frame.seq_num;
        self.timestamp = frame.timestamp;
        self.moves.extend(moves.iter().copied());
        self.missed += missed;

        debug!(seq_num = frame.seq_num, delta, moves = %moves, "Applied cube state frame");
        Ok(FrameUpdate {
            seq_num: frame.seq_num,
            delta,
            moves,
            missed,
            timestamp: frame.timestamp,
        })
    }
}
