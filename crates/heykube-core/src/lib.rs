//! HEYKUBE Core
//!
//! Synchronous model of the HEYKUBE smart cube: facelets and colors, the
//! move algebra and notation parser, the cube state with its compact wire
//! codec, match patterns, and the characteristic payload formats. Nothing in
//! this crate performs I/O; the BLE client lives in `heykube-ble`.
//!
//! ```
//! use heykube_core::{codec, CubeState, MoveSequence};
//!
//! let moves: MoveSequence = "R U R' U'".parse().unwrap();
//! let cube = CubeState::solved().applied(&moves);
//! let bytes = codec::encode_state(&cube).unwrap();
//! assert_eq!(codec::decode_state(&bytes).unwrap(), cube);
//! assert!(cube.applied(&moves.reversed()).is_solved());
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod codec;
pub mod cube;
pub mod errors;
pub mod facelet;
pub mod moves;
pub mod pattern;
pub mod protocol;
pub mod tracker;

mod tables;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use codec::{DeviceTimestamp, StateFrame};
pub use cube::CubeState;
pub use errors::{CodecError, HeykubeError, MoveError, NotationError, PayloadError, Result};
pub use facelet::{CubeColor, Face, Facelet};
pub use moves::{Move, MoveSequence, ParsedMoves};
pub use pattern::Match;
pub use protocol::{
    BatteryReading, BuiltinPattern, MovesRecord, NotifyFlags, SolutionPhase, StatusEvent,
    VersionInfo, WireField,
};
pub use tracker::{FrameUpdate, TrackedCube};
