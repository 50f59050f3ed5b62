//! Cube state as a facelet permutation

use core::fmt;

use crate::errors::{CodecError, MoveError};
use crate::facelet::{CubeColor, Face, Facelet, FACELET_COUNT};
use crate::moves::{Move, MoveSequence};
use crate::pattern::Match;

/// Sum of all facelet ids, used as a cheap integrity check on decoded frames
pub const FACELET_CHECKSUM: u32 = (FACELET_COUNT * (FACELET_COUNT - 1) / 2) as u32;

// ----------------------------------------------------------------------------
// Cube State
// ----------------------------------------------------------------------------

/// Which original sticker sits at every position
///
/// `piece_at(p)` is the facelet id that started at the position now
/// occupied by `p`. A solved cube is the identity permutation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CubeState {
    facelets: [u8; FACELET_COUNT],
}

impl CubeState {
    pub fn solved() -> Self {
        let mut facelets = [0u8; FACELET_COUNT];
        for (i, slot) in facelets.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self { facelets }
    }

    /// Builds a state from a raw permutation, checking that every id appears once
    pub fn from_facelets(facelets: [u8; FACELET_COUNT]) -> Result<Self, CodecError> {
        let mut seen = [false; FACELET_COUNT];
        for &id in facelets.iter() {
            let slot = seen
                .get_mut(usize::from(id))
                .ok_or(CodecError::InvalidPermutation { pieces: FACELET_COUNT })?;
            if *slot {
                return Err(CodecError::InvalidPermutation { pieces: FACELET_COUNT });
            }
            *slot = true;
        }
        Ok(Self { facelets })
    }

    pub fn as_array(&self) -> &[u8; FACELET_COUNT] {
        &self.facelets
    }

    pub fn piece_at(&self, position: Facelet) -> Facelet {
        Facelet::from_raw(self.facelets[position.index()])
    }

    pub fn color_at(&self, position: Facelet) -> CubeColor {
        self.piece_at(position).home_color()
    }

    pub fn is_solved(&self) -> bool {
        self.facelets.iter().enumerate().all(|(i, &id)| usize::from(id) == i)
    }

    /// True when every center shows its home color
    pub fn centers_fixed(&self) -> bool {
        Face::ALL.iter().all(|face| {
            let center = face.center();
            self.piece_at(center) == center
        })
    }

    pub fn facelet_sum(&self) -> u32 {
        self.facelets.iter().map(|&id| u32::from(id)).sum()
    }

    pub fn apply(&mut self, mv: Move) {
        let table = mv.permutation();
        let old = self.facelets;
        for (slot, &source) in self.facelets.iter_mut().zip(table.iter()) {
            *slot = old[usize::from(source)];
        }
    }

    pub fn apply_index(&mut self, index: u8) -> Result<(), MoveError> {
        self.apply(Move::from_index(index)?);
        Ok(())
    }

    pub fn apply_sequence(&mut self, moves: &MoveSequence) {
        for &mv in moves {
            self.apply(mv);
        }
    }

    /// Returns a copy with `moves` applied
    pub fn applied(&self, moves: &MoveSequence) -> CubeState {
        let mut next = self.clone();
        next.apply_sequence(moves);
        next
    }

    pub fn satisfies(&self, pattern: &Match) -> bool {
        pattern.matches(self)
    }

    /// Colors of the U and F centers
    pub fn orientation(&self) -> (CubeColor, CubeColor) {
        (self.color_at(Face::U.center()), self.color_at(Face::F.center()))
    }

    /// Rotates the whole cube until White is on U and Green on F
    ///
    /// Returns the rotations that were applied.
    pub fn reset_orientation(&mut self) -> MoveSequence {
        use Move::*;

        let mut rotations = MoveSequence::new();
        let white = self.face_showing(CubeColor::White);
        let to_top: &[Move] = match white {
            Face::L => &[Z],
            Face::F => &[X],
            Face::R => &[ZPrime],
            Face::B => &[XPrime],
            Face::D => &[X, X],
            Face::U => &[],
        };
        rotations.extend(to_top.iter().copied());
        for &mv in to_top {
            self.apply(mv);
        }

        let green = self.face_showing(CubeColor::Green);
        let to_front: &[Move] = match green {
            Face::L => &[YPrime],
            Face::R => &[Y],
            Face::B => &[Y, Y],
            _ => &[],
        };
        rotations.extend(to_front.iter().copied());
        for &mv in to_front {
            self.apply(mv);
        }
        rotations
    }

    fn face_showing(&self, color: CubeColor) -> Face {
        Face::ALL
            .into_iter()
            .find(|face| self.color_at(face.center()) == color)
            .unwrap_or(Face::U)
    }

    /// Renders an unfolded net from a per-position color lookup
    pub(crate) fn write_net(
        f: &mut fmt::Formatter<'_>,
        color: impl Fn(usize) -> CubeColor,
    ) -> fmt::Result {
        let cell = |index: usize| color(index).abbreviation();

        for row in 0..3 {
            write!(f, "{:12}", "")?;
            for col in 0..3 {
                write!(f, "{} ", cell(row + 3 * col))?;
            }
            writeln!(f)?;
        }
        for row in 0..3 {
            for col in 0..12 {
                write!(f, "{} ", cell(9 + row + 3 * col))?;
            }
            writeln!(f)?;
        }
        for row in 0..3 {
            write!(f, "{:12}", "")?;
            for col in 0..3 {
                write!(f, "{} ", cell(45 + row + 3 * col))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Default for CubeState {
    fn default() -> Self {
        Self::solved()
    }
}

impl fmt::Debug for CubeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeState")
            .field("facelets", &self.facelets)
            .finish()
    }
}

impl fmt::Display for CubeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        CubeState::write_net(f, |index| {
            Facelet::from_raw(self.facelets[index]).home_color()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(text: &str) -> MoveSequence {
        text.parse().unwrap()
    }

    #[test]
    fn test_solved_state() {
        let cube = CubeState::solved();
        assert!(cube.is_solved());
        assert!(cube.centers_fixed());
        assert_eq!(cube.facelet_sum(), FACELET_CHECKSUM);
        assert_eq!(FACELET_CHECKSUM, 1431);
    }

    #[test]
    fn test_sexy_move_state() {
        let cube = CubeState::solved().applied(&moves("R U R' U'"));
        let expected: [u8; FACELET_COUNT] = [
            6, 1, 2, 7, 4, 5, 9, 25, 26, 36, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22,
            23, 51, 3, 24, 29, 39, 8, 28, 31, 32, 0, 34, 35, 42, 37, 38, 30, 40, 41, 33, 43, 44,
            45, 46, 47, 48, 49, 50, 27, 52, 53,
        ];
        assert_eq!(cube.as_array(), &expected);
        assert!(!cube.is_solved());
    }

    #[test]
    fn test_sexy_move_has_order_six() {
        let seq = moves("R U R' U'");
        let mut cube = CubeState::solved();
        for _ in 0..5 {
            cube.apply_sequence(&seq);
            assert!(!cube.is_solved());
        }
        cube.apply_sequence(&seq);
        assert!(cube.is_solved());
    }

    #[test]
    fn test_slice_equals_its_expansion() {
        let a = CubeState::solved().applied(&moves("M"));
        let b = CubeState::solved().applied(&moves("x' L' R"));
        assert_eq!(a, b);
        assert_eq!(a.as_array()[3], 41);
        assert_eq!(a.as_array()[39], 50);
        assert_eq!(a.as_array()[48], 21);
    }

    #[test]
    fn test_apply_index_rejects_illegal() {
        let mut cube = CubeState::solved();
        assert_eq!(cube.apply_index(7), Err(MoveError::IllegalIndex(7)));
        assert!(cube.is_solved());
        cube.apply_index(3).unwrap();
        assert_eq!(cube, CubeState::solved().applied(&moves("R")));
    }

    #[test]
    fn test_reset_orientation() {
        let mut cube = CubeState::solved().applied(&moves("R x y' U z2"));
        assert!(!cube.centers_fixed());
        let rotations = cube.reset_orientation();
        assert!(rotations.iter().all(|mv| mv.is_rotation()));
        assert!(cube.centers_fixed());
        assert_eq!(cube.orientation(), (CubeColor::White, CubeColor::Green));
    }

    #[test]
    fn test_from_facelets_validates() {
        let mut raw = *CubeState::solved().as_array();
        raw[0] = 1;
        assert!(CubeState::from_facelets(raw).is_err());
        raw[0] = 60;
        assert!(CubeState::from_facelets(raw).is_err());
    }

    #[test]
    fn test_display_net_layout() {
        let text = CubeState::solved().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert!(lines[0].trim_start().starts_with("Wh Wh Wh"));
        assert!(lines[3].starts_with("Or Or Or Gr Gr Gr Rd Rd Rd Bl Bl Bl"));
        assert!(lines[8].trim_start().starts_with("Ye"));
    }
}
