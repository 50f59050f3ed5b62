//! Match patterns: per-facelet color requirements with wildcards
//!
//! A [`Match`] assigns every facelet either a required color or
//! [`CubeColor::DontCare`]. Centers always carry their own face color. The
//! device can watch for a match and notify when the cube satisfies it.

use core::fmt;
use core::ops::{Add, Not, Sub};

use crate::cube::CubeState;
use crate::errors::{NotationError, PayloadError};
use crate::facelet::{CubeColor, Face, Facelet, FACELET_COUNT};

/// Packed size of a match on the wire: 48 non-center facelets at 3 bits each
pub const MATCH_BYTES: usize = 18;

// ----------------------------------------------------------------------------
// Builder Tables
// ----------------------------------------------------------------------------

/// Side facelets completing the cross around a face
fn cross_ring(face: Face) -> &'static [u8] {
    match face {
        Face::U => &[12, 21, 30, 39],
        Face::L => &[1, 19, 46, 43],
        Face::F => &[5, 28, 48, 16],
        Face::R => &[25, 52, 37, 7],
        Face::B => &[3, 34, 50, 10],
        Face::D => &[23, 32, 41, 14],
    }
}

/// Side facelets of the layer adjacent to a face
fn layer_ring(face: Face) -> &'static [u8] {
    match face {
        Face::U => &[9, 12, 15, 18, 21, 24, 27, 30, 33, 36, 39, 42],
        Face::L => &[0, 1, 2, 18, 19, 20, 45, 46, 47, 42, 43, 44],
        Face::F => &[2, 5, 8, 27, 28, 29, 51, 48, 45, 17, 16, 15],
        Face::R => &[6, 7, 8, 24, 25, 26, 51, 52, 53, 36, 37, 38],
        Face::B => &[33, 34, 35, 47, 50, 53, 0, 3, 6, 9, 10, 11],
        Face::D => &[20, 23, 26, 29, 32, 35, 38, 41, 44, 11, 14, 17],
    }
}

/// Middle-layer edge facelets added on top of a layer
fn middle_ring(face: Face) -> &'static [u8] {
    match face {
        Face::U => &[10, 16, 19, 25, 28, 34, 37, 43],
        Face::L | Face::R => &[3, 5, 21, 23, 48, 50, 39, 41],
        Face::F => &[1, 7, 30, 32, 52, 46, 14, 12],
        Face::B => &[30, 32, 1, 7, 46, 52, 12, 14],
        Face::D => &[19, 25, 28, 34, 37, 43, 10, 16],
    }
}

// ----------------------------------------------------------------------------
// Match
// ----------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Match {
    cells: [CubeColor; FACELET_COUNT],
}

impl Match {
    /// Empty match: every facelet is a wildcard except the centers
    pub fn new() -> Self {
        let mut pattern = Self {
            cells: [CubeColor::DontCare; FACELET_COUNT],
        };
        pattern.restore_centers();
        pattern
    }

    /// Fully solved cube
    pub fn solved_cube() -> Self {
        let mut pattern = Self::new();
        pattern.solved();
        pattern
    }

    /// Requires every non-center facelet to show what it shows in `state`
    pub fn from_state(state: &CubeState) -> Self {
        let mut pattern = Self {
            cells: [CubeColor::DontCare; FACELET_COUNT],
        };
        for facelet in Facelet::all() {
            pattern.cells[facelet.index()] = state.color_at(facelet);
        }
        pattern.restore_centers();
        pattern
    }

    /// A face letter selects that face with its adjacent ring; any longer
    /// name selects one cubie
    pub fn from_name(name: &str) -> Result<Self, NotationError> {
        let mut pattern = Self::new();
        if name.chars().count() == 1 {
            pattern.add_face(name.parse()?);
        } else {
            pattern.add_cubie(name)?;
        }
        Ok(pattern)
    }

    pub fn cells(&self) -> &[CubeColor; FACELET_COUNT] {
        &self.cells
    }

    pub fn get(&self, facelet: Facelet) -> CubeColor {
        self.cells[facelet.index()]
    }

    pub fn is_fixed(&self, facelet: Facelet) -> bool {
        !self.get(facelet).is_dont_care()
    }

    /// Number of facelets carrying a color requirement, centers included
    pub fn fixed_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_dont_care()).count()
    }

    pub fn clear(&mut self) -> &mut Self {
        self.cells = [CubeColor::DontCare; FACELET_COUNT];
        self.restore_centers();
        self
    }

    pub fn solved(&mut self) -> &mut Self {
        for facelet in Facelet::all() {
            self.cells[facelet.index()] = facelet.home_color();
        }
        self
    }

    pub fn restore_centers(&mut self) -> &mut Self {
        for face in Face::ALL {
            self.cells[face.center().index()] = face.home_color();
        }
        self
    }

    pub fn add_facelet(&mut self, name: &str) -> Result<&mut Self, NotationError> {
        let facelet = Facelet::from_name(name)?;
        self.fix(facelet.index());
        Ok(self)
    }

    pub fn add_cubie(&mut self, name: &str) -> Result<&mut Self, NotationError> {
        let facelet = Facelet::from_name(name)?;
        for member in facelet.cubie() {
            self.fix(member.index());
        }
        Ok(self)
    }

    pub fn add_face_color(&mut self, face: Face) -> &mut Self {
        for facelet in face.facelets() {
            self.fix(facelet.index());
        }
        self
    }

    /// The face plus the adjacent facelets of its layer
    pub fn add_face(&mut self, face: Face) -> &mut Self {
        self.add_face_color(face);
        self.fix_all(layer_ring(face))
    }

    pub fn add_cross_color(&mut self, face: Face) -> &mut Self {
        let base = face.index() * 9;
        for offset in [1, 3, 5, 7] {
            self.fix(base + offset);
        }
        self
    }

    pub fn add_cross(&mut self, face: Face) -> &mut Self {
        self.add_cross_color(face);
        self.fix_all(cross_ring(face))
    }

    pub fn add_layer(&mut self, face: Face) -> &mut Self {
        self.add_face(face)
    }

    pub fn add_two_layer(&mut self, face: Face) -> &mut Self {
        self.add_layer(face);
        self.fix_all(middle_ring(face))
    }

    fn fix(&mut self, index: usize) {
        self.cells[index] = Facelet::from_raw(index as u8).home_color();
    }

    fn fix_all(&mut self, indices: &[u8]) -> &mut Self {
        for &index in indices {
            self.fix(usize::from(index));
        }
        self
    }

    /// True when every fixed facelet of the pattern shows the required color
    pub fn matches(&self, state: &CubeState) -> bool {
        self.mismatches(state).next().is_none()
    }

    /// Fixed facelets whose current color differs from the requirement
    pub fn mismatches<'a>(&'a self, state: &'a CubeState) -> impl Iterator<Item = Facelet> + 'a {
        Facelet::all().filter(move |&facelet| {
            let wanted = self.get(facelet);
            !wanted.is_dont_care() && state.color_at(facelet) != wanted
        })
    }

    // ------------------------------------------------------------------------
    // Wire Format
    // ------------------------------------------------------------------------

    /// Packs the 48 non-center facelets as a little-endian 3-bit stream
    pub fn encode(&self) -> [u8; MATCH_BYTES] {
        let mut out = [0u8; MATCH_BYTES];
        for (k, facelet) in Facelet::all().filter(|f| !f.is_center()).enumerate() {
            let code = self.get(facelet).code();
            let bit = k * 3;
            let (byte, shift) = (bit / 8, bit % 8);
            out[byte] |= code << shift;
            if shift > 5 {
                out[byte + 1] |= code >> (8 - shift);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < MATCH_BYTES {
            return Err(PayloadError::TooShort {
                field: "MatchState",
                expected: MATCH_BYTES,
                actual: bytes.len(),
            });
        }

        let mut pattern = Self::new();
        for (k, facelet) in Facelet::all().filter(|f| !f.is_center()).enumerate() {
            let bit = k * 3;
            let (byte, shift) = (bit / 8, bit % 8);
            let low = u16::from(bytes[byte]);
            let high = bytes.get(byte + 1).map_or(0, |&b| u16::from(b));
            let code = ((low | high << 8) >> shift) as u8 & 0x7;
            pattern.cells[facelet.index()] =
                CubeColor::from_code(code).ok_or(PayloadError::InvalidColorCode(code))?;
        }
        Ok(pattern)
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}

/// Union: fixed cells of the right side override the left
impl Add for Match {
    type Output = Match;

    fn add(mut self, rhs: Match) -> Match {
        for (cell, &other) in self.cells.iter_mut().zip(rhs.cells.iter()) {
            if !other.is_dont_care() {
                *cell = other;
            }
        }
        self
    }
}

/// Difference: cells fixed on the right become wildcards
impl Sub for Match {
    type Output = Match;

    fn sub(mut self, rhs: Match) -> Match {
        for (cell, &other) in self.cells.iter_mut().zip(rhs.cells.iter()) {
            if !other.is_dont_care() {
                *cell = CubeColor::DontCare;
            }
        }
        self.restore_centers();
        self
    }
}

/// Complement: wildcards take their home color and fixed cells become wildcards
impl Not for Match {
    type Output = Match;

    fn not(mut self) -> Match {
        for facelet in Facelet::all() {
            let cell = &mut self.cells[facelet.index()];
            *cell = if cell.is_dont_care() {
                facelet.home_color()
            } else {
                CubeColor::DontCare
            };
        }
        self.restore_centers();
        self
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: String = self
            .cells
            .iter()
            .map(|c| char::from(b'0' + c.code()))
            .collect();
        f.debug_tuple("Match").field(&codes).finish()
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        CubeState::write_net(f, |index| self.cells[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(pattern: &Match) -> Vec<usize> {
        Facelet::all()
            .filter(|&f| pattern.is_fixed(f))
            .map(|f| f.index())
            .collect()
    }

    #[test]
    fn test_new_pins_centers_only() {
        assert_eq!(fixed(&Match::new()), vec![4, 13, 22, 31, 40, 49]);
    }

    #[test]
    fn test_from_state_pins_centers_after_rotation() {
        let rotated = CubeState::solved().applied(&"x".parse().unwrap());
        let pattern = Match::from_state(&rotated);
        for face in Face::ALL {
            assert_eq!(pattern.get(face.center()), face.home_color());
        }
        let edge = Facelet::new(1).unwrap();
        assert_eq!(pattern.get(edge), rotated.color_at(edge));
        assert_eq!(pattern.fixed_count(), 54);
    }

    #[test]
    fn test_add_cross() {
        let mut pattern = Match::new();
        pattern.add_cross(Face::U);
        assert_eq!(
            fixed(&pattern),
            vec![1, 3, 4, 5, 7, 12, 13, 21, 22, 30, 31, 39, 40, 49]
        );
    }

    #[test]
    fn test_add_face() {
        let mut pattern = Match::new();
        pattern.add_face(Face::U);
        let mut expected: Vec<usize> = (0..9).collect();
        expected.extend([9, 12, 13, 15, 18, 21, 22, 24, 27, 30, 31, 33, 36, 39, 40, 42, 49]);
        assert_eq!(fixed(&pattern), expected);
    }

    #[test]
    fn test_add_cubie_and_facelet() {
        let mut pattern = Match::new();
        pattern.add_cubie("UFR").unwrap();
        pattern.add_facelet("DB").unwrap();
        for index in [8, 24, 27, 50] {
            assert!(pattern.is_fixed(Facelet::new(index).unwrap()));
        }
        assert!(!pattern.is_fixed(Facelet::new(41).unwrap()));
        assert!(pattern.add_cubie("UD").is_err());
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(
            Match::solved_cube().encode(),
            [0, 0, 0, 73, 146, 36, 146, 36, 73, 219, 182, 109, 36, 73, 146, 109, 219, 182]
        );
        let empty = Match::new().encode();
        for chunk in empty.chunks(3) {
            assert_eq!(chunk, &[182, 109, 219]);
        }
    }

    #[test]
    fn test_decode_inverts_encode() {
        let mut pattern = Match::new();
        pattern.add_two_layer(Face::D).add_cubie("ULB").unwrap();
        assert_eq!(Match::decode(&pattern.encode()).unwrap(), pattern);
        assert!(Match::decode(&[0u8; 17]).is_err());
        assert_eq!(
            Match::decode(&[0xff; 18]),
            Err(PayloadError::InvalidColorCode(7))
        );
    }

    #[test]
    fn test_matches_ignores_wildcards() {
        let state = CubeState::solved().applied(&"D".parse().unwrap());
        let mut top = Match::new();
        top.add_two_layer(Face::U);
        assert!(state.satisfies(&top));
        assert!(!state.satisfies(&Match::solved_cube()));
        assert!(CubeState::solved().satisfies(&Match::solved_cube()));
    }

    #[test]
    fn test_from_state() {
        let state = CubeState::solved().applied(&"R U".parse().unwrap());
        let pattern = Match::from_state(&state);
        assert!(state.satisfies(&pattern));
        assert!(!CubeState::solved().satisfies(&pattern));
    }

    #[test]
    fn test_algebra() {
        let mut cross = Match::new();
        cross.add_cross(Face::U);
        let mut face = Match::new();
        face.add_face(Face::U);

        assert_eq!(cross.clone() + cross.clone(), cross);
        assert_eq!(face.clone() - face.clone(), Match::new());
        assert_eq!(!!face.clone(), face);
        let ring_only = face.clone() - cross.clone();
        assert!(!ring_only.is_fixed(Facelet::new(5).unwrap()));
        assert!(ring_only.is_fixed(Facelet::new(0).unwrap()));
        assert!(ring_only.is_fixed(Facelet::new(4).unwrap()));
    }
}
