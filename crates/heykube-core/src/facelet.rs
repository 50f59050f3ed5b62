//! Faces, colors and sticker positions
//!
//! The 54 sticker positions are numbered face by face in the order U, L, F,
//! R, B, D. Within a face, index `3 * column + row` is used, so the center of
//! face `f` sits at `9 * f + 4`. A facelet's home color is `index / 9`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::NotationError;

/// Number of sticker positions on the cube
pub const FACELET_COUNT: usize = 54;

// ----------------------------------------------------------------------------
// Faces
// ----------------------------------------------------------------------------

/// The six faces in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    U = 0,
    L = 1,
    F = 2,
    R = 3,
    B = 4,
    D = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::U, Face::L, Face::F, Face::R, Face::B, Face::D];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Face> {
        Face::ALL.get(index).copied()
    }

    pub fn letter(self) -> char {
        match self {
            Face::U => 'U',
            Face::L => 'L',
            Face::F => 'F',
            Face::R => 'R',
            Face::B => 'B',
            Face::D => 'D',
        }
    }

    pub fn from_letter(letter: char) -> Option<Face> {
        match letter {
            'U' => Some(Face::U),
            'L' => Some(Face::L),
            'F' => Some(Face::F),
            'R' => Some(Face::R),
            'B' => Some(Face::B),
            'D' => Some(Face::D),
            _ => None,
        }
    }

    /// Center facelet of this face
    pub fn center(self) -> Facelet {
        Facelet(self as u8 * 9 + 4)
    }

    /// Color of this face on a solved cube in the default orientation
    pub fn home_color(self) -> CubeColor {
        CubeColor::SOLID[self.index()]
    }

    /// The nine facelets of this face
    pub fn facelets(self) -> impl Iterator<Item = Facelet> {
        let base = self as u8 * 9;
        (base..base + 9).map(Facelet)
    }
}

impl FromStr for Face {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                Face::from_letter(letter).ok_or_else(|| NotationError::UnknownFace(s.to_string()))
            }
            _ => Err(NotationError::UnknownFace(s.to_string())),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

// ----------------------------------------------------------------------------
// Colors
// ----------------------------------------------------------------------------

/// Sticker colors, plus the `DontCare` wildcard used by match patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CubeColor {
    White = 0,
    Orange = 1,
    Green = 2,
    Red = 3,
    Blue = 4,
    Yellow = 5,
    DontCare = 6,
}

impl CubeColor {
    /// Solid colors in face order
    pub const SOLID: [CubeColor; 6] = [
        CubeColor::White,
        CubeColor::Orange,
        CubeColor::Green,
        CubeColor::Red,
        CubeColor::Blue,
        CubeColor::Yellow,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<CubeColor> {
        match code {
            0..=5 => Some(CubeColor::SOLID[code as usize]),
            6 => Some(CubeColor::DontCare),
            _ => None,
        }
    }

    pub fn is_dont_care(self) -> bool {
        self == CubeColor::DontCare
    }

    /// Two-letter label used in the cube net
    pub fn abbreviation(self) -> &'static str {
        match self {
            CubeColor::White => "Wh",
            CubeColor::Orange => "Or",
            CubeColor::Green => "Gr",
            CubeColor::Red => "Rd",
            CubeColor::Blue => "Bl",
            CubeColor::Yellow => "Ye",
            CubeColor::DontCare => "--",
        }
    }
}

impl fmt::Display for CubeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

// ----------------------------------------------------------------------------
// Facelets
// ----------------------------------------------------------------------------

/// Sticker position in `[0, 54)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Facelet(u8);

const FACELET_NAMES: [&str; FACELET_COUNT] = [
    "ULB", "UL", "ULF", "UB", "U", "UF", "URB", "UR", "UFR", //
    "LUB", "LB", "LBD", "LU", "L", "LD", "LUF", "LF", "LFD", //
    "FUL", "FL", "FLD", "FU", "F", "FD", "FUR", "FR", "FRD", //
    "RUF", "RF", "RFD", "RU", "R", "RD", "RUB", "RB", "RBD", //
    "BUR", "BR", "BRD", "BU", "B", "BD", "BUL", "BL", "BLD", //
    "DLF", "DL", "DLB", "DF", "D", "DB", "DFR", "DR", "DRB",
];

/// Facelet pairs of the twelve edge cubies, in codec order
pub(crate) const EDGE_PAIRS: [[u8; 2]; 12] = [
    [5, 21],
    [7, 30],
    [3, 39],
    [1, 12],
    [48, 23],
    [52, 32],
    [50, 41],
    [46, 14],
    [25, 28],
    [19, 16],
    [37, 34],
    [43, 10],
];

/// Facelet triples of the eight corner cubies, in codec order
pub(crate) const CORNER_SETS: [[u8; 3]; 8] = [
    [8, 24, 27],
    [6, 33, 36],
    [0, 42, 9],
    [2, 15, 18],
    [51, 29, 26],
    [45, 20, 17],
    [47, 11, 44],
    [53, 38, 35],
];

impl Facelet {
    pub fn new(index: u8) -> Option<Facelet> {
        (usize::from(index) < FACELET_COUNT).then_some(Facelet(index))
    }

    /// Callers guarantee `index < 54`
    pub(crate) const fn from_raw(index: u8) -> Facelet {
        Facelet(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Facelet> {
        (0..FACELET_COUNT as u8).map(Facelet)
    }

    pub fn face(self) -> Face {
        match self.0 / 9 {
            0 => Face::U,
            1 => Face::L,
            2 => Face::F,
            3 => Face::R,
            4 => Face::B,
            _ => Face::D,
        }
    }

    /// Color this facelet shows on a solved cube
    pub fn home_color(self) -> CubeColor {
        self.face().home_color()
    }

    pub fn is_center(self) -> bool {
        self.0 % 9 == 4
    }

    /// Location name, e.g. `UFR`
    pub fn name(self) -> &'static str {
        FACELET_NAMES[self.index()]
    }

    /// Looks up a facelet by location name
    ///
    /// Corner names may list their two side faces in either order, so
    /// `URF` and `UFR` name the same facelet.
    pub fn from_name(name: &str) -> Result<Facelet, NotationError> {
        let canonical = canonical_name(name)
            .ok_or_else(|| NotationError::UnknownFacelet(name.to_string()))?;
        FACELET_NAMES
            .iter()
            .position(|candidate| *candidate == canonical.as_str())
            .map(|index| Facelet(index as u8))
            .ok_or_else(|| NotationError::UnknownFacelet(name.to_string()))
    }

    /// All facelets on the same physical cubie, starting with this one
    pub fn cubie(self) -> SmallVec<[Facelet; 3]> {
        let faces: SmallVec<[Face; 3]> = self
            .name()
            .chars()
            .filter_map(Face::from_letter)
            .collect();

        let mut cubie = SmallVec::new();
        for shift in 0..faces.len() {
            let rotated: String = (0..faces.len())
                .map(|k| faces[(shift + k) % faces.len()].letter())
                .collect();
            if let Ok(facelet) = Facelet::from_name(&rotated) {
                cubie.push(facelet);
            }
        }
        cubie
    }
}

/// Puts the second and third letters of a corner name into face order
fn canonical_name(name: &str) -> Option<String> {
    let faces: SmallVec<[Face; 3]> = name
        .chars()
        .map(Face::from_letter)
        .collect::<Option<_>>()?;
    let mut faces = faces;
    if faces.len() == 3 && faces[1] > faces[2] {
        faces.swap(1, 2);
    }
    Some(faces.iter().map(|face| face.letter()).collect())
}

impl TryFrom<u8> for Facelet {
    type Error = NotationError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Facelet::new(index).ok_or_else(|| NotationError::UnknownFacelet(index.to_string()))
    }
}

impl From<Facelet> for u8 {
    fn from(facelet: Facelet) -> u8 {
        facelet.0
    }
}

impl FromStr for Facelet {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facelet::from_name(s)
    }
}

impl fmt::Display for Facelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centers_and_faces() {
        for face in Face::ALL {
            let center = face.center();
            assert!(center.is_center());
            assert_eq!(center.face(), face);
            assert_eq!(center.name().len(), 1);
        }
    }

    #[test]
    fn test_corner_names_are_order_insensitive() {
        assert_eq!(Facelet::from_name("UFR").unwrap().index(), 8);
        assert_eq!(Facelet::from_name("URF").unwrap().index(), 8);
        assert_eq!(Facelet::from_name("DRB").unwrap().index(), 53);
        assert_eq!(Facelet::from_name("DBR").unwrap().index(), 53);
        assert!(Facelet::from_name("UD").is_err());
        assert!(Facelet::from_name("Q").is_err());
    }

    #[test]
    fn test_cubie_groups() {
        let edge = Facelet::from_name("UF").unwrap().cubie();
        assert_eq!(edge.iter().map(|f| f.index()).collect::<Vec<_>>(), vec![5, 21]);

        let corner = Facelet::from_name("UFR").unwrap().cubie();
        assert_eq!(
            corner.iter().map(|f| f.index()).collect::<Vec<_>>(),
            vec![8, 24, 27]
        );

        assert_eq!(Face::U.center().cubie().len(), 1);
    }

    #[test]
    fn test_cubie_tables_agree_with_names() {
        for pair in EDGE_PAIRS {
            let cubie = Facelet(pair[0]).cubie();
            assert_eq!(cubie[1].index(), pair[1] as usize);
        }
        for set in CORNER_SETS {
            let cubie = Facelet(set[0]).cubie();
            let mut found: Vec<_> = cubie.iter().map(|f| f.index()).collect();
            let mut expected: Vec<_> = set.iter().map(|&i| i as usize).collect();
            found.sort_unstable();
            expected.sort_unstable();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_face_parse() {
        assert_eq!("R".parse::<Face>().unwrap(), Face::R);
        assert!(matches!("X".parse::<Face>(), Err(NotationError::UnknownFace(_))));
        assert!("RU".parse::<Face>().is_err());
    }
}
