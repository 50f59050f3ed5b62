//! Elementary moves, move sequences and the notation parser
//!
//! Every move the cube understands is one of 18 elementary moves: the six
//! clockwise face turns, their inverses, and the whole-cube rotations
//! `x y z` with their inverses. Wider notation (double layers, slices,
//! repeat counts, parenthesised groups) is expanded into elementary moves
//! while parsing.

use core::fmt;
use core::ops::{Add, AddAssign};
use core::str::FromStr;

use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use tracing::warn;

use crate::errors::{MoveError, NotationError};
use crate::facelet::{Face, FACELET_COUNT};
use crate::tables::ROTATION_TABLE;

/// Bit that turns a clockwise move index into its counter-clockwise partner
pub const INVERSE_BIT: u8 = 0x08;

// ----------------------------------------------------------------------------
// Elementary Moves
// ----------------------------------------------------------------------------

/// One of the 18 elementary moves, carrying its wire index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Move {
    U = 0,
    L = 1,
    F = 2,
    R = 3,
    B = 4,
    D = 5,
    UPrime = 8,
    LPrime = 9,
    FPrime = 10,
    RPrime = 11,
    BPrime = 12,
    DPrime = 13,
    X = 16,
    Y = 17,
    Z = 18,
    XPrime = 24,
    YPrime = 25,
    ZPrime = 26,
}

impl Move {
    pub const ALL: [Move; 18] = [
        Move::U,
        Move::L,
        Move::F,
        Move::R,
        Move::B,
        Move::D,
        Move::UPrime,
        Move::LPrime,
        Move::FPrime,
        Move::RPrime,
        Move::BPrime,
        Move::DPrime,
        Move::X,
        Move::Y,
        Move::Z,
        Move::XPrime,
        Move::YPrime,
        Move::ZPrime,
    ];

    /// The twelve face turns, the only moves the device reports
    pub const FACE_TURNS: [Move; 12] = [
        Move::U,
        Move::L,
        Move::F,
        Move::R,
        Move::B,
        Move::D,
        Move::UPrime,
        Move::LPrime,
        Move::FPrime,
        Move::RPrime,
        Move::BPrime,
        Move::DPrime,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Result<Move, MoveError> {
        let mv = match index {
            0 => Move::U,
            1 => Move::L,
            2 => Move::F,
            3 => Move::R,
            4 => Move::B,
            5 => Move::D,
            8 => Move::UPrime,
            9 => Move::LPrime,
            10 => Move::FPrime,
            11 => Move::RPrime,
            12 => Move::BPrime,
            13 => Move::DPrime,
            16 => Move::X,
            17 => Move::Y,
            18 => Move::Z,
            24 => Move::XPrime,
            25 => Move::YPrime,
            26 => Move::ZPrime,
            other => return Err(MoveError::IllegalIndex(other)),
        };
        Ok(mv)
    }

    pub fn inverse(self) -> Move {
        match self {
            Move::U => Move::UPrime,
            Move::L => Move::LPrime,
            Move::F => Move::FPrime,
            Move::R => Move::RPrime,
            Move::B => Move::BPrime,
            Move::D => Move::DPrime,
            Move::UPrime => Move::U,
            Move::LPrime => Move::L,
            Move::FPrime => Move::F,
            Move::RPrime => Move::R,
            Move::BPrime => Move::B,
            Move::DPrime => Move::D,
            Move::X => Move::XPrime,
            Move::Y => Move::YPrime,
            Move::Z => Move::ZPrime,
            Move::XPrime => Move::X,
            Move::YPrime => Move::Y,
            Move::ZPrime => Move::Z,
        }
    }

    pub fn is_clockwise(self) -> bool {
        self.index() & INVERSE_BIT == 0
    }

    pub fn is_rotation(self) -> bool {
        self.index() & 0x10 != 0
    }

    /// Face turned by this move, `None` for whole-cube rotations
    pub fn face(self) -> Option<Face> {
        if self.is_rotation() {
            None
        } else {
            Face::from_index(usize::from(self.index() & 0x7))
        }
    }

    pub fn face_turn(face: Face, clockwise: bool) -> Move {
        let turn = match face {
            Face::U => Move::U,
            Face::L => Move::L,
            Face::F => Move::F,
            Face::R => Move::R,
            Face::B => Move::B,
            Face::D => Move::D,
        };
        if clockwise {
            turn
        } else {
            turn.inverse()
        }
    }

    pub fn notation(self) -> &'static str {
        match self {
            Move::U => "U",
            Move::L => "L",
            Move::F => "F",
            Move::R => "R",
            Move::B => "B",
            Move::D => "D",
            Move::UPrime => "U'",
            Move::LPrime => "L'",
            Move::FPrime => "F'",
            Move::RPrime => "R'",
            Move::BPrime => "B'",
            Move::DPrime => "D'",
            Move::X => "x",
            Move::Y => "y",
            Move::Z => "z",
            Move::XPrime => "x'",
            Move::YPrime => "y'",
            Move::ZPrime => "z'",
        }
    }

    /// Facelet permutation applied by this move
    pub fn permutation(self) -> &'static [u8; FACELET_COUNT] {
        &ROTATION_TABLE[self.table_row()]
    }

    fn table_row(self) -> usize {
        let index = usize::from(self.index());
        match index {
            0..=5 => index,
            8..=13 => index - 2,
            16..=18 => index - 4,
            _ => index - 9,
        }
    }

    /// 4-bit encoding used by the move history, instructions and moves log
    pub fn wire_nibble(self) -> Result<u8, MoveError> {
        if self.is_rotation() {
            Err(MoveError::NotWireEncodable(self.notation()))
        } else {
            Ok(self.index())
        }
    }
}

impl TryFrom<u8> for Move {
    type Error = MoveError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Move::from_index(index)
    }
}

impl From<Move> for u8 {
    fn from(mv: Move) -> u8 {
        mv.index()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

// ----------------------------------------------------------------------------
// Move Sequences
// ----------------------------------------------------------------------------

/// Ordered list of elementary moves
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveSequence {
    moves: Vec<Move>,
}

/// Result of lenient parsing: the moves that were understood plus every
/// token that had to be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMoves {
    pub moves: MoveSequence,
    pub skipped: Vec<NotationError>,
}

impl MoveSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_moves(moves: Vec<Move>) -> Self {
        Self { moves }
    }

    pub fn from_indices(indices: &[u8]) -> Result<Self, MoveError> {
        indices
            .iter()
            .map(|&index| Move::from_index(index))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from_moves)
    }

    /// Parses notation, skipping unrecognized tokens
    ///
    /// Skipped tokens are logged and reported in [`ParsedMoves::skipped`].
    pub fn parse(text: &str) -> ParsedMoves {
        let mut parsed = ParsedMoves::default();
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let expanded = expand_groups(&chars, &mut parsed.skipped);
        tokenize(&expanded, &mut parsed.moves, &mut parsed.skipped);
        parsed
    }

    /// Parses notation, failing on the first token that is not understood
    pub fn parse_strict(text: &str) -> Result<Self, NotationError> {
        let parsed = Self::parse(text);
        match parsed.skipped.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(parsed.moves),
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Move> {
        self.moves.iter()
    }

    pub fn push(&mut self, mv: Move) {
        self.moves.push(mv);
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    pub fn indices(&self) -> Vec<u8> {
        self.moves.iter().map(|mv| mv.index()).collect()
    }

    /// The sequence that undoes this one
    pub fn reversed(&self) -> MoveSequence {
        self.moves.iter().rev().map(|mv| mv.inverse()).collect()
    }

    /// The last `count` moves (all of them if `count` exceeds the length)
    pub fn tail(&self, count: usize) -> MoveSequence {
        let start = self.moves.len().saturating_sub(count);
        Self::from_moves(self.moves[start..].to_vec())
    }

    /// Random face turns where no move immediately undoes its predecessor
    pub fn scramble<R: RngCore>(count: usize, rng: &mut R) -> MoveSequence {
        let mut moves = Vec::with_capacity(count);
        let mut undo: Option<Move> = None;
        while moves.len() < count {
            let candidate = Move::FACE_TURNS[rng.next_u32() as usize % Move::FACE_TURNS.len()];
            if Some(candidate) == undo {
                continue;
            }
            undo = Some(candidate.inverse());
            moves.push(candidate);
        }
        Self::from_moves(moves)
    }

    /// Gesture that unlocks the built-in patterns on the device
    pub fn pattern_enable() -> MoveSequence {
        use Move::*;
        Self::from_moves(vec![LPrime, LPrime, DPrime, DPrime, D, D, L, L])
    }

    /// Gesture that toggles the on-device hints
    pub fn hints_toggle() -> MoveSequence {
        use Move::*;
        Self::from_moves(vec![R, R, D, D, DPrime, DPrime, RPrime, RPrime])
    }
}

impl FromStr for MoveSequence {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(s)
    }
}

impl fmt::Display for MoveSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mv) in self.moves.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", mv)?;
        }
        Ok(())
    }
}

impl From<Vec<Move>> for MoveSequence {
    fn from(moves: Vec<Move>) -> Self {
        Self::from_moves(moves)
    }
}

impl FromIterator<Move> for MoveSequence {
    fn from_iter<I: IntoIterator<Item = Move>>(iter: I) -> Self {
        Self::from_moves(iter.into_iter().collect())
    }
}

impl Extend<Move> for MoveSequence {
    fn extend<I: IntoIterator<Item = Move>>(&mut self, iter: I) {
        self.moves.extend(iter);
    }
}

impl IntoIterator for MoveSequence {
    type Item = Move;
    type IntoIter = std::vec::IntoIter<Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.into_iter()
    }
}

impl<'a> IntoIterator for &'a MoveSequence {
    type Item = &'a Move;
    type IntoIter = core::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

impl Add for MoveSequence {
    type Output = MoveSequence;

    fn add(mut self, rhs: MoveSequence) -> MoveSequence {
        self.moves.extend(rhs.moves);
        self
    }
}

impl AddAssign for MoveSequence {
    fn add_assign(&mut self, rhs: MoveSequence) {
        self.moves.extend(rhs.moves);
    }
}

// ----------------------------------------------------------------------------
// Notation Parsing
// ----------------------------------------------------------------------------

/// Notation letters before modifiers are applied
#[derive(Debug, Clone, Copy)]
enum Token {
    Face(Face),
    Rotation(Move),
    Wide(Face),
    Slice(char),
}

impl Token {
    fn from_char(c: char) -> Option<Token> {
        if let Some(face) = Face::from_letter(c) {
            return Some(Token::Face(face));
        }
        match c {
            'x' => Some(Token::Rotation(Move::X)),
            'y' => Some(Token::Rotation(Move::Y)),
            'z' => Some(Token::Rotation(Move::Z)),
            'M' | 'E' | 'S' => Some(Token::Slice(c)),
            _ => c
                .to_uppercase()
                .next()
                .filter(|upper| c.is_lowercase() && *upper != c)
                .and_then(Face::from_letter)
                .map(Token::Wide),
        }
    }

    /// Elementary moves for one clockwise turn of this token
    fn expand(self) -> SmallVec<[Move; 3]> {
        use Move::*;
        match self {
            Token::Face(face) => smallvec![Move::face_turn(face, true)],
            Token::Rotation(mv) => smallvec![mv],
            Token::Wide(face) => match face {
                Face::U => smallvec![D, Y],
                Face::L => smallvec![R, XPrime],
                Face::F => smallvec![B, Z],
                Face::R => smallvec![L, X],
                Face::B => smallvec![F, ZPrime],
                Face::D => smallvec![U, YPrime],
            },
            Token::Slice('M') => smallvec![XPrime, LPrime, R],
            Token::Slice('E') => smallvec![YPrime, U, DPrime],
            Token::Slice(_) => smallvec![Z, FPrime, B],
        }
    }
}

fn repeat_count(c: char) -> Option<usize> {
    match c {
        '2' => Some(2),
        '3' => Some(3),
        _ => None,
    }
}

/// Replaces every `( ... )` group, optionally followed by a repeat digit,
/// with its repeated contents
fn expand_groups(input: &[(usize, char)], skipped: &mut Vec<NotationError>) -> Vec<(usize, char)> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let (offset, c) = input[i];
        match c {
            '(' => {
                let mut depth = 0usize;
                let mut close = None;
                for (j, &(_, cj)) in input.iter().enumerate().skip(i) {
                    match cj {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }

                let Some(close) = close else {
                    warn!(offset, "Skipping unbalanced '(' in move notation");
                    skipped.push(NotationError::UnbalancedGroup { offset });
                    i += 1;
                    continue;
                };

                let inner = expand_groups(&input[i + 1..close], skipped);
                let mut next = close + 1;
                let mut repeat = 1;
                if let Some(count) = input.get(next).and_then(|&(_, d)| repeat_count(d)) {
                    repeat = count;
                    next += 1;
                }
                for _ in 0..repeat {
                    out.extend_from_slice(&inner);
                    out.push((offset, ' '));
                }
                i = next;
            }
            ')' => {
                warn!(offset, "Skipping unbalanced ')' in move notation");
                skipped.push(NotationError::UnbalancedGroup { offset });
                i += 1;
            }
            _ => {
                out.push((offset, c));
                i += 1;
            }
        }
    }
    out
}

fn tokenize(stream: &[(usize, char)], out: &mut MoveSequence, skipped: &mut Vec<NotationError>) {
    let mut i = 0;
    while i < stream.len() {
        let (offset, c) = stream[i];
        i += 1;
        if c.is_whitespace() {
            continue;
        }

        let Some(token) = Token::from_char(c) else {
            warn!(token = %c, offset, "Skipping unrecognized move token");
            skipped.push(NotationError::UnknownToken { token: c, offset });
            continue;
        };

        // A repeat digit and a prime may follow in either order
        let mut repeat = 1;
        let mut prime = false;
        while let Some(&(_, next)) = stream.get(i) {
            if next == '\'' && !prime {
                prime = true;
            } else if let Some(count) = repeat_count(next).filter(|_| repeat == 1) {
                repeat = count;
            } else {
                break;
            }
            i += 1;
        }

        let turn = token.expand();
        for _ in 0..repeat {
            if prime {
                out.extend(turn.iter().map(|mv| mv.inverse()));
            } else {
                out.extend(turn.iter().copied());
            }
        }
    }
}
