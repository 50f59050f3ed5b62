//! Facelet permutation table for the elementary moves
//!
//! Row `r` describes one move: after applying it, position `i` holds the
//! piece that was at position `ROTATION_TABLE[r][i]`. Rows are ordered
//! U L F R B D, then U' L' F' R' B' D', then x y z, then x' y' z'.

use crate::facelet::FACELET_COUNT;

pub(crate) static ROTATION_TABLE: [[u8; FACELET_COUNT]; 18] = [
    // U
    [ 2,  5,  8,  1,  4,  7,  0,  3,  6, 18, 10, 11, 21, 13, 14, 24, 16, 17, 27, 19, 20, 30, 22, 23, 33, 25, 26, 36, 28, 29, 39, 31, 32, 42, 34, 35,  9, 37, 38, 12, 40, 41, 15, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53],
    // L
    [44, 43, 42,  3,  4,  5,  6,  7,  8, 11, 14, 17, 10, 13, 16,  9, 12, 15,  0,  1,  2, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 47, 46, 45, 18, 19, 20, 48, 49, 50, 51, 52, 53],
    // F
    [ 0,  1, 17,  3,  4, 16,  6,  7, 15,  9, 10, 11, 12, 13, 14, 45, 48, 51, 20, 23, 26, 19, 22, 25, 18, 21, 24,  2,  5,  8, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 29, 46, 47, 28, 49, 50, 27, 52, 53],
    // R
    [ 0,  1,  2,  3,  4,  5, 24, 25, 26,  9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 51, 52, 53, 29, 32, 35, 28, 31, 34, 27, 30, 33,  8,  7,  6, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 38, 37, 36],
    // B
    [33,  1,  2, 34,  4,  5, 35,  7,  8,  6,  3,  0, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 53, 50, 47, 38, 41, 44, 37, 40, 43, 36, 39, 42, 45, 46,  9, 48, 49, 10, 51, 52, 11],
    // D
    [ 0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 38, 12, 13, 41, 15, 16, 44, 18, 19, 11, 21, 22, 14, 24, 25, 17, 27, 28, 20, 30, 31, 23, 33, 34, 26, 36, 37, 29, 39, 40, 32, 42, 43, 35, 47, 50, 53, 46, 49, 52, 45, 48, 51],
    // U'
    [ 6,  3,  0,  7,  4,  1,  8,  5,  2, 36, 10, 11, 39, 13, 14, 42, 16, 17,  9, 19, 20, 12, 22, 23, 15, 25, 26, 18, 28, 29, 21, 31, 32, 24, 34, 35, 27, 37, 38, 30, 40, 41, 33, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53],
    // L'
    [18, 19, 20,  3,  4,  5,  6,  7,  8, 15, 12,  9, 16, 13, 10, 17, 14, 11, 45, 46, 47, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41,  2,  1,  0, 44, 43, 42, 48, 49, 50, 51, 52, 53],
    // F'
    [ 0,  1, 27,  3,  4, 28,  6,  7, 29,  9, 10, 11, 12, 13, 14,  8,  5,  2, 24, 21, 18, 25, 22, 19, 26, 23, 20, 51, 48, 45, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 15, 46, 47, 16, 49, 50, 17, 52, 53],
    // R'
    [ 0,  1,  2,  3,  4,  5, 38, 37, 36,  9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,  6,  7,  8, 33, 30, 27, 34, 31, 28, 35, 32, 29, 53, 52, 51, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 24, 25, 26],
    // B'
    [11,  1,  2, 10,  4,  5,  9,  7,  8, 47, 50, 53, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32,  0,  3,  6, 42, 39, 36, 43, 40, 37, 44, 41, 38, 45, 46, 35, 48, 49, 34, 51, 52, 33],
    // D'
    [ 0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 20, 12, 13, 23, 15, 16, 26, 18, 19, 29, 21, 22, 32, 24, 25, 35, 27, 28, 38, 30, 31, 41, 33, 34, 44, 36, 37, 11, 39, 40, 14, 42, 43, 17, 51, 48, 45, 52, 49, 46, 53, 50, 47],
    // x
    [18, 19, 20, 21, 22, 23, 24, 25, 26, 15, 12,  9, 16, 13, 10, 17, 14, 11, 45, 46, 47, 48, 49, 50, 51, 52, 53, 29, 32, 35, 28, 31, 34, 27, 30, 33,  8,  7,  6,  5,  4,  3,  2,  1,  0, 44, 43, 42, 41, 40, 39, 38, 37, 36],
    // y
    [ 2,  5,  8,  1,  4,  7,  0,  3,  6, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44,  9, 10, 11, 12, 13, 14, 15, 16, 17, 51, 48, 45, 52, 49, 46, 53, 50, 47],
    // z
    [11, 14, 17, 10, 13, 16,  9, 12, 15, 47, 50, 53, 46, 49, 52, 45, 48, 51, 20, 23, 26, 19, 22, 25, 18, 21, 24,  2,  5,  8,  1,  4,  7,  0,  3,  6, 42, 39, 36, 43, 40, 37, 44, 41, 38, 29, 32, 35, 28, 31, 34, 27, 30, 33],
    // x'
    [44, 43, 42, 41, 40, 39, 38, 37, 36, 11, 14, 17, 10, 13, 16,  9, 12, 15,  0,  1,  2,  3,  4,  5,  6,  7,  8, 33, 30, 27, 34, 31, 28, 35, 32, 29, 53, 52, 51, 50, 49, 48, 47, 46, 45, 18, 19, 20, 21, 22, 23, 24, 25, 26],
    // y'
    [ 6,  3,  0,  7,  4,  1,  8,  5,  2, 36, 37, 38, 39, 40, 41, 42, 43, 44,  9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 47, 50, 53, 46, 49, 52, 45, 48, 51],
    // z'
    [33, 30, 27, 34, 31, 28, 35, 32, 29,  6,  3,  0,  7,  4,  1,  8,  5,  2, 24, 21, 18, 25, 22, 19, 26, 23, 20, 51, 48, 45, 52, 49, 46, 53, 50, 47, 38, 41, 44, 37, 40, 43, 36, 39, 42, 15, 12,  9, 16, 13, 10, 17, 14, 11],
];
