//! Keypad matrix decode table
//!
//! The keypad controller scans an 8 × 11 matrix and reports (row, column)
//! pairs. The table here turns those into logical key codes for the generic
//! keypad driver. Unused matrix positions hold [`KeyCode::NONE`].

use alloc::vec::Vec;
use core::fmt;

use crate::{BringupError, Result};

/// Rows scanned by the keypad controller
pub const KEYPAD_ROWS: usize = 8;
/// Columns scanned by the keypad controller
pub const KEYPAD_COLS: usize = 11;

/// Logical key code as understood by the input layer
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyCode(u16);

impl KeyCode {
    /// No key at this matrix position
    pub const NONE: KeyCode = KeyCode(0);
    /// Highest code the input layer accepts
    pub const MAX: KeyCode = KeyCode(0x2ff);

    pub const ESC: KeyCode = KeyCode(1);
    pub const KEY_1: KeyCode = KeyCode(2);
    pub const KEY_2: KeyCode = KeyCode(3);
    pub const KEY_3: KeyCode = KeyCode(4);
    pub const KEY_4: KeyCode = KeyCode(5);
    pub const KEY_5: KeyCode = KeyCode(6);
    pub const KEY_6: KeyCode = KeyCode(7);
    pub const KEY_7: KeyCode = KeyCode(8);
    pub const KEY_8: KeyCode = KeyCode(9);
    pub const KEY_9: KeyCode = KeyCode(10);
    pub const KEY_0: KeyCode = KeyCode(11);
    pub const MINUS: KeyCode = KeyCode(12);
    pub const EQUAL: KeyCode = KeyCode(13);
    pub const BACKSPACE: KeyCode = KeyCode(14);
    pub const TAB: KeyCode = KeyCode(15);
    pub const Q: KeyCode = KeyCode(16);
    pub const W: KeyCode = KeyCode(17);
    pub const E: KeyCode = KeyCode(18);
    pub const R: KeyCode = KeyCode(19);
    pub const T: KeyCode = KeyCode(20);
    pub const Y: KeyCode = KeyCode(21);
    pub const U: KeyCode = KeyCode(22);
    pub const I: KeyCode = KeyCode(23);
    pub const O: KeyCode = KeyCode(24);
    pub const P: KeyCode = KeyCode(25);
    pub const LEFTBRACE: KeyCode = KeyCode(26);
    pub const RIGHTBRACE: KeyCode = KeyCode(27);
    pub const ENTER: KeyCode = KeyCode(28);
    pub const LEFTCTRL: KeyCode = KeyCode(29);
    pub const A: KeyCode = KeyCode(30);
    pub const S: KeyCode = KeyCode(31);
    pub const D: KeyCode = KeyCode(32);
    pub const F: KeyCode = KeyCode(33);
    pub const G: KeyCode = KeyCode(34);
    pub const H: KeyCode = KeyCode(35);
    pub const J: KeyCode = KeyCode(36);
    pub const K: KeyCode = KeyCode(37);
    pub const L: KeyCode = KeyCode(38);
    pub const SEMICOLON: KeyCode = KeyCode(39);
    pub const APOSTROPHE: KeyCode = KeyCode(40);
    pub const LEFTSHIFT: KeyCode = KeyCode(42);
    pub const Z: KeyCode = KeyCode(44);
    pub const X: KeyCode = KeyCode(45);
    pub const C: KeyCode = KeyCode(46);
    pub const V: KeyCode = KeyCode(47);
    pub const B: KeyCode = KeyCode(48);
    pub const N: KeyCode = KeyCode(49);
    pub const M: KeyCode = KeyCode(50);
    pub const COMMA: KeyCode = KeyCode(51);
    pub const DOT: KeyCode = KeyCode(52);
    pub const SLASH: KeyCode = KeyCode(53);
    pub const KPASTERISK: KeyCode = KeyCode(55);
    pub const SPACE: KeyCode = KeyCode(57);
    pub const CAPSLOCK: KeyCode = KeyCode(58);
    pub const KPMINUS: KeyCode = KeyCode(74);
    pub const KPPLUS: KeyCode = KeyCode(78);
    pub const HOME: KeyCode = KeyCode(102);
    pub const UP: KeyCode = KeyCode(103);
    pub const LEFT: KeyCode = KeyCode(105);
    pub const RIGHT: KeyCode = KeyCode(106);
    pub const DOWN: KeyCode = KeyCode(108);
    pub const DELETE: KeyCode = KeyCode(111);
    pub const MENU: KeyCode = KeyCode(139);
    pub const QUESTION: KeyCode = KeyCode(214);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// A real key code the input layer will accept
    pub fn is_valid(self) -> bool {
        self.0 != 0 && self <= Self::MAX
    }
}

impl fmt::Debug for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "KeyCode(NONE)")
        } else {
            write!(f, "KeyCode({})", self.0)
        }
    }
}

/// Fixed-shape rows × cols decode table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadMap {
    rows: usize,
    cols: usize,
    cells: Vec<KeyCode>,
}

impl KeypadMap {
    /// Build a map from row-major cells
    ///
    /// # Errors
    /// `InvalidKeymap` if the shape is empty, the cell count does not match
    /// the shape, or a cell is neither a valid code nor [`KeyCode::NONE`].
    pub fn new(rows: usize, cols: usize, cells: Vec<KeyCode>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(BringupError::InvalidKeymap(alloc::format!(
                "empty shape {}x{}",
                rows,
                cols
            )));
        }
        if rows.checked_mul(cols) != Some(cells.len()) {
            return Err(BringupError::InvalidKeymap(alloc::format!(
                "{} cells for a {}x{} matrix",
                cells.len(),
                rows,
                cols
            )));
        }
        if let Some(pos) = cells.iter().position(|c| !c.is_none() && !c.is_valid()) {
            return Err(BringupError::InvalidKeymap(alloc::format!(
                "invalid code {} at row {} col {}",
                cells[pos].code(),
                pos / cols,
                pos % cols
            )));
        }

        Ok(Self { rows, cols, cells })
    }

    /// Build a map from a static row table
    pub fn from_rows<const R: usize, const C: usize>(table: &[[KeyCode; C]; R]) -> Result<Self> {
        let cells = table.iter().flat_map(|row| row.iter().copied()).collect();
        Self::new(R, C, cells)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Raw cell content, `None` outside the matrix
    pub fn get(&self, row: usize, col: usize) -> Option<KeyCode> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    /// Key at a scanned position, `None` for empty cells and out-of-range positions
    pub fn decode(&self, row: usize, col: usize) -> Option<KeyCode> {
        self.get(row, col).filter(|k| !k.is_none())
    }

    /// Populated cells as `(row, col, code)`
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, KeyCode)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.is_none())
            .map(move |(i, k)| (i / cols, i % cols, *k))
    }
}

/// Configuration handed to the keypad driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadConfig {
    pub map: KeypadMap,
    /// Delay between full matrix scans
    pub scan_interval_us: u32,
    /// Settle time after selecting a row
    pub row_delay_us: u32,
    /// Keys read as 0 when pressed
    pub active_low: bool,
}

impl KeypadConfig {
    /// Wrap a map, checking it has the shape the controller scans
    pub fn new(map: KeypadMap, active_low: bool) -> Result<Self> {
        if map.shape() != (KEYPAD_ROWS, KEYPAD_COLS) {
            return Err(BringupError::InvalidKeymap(alloc::format!(
                "driver scans {}x{}, map is {}x{}",
                KEYPAD_ROWS,
                KEYPAD_COLS,
                map.rows(),
                map.cols()
            )));
        }
        Ok(Self {
            map,
            scan_interval_us: 1000,
            row_delay_us: 200,
            active_low,
        })
    }
}

use KeyCode as K;

const __: KeyCode = KeyCode::NONE;

/// Touchpad keypad (CX)
pub static CX_KEYMAP: [[KeyCode; KEYPAD_COLS]; KEYPAD_ROWS] = [
    [K::ENTER, K::ENTER, K::SPACE, K::MINUS, K::Z, K::DOT, K::Y, K::KEY_0, K::X, __, K::QUESTION],
    [K::COMMA, K::KPPLUS, K::W, K::KEY_3, K::V, K::KEY_2, K::U, K::KEY_1, K::T, K::TAB, K::HOME],
    [K::APOSTROPHE, K::KPASTERISK, K::S, K::KEY_6, K::R, K::KEY_5, K::Q, K::KEY_4, K::P, __, K::ESC],
    [K::SEMICOLON, K::KPMINUS, K::O, K::KEY_9, K::N, K::KEY_8, K::M, K::KEY_7, K::L, K::EQUAL, K::MENU],
    [K::K, K::J, K::I, K::H, K::G, K::F, K::E, K::D, K::C, K::B, K::A],
    [K::LEFTBRACE, K::RIGHTBRACE, K::SLASH, __, K::CAPSLOCK, __, K::LEFTSHIFT, K::LEFTCTRL, K::DELETE, K::BACKSPACE, __],
    [K::UP, K::RIGHT, K::DOWN, K::LEFT, __, __, __, __, __, __, __],
    [__, __, __, __, __, __, __, __, __, __, __],
];

/// Clickpad keypad (classic)
pub static CLASSIC_KEYMAP: [[KeyCode; KEYPAD_COLS]; KEYPAD_ROWS] = [
    [K::ENTER, K::ENTER, K::SPACE, K::MINUS, K::Z, K::DOT, K::Y, K::KEY_0, K::X, __, K::QUESTION],
    [K::COMMA, K::KPPLUS, K::W, K::KEY_3, K::V, K::KEY_2, K::U, K::KEY_1, K::T, K::TAB, K::HOME],
    [K::APOSTROPHE, K::KPASTERISK, K::S, K::KEY_6, K::R, K::KEY_5, K::Q, K::KEY_4, K::P, __, K::ESC],
    [K::SEMICOLON, K::KPMINUS, K::O, K::KEY_9, K::N, K::KEY_8, K::M, K::KEY_7, K::L, K::EQUAL, K::MENU],
    [K::K, K::J, K::I, K::H, K::G, K::F, K::E, K::D, K::C, K::B, K::A],
    [K::LEFTBRACE, K::RIGHTBRACE, K::SLASH, __, K::CAPSLOCK, __, K::LEFTSHIFT, K::LEFTCTRL, K::DELETE, K::BACKSPACE, __],
    // clickpad arrows sit on the last row
    [__, __, __, __, __, __, __, __, __, __, __],
    [K::UP, K::RIGHT, K::DOWN, K::LEFT, __, __, __, __, __, __, __],
];
