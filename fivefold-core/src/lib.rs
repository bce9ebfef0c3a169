//! Fivefold rules engine: a 5x5 board, four piece kinds, two sides.
//!
//! # Board Layout
//!
//! ```text
//!          col 0    1     2     3     4
//!   row 0   B-P1  B-H2  B-H1  B-H3  B-P2    Second home row
//!   row 1    .     .     .     .     .
//!   row 2    .     .     .     .     .
//!   row 3    .     .     .     .     .
//!   row 4   A-P1  A-H2  A-H1  A-H3  A-P2    First home row
//! ```
//!
//! First moves toward row 0, Second toward row 4. "Forward" always means
//! toward the opponent's home row; left and right are plain column offsets.
//!
//! # Movement Tables
//!
//! Displacements are `(Δrow, Δcol)` with `Δrow` measured in the mover's
//! forward direction. Pieces leap: intervening cells are never inspected.
//!
//! ```text
//!   Guard       (P)   (1,0)
//!   Diagonal    (H2)  (±2,±2)
//!   Orthogonal  (H3)  (±2,0) (0,±2) (±2,±2)
//!   Omni        (H1)  (±1,0) (0,±1) (±2,0) (0,±2)
//! ```
//!
//! # Terminal Conditions
//!
//! Checked after every applied move, in order:
//! 1. Elimination: a side with no pieces left loses.
//! 2. Breakthrough: a side with a piece on the opponent's home row wins.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub mod direction;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use direction::{Direction, Gesture, GestureError};

/// Width and height of the board.
pub const BOARD_SIZE: usize = 5;

const LAST_INDEX: i8 = BOARD_SIZE as i8 - 1;

// ============================================================================
// SIDES AND PIECES
// ============================================================================

/// One of the two competing players.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    /// Get the opposing side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    /// Row delta of one step forward.
    #[inline]
    pub fn forward(self) -> i8 {
        match self {
            Side::First => -1,
            Side::Second => 1,
        }
    }

    /// The row this side starts on.
    #[inline]
    pub fn home_row(self) -> i8 {
        match self {
            Side::First => LAST_INDEX,
            Side::Second => 0,
        }
    }

    /// Letter used in piece tags.
    pub fn letter(self) -> char {
        match self {
            Side::First => 'A',
            Side::Second => 'B',
        }
    }

    pub fn from_letter(letter: char) -> Option<Side> {
        match letter {
            'A' => Some(Side::First),
            'B' => Some(Side::Second),
            _ => None,
        }
    }

    pub fn all() -> impl Iterator<Item = Side> {
        [Side::First, Side::Second].into_iter()
    }
}

/// Movement archetype of a piece.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// Single step straight forward.
    Guard,
    /// Two-cell diagonal leap.
    Diagonal,
    /// Two-cell leap along a row, column or diagonal.
    Orthogonal,
    /// One or two cells along a row or column.
    Omni,
}

const GUARD_MOVES: [(i8, i8); 1] = [(1, 0)];

const DIAGONAL_MOVES: [(i8, i8); 4] = [(2, 2), (2, -2), (-2, 2), (-2, -2)];

const ORTHOGONAL_MOVES: [(i8, i8); 8] = [
    (2, 0),
    (-2, 0),
    (0, 2),
    (0, -2),
    (2, 2),
    (2, -2),
    (-2, 2),
    (-2, -2),
];

const OMNI_MOVES: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (2, 0),
    (-2, 0),
    (0, 2),
    (0, -2),
];

impl PieceKind {
    /// Permitted `(forward rows, columns)` displacements for this kind.
    #[inline]
    pub fn displacements(self) -> &'static [(i8, i8)] {
        match self {
            PieceKind::Guard => &GUARD_MOVES,
            PieceKind::Diagonal => &DIAGONAL_MOVES,
            PieceKind::Orthogonal => &ORTHOGONAL_MOVES,
            PieceKind::Omni => &OMNI_MOVES,
        }
    }

    /// Code used in piece tags. Guards append their instance number.
    pub fn code(self) -> &'static str {
        match self {
            PieceKind::Guard => "P",
            PieceKind::Omni => "H1",
            PieceKind::Diagonal => "H2",
            PieceKind::Orthogonal => "H3",
        }
    }

    pub fn all() -> impl Iterator<Item = PieceKind> {
        [
            PieceKind::Guard,
            PieceKind::Diagonal,
            PieceKind::Orthogonal,
            PieceKind::Omni,
        ]
        .into_iter()
    }
}

/// A piece on the board.
///
/// `instance` only tells the two Guards of a side apart when displayed.
/// Rules never look at it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Piece {
    pub side: Side,
    pub kind: PieceKind,
    pub instance: u8,
}

impl Piece {
    #[inline]
    pub const fn new(side: Side, kind: PieceKind, instance: u8) -> Piece {
        Piece { side, kind, instance }
    }

    /// Check whether the raw board displacement is in this piece's table.
    #[inline]
    pub fn can_reach(&self, d_row: i8, d_col: i8) -> bool {
        let forward_rows = d_row.saturating_mul(self.side.forward());
        self.kind.displacements().contains(&(forward_rows, d_col))
    }
}

/// Errors from parsing a piece tag such as `"A-P1"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("piece tag {0:?} is missing the side prefix")]
    MissingSide(String),
    #[error("piece tag {0:?} has an unknown side")]
    UnknownSide(String),
    #[error("piece tag {0:?} has an unknown piece code")]
    UnknownKind(String),
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.side.letter(), self.kind.code())?;
        if self.kind == PieceKind::Guard {
            write!(f, "{}", self.instance)?;
        }
        Ok(())
    }
}

impl FromStr for Piece {
    type Err = TagError;

    fn from_str(tag: &str) -> Result<Piece, TagError> {
        let (side, code) = tag
            .split_once('-')
            .ok_or_else(|| TagError::MissingSide(tag.to_string()))?;

        let mut letters = side.chars();
        let side = match (letters.next(), letters.next()) {
            (Some(letter), None) => Side::from_letter(letter),
            _ => None,
        }
        .ok_or_else(|| TagError::UnknownSide(tag.to_string()))?;

        let (kind, instance) = match code {
            "H1" => (PieceKind::Omni, 1),
            "H2" => (PieceKind::Diagonal, 1),
            "H3" => (PieceKind::Orthogonal, 1),
            _ => {
                let instance = code
                    .strip_prefix('P')
                    .and_then(|digits| digits.parse::<u8>().ok())
                    .ok_or_else(|| TagError::UnknownKind(tag.to_string()))?;
                (PieceKind::Guard, instance)
            }
        };

        Ok(Piece::new(side, kind, instance))
    }
}

impl TryFrom<String> for Piece {
    type Error = TagError;

    fn try_from(tag: String) -> Result<Piece, TagError> {
        tag.parse()
    }
}

impl From<Piece> for String {
    fn from(piece: Piece) -> String {
        piece.to_string()
    }
}

// ============================================================================
// COORDINATES AND MOVES
// ============================================================================

/// A `(row, col)` pair.
///
/// Signed so that off-board requests like `col = -1` can be expressed and
/// rejected. Only in-bounds coordinates ever reach the board cells.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: i8,
    pub col: i8,
}

impl Coord {
    #[inline]
    pub const fn new(row: i8, col: i8) -> Coord {
        Coord { row, col }
    }

    /// Check if both components lie in `[0, 4]`.
    #[inline]
    pub fn in_bounds(self) -> bool {
        (0..=LAST_INDEX).contains(&self.row) && (0..=LAST_INDEX).contains(&self.col)
    }

    /// Shift by a displacement. The result may be off the board.
    #[inline]
    pub fn offset(self, d_row: i8, d_col: i8) -> Coord {
        Coord::new(
            self.row.saturating_add(d_row),
            self.col.saturating_add(d_col),
        )
    }

    /// Iterate over all 25 cells in row-major order.
    pub fn all() -> impl Iterator<Item = Coord> {
        (0..=LAST_INDEX).flat_map(|row| (0..=LAST_INDEX).map(move |col| Coord::new(row, col)))
    }

    #[inline]
    fn index(self) -> Option<(usize, usize)> {
        self.in_bounds()
            .then(|| (self.row as usize, self.col as usize))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// A proposed move by origin and destination.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Coord,
    pub to: Coord,
}

impl MoveRequest {
    #[inline]
    pub const fn new(from: Coord, to: Coord) -> MoveRequest {
        MoveRequest { from, to }
    }

    /// `(Δrow, Δcol)` in board terms, not side-relative.
    #[inline]
    pub fn displacement(&self) -> (i8, i8) {
        (
            self.to.row.saturating_sub(self.from.row),
            self.to.col.saturating_sub(self.from.col),
        )
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Log entry for one applied move. Never modified after creation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct MoveRecord {
    pub piece: Piece,
    pub from: Coord,
    pub to: Coord,
    pub captured: Option<Piece>,
}

impl fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} to {}", self.piece, self.from, self.to)?;
        if let Some(captured) = self.captured {
            write!(f, " (Captured {})", captured)?;
        }
        Ok(())
    }
}

impl Serialize for MoveRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("MoveRecord", 5)?;
        record.serialize_field("piece", &self.piece)?;
        record.serialize_field("from", &self.from)?;
        record.serialize_field("to", &self.to)?;
        record.serialize_field("captured", &self.captured)?;
        record.serialize_field("notation", &self.to_string())?;
        record.end()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// A coordinate outside `[0,4] x [0,4]`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("coordinate {0} is outside the board")]
pub struct OutOfBounds(pub Coord);

/// Why a move was refused. Every variant leaves the game state untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("coordinate {0} is outside the board")]
    OutOfBounds(Coord),

    #[error("no piece at {0}")]
    EmptyOrigin(Coord),

    #[error("it is {turn:?}'s turn")]
    NotYourTurn { turn: Side },

    #[error("destination {0} holds a piece of the same side")]
    SelfCapture(Coord),

    #[error("{kind:?} cannot move by ({}, {})", .delta.0, .delta.1)]
    IllegalGeometry { kind: PieceKind, delta: (i8, i8) },

    #[error("the game is over, {winner:?} won")]
    GameOver { winner: Side },
}

impl RejectionReason {
    /// True for every rule violation, false once the game has ended.
    pub fn is_illegal_move(&self) -> bool {
        !matches!(self, RejectionReason::GameOver { .. })
    }

    /// Stable machine-readable name.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::OutOfBounds(_) => "out_of_bounds",
            RejectionReason::EmptyOrigin(_) => "empty_origin",
            RejectionReason::NotYourTurn { .. } => "not_your_turn",
            RejectionReason::SelfCapture(_) => "self_capture",
            RejectionReason::IllegalGeometry { .. } => "illegal_geometry",
            RejectionReason::GameOver { .. } => "game_over",
        }
    }
}

impl From<OutOfBounds> for RejectionReason {
    fn from(err: OutOfBounds) -> Self {
        RejectionReason::OutOfBounds(err.0)
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Content of one cell.
pub type Cell = Option<Piece>;

/// 5x5 grid of cells, indexed `[row][col]`.
///
/// Serializes as a 5x5 array of piece tags, `null` for empty cells.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

/// Kind order along each home row, by column.
const HOME_ROW: [(PieceKind, u8); BOARD_SIZE] = [
    (PieceKind::Guard, 1),
    (PieceKind::Diagonal, 1),
    (PieceKind::Omni, 1),
    (PieceKind::Orthogonal, 1),
    (PieceKind::Guard, 2),
];

impl Board {
    /// A board with no pieces.
    pub fn empty() -> Board {
        Board {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// The starting layout.
    pub fn initial() -> Board {
        let mut board = Board::empty();
        for side in Side::all() {
            let row = side.home_row() as usize;
            for (col, &(kind, instance)) in HOME_ROW.iter().enumerate() {
                board.cells[row][col] = Some(Piece::new(side, kind, instance));
            }
        }
        board
    }

    /// Build a board from a grid of tags, `""` marking an empty cell.
    pub fn from_tags(rows: &[[&str; BOARD_SIZE]; BOARD_SIZE]) -> Result<Board, TagError> {
        let mut board = Board::empty();
        for (r, row) in rows.iter().enumerate() {
            for (c, tag) in row.iter().enumerate() {
                if !tag.is_empty() {
                    board.cells[r][c] = Some(tag.parse()?);
                }
            }
        }
        Ok(board)
    }

    /// The grid as tags, `""` for empty cells.
    pub fn tags(&self) -> [[String; BOARD_SIZE]; BOARD_SIZE] {
        std::array::from_fn(|r| {
            std::array::from_fn(|c| self.cells[r][c].map(|p| p.to_string()).unwrap_or_default())
        })
    }

    /// Get the cell at a coordinate.
    #[inline]
    pub fn piece_at(&self, coord: Coord) -> Result<Cell, OutOfBounds> {
        let (r, c) = coord.index().ok_or(OutOfBounds(coord))?;
        Ok(self.cells[r][c])
    }

    /// Overwrite a cell, returning what was there.
    pub fn set(&mut self, coord: Coord, cell: Cell) -> Result<Cell, OutOfBounds> {
        let (r, c) = coord.index().ok_or(OutOfBounds(coord))?;
        Ok(std::mem::replace(&mut self.cells[r][c], cell))
    }

    /// Iterate over one side's pieces with their coordinates.
    pub fn pieces(&self, side: Side) -> impl Iterator<Item = (Coord, Piece)> + '_ {
        Coord::all().filter_map(move |coord| match self.piece_at(coord) {
            Ok(Some(piece)) if piece.side == side => Some((coord, piece)),
            _ => None,
        })
    }

    /// Number of pieces a side has on the board.
    pub fn count(&self, side: Side) -> usize {
        self.pieces(side).count()
    }

    /// Check the terminal conditions.
    ///
    /// Elimination is checked before breakthrough. An empty board has no
    /// winner.
    pub fn detect_winner(&self) -> Option<Side> {
        let first = self.count(Side::First);
        let second = self.count(Side::Second);
        if first == 0 && second > 0 {
            return Some(Side::Second);
        }
        if second == 0 && first > 0 {
            return Some(Side::First);
        }

        Side::all().find(|&side| {
            let target = side.opponent().home_row();
            self.pieces(side).any(|(coord, _)| coord.row == target)
        })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    Some(piece) => format!("{:<4}", piece.to_string()),
                    None => format!("{:<4}", "."),
                })
                .collect();
            writeln!(f, "{}", line.join(" ").trim_end())?;
        }
        Ok(())
    }
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Complete state of one game.
///
/// Fields are only changed by [`GameState::apply_move`], which returns a new
/// value and leaves `self` untouched.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct GameState {
    board: Board,
    turn: Side,
    history: Vec<MoveRecord>,
    winner: Option<Side>,
}

impl GameState {
    /// The starting position with First to move.
    pub fn initial() -> GameState {
        GameState::from_position(Board::initial(), Side::First)
    }

    /// Start from an arbitrary position. The winner is derived from the board.
    pub fn from_position(board: Board, turn: Side) -> GameState {
        GameState {
            winner: board.detect_winner(),
            board,
            turn,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn turn(&self) -> Side {
        self.turn
    }

    #[inline]
    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    #[inline]
    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn piece_at(&self, coord: Coord) -> Result<Cell, OutOfBounds> {
        self.board.piece_at(coord)
    }

    /// Check a move against the rules, returning the piece that would move.
    ///
    /// Checks run in a fixed order: game over, bounds, origin, turn,
    /// self-capture, geometry. Staying on the origin is a geometry error.
    pub fn validate(&self, mv: &MoveRequest) -> Result<Piece, RejectionReason> {
        if let Some(winner) = self.winner {
            return Err(RejectionReason::GameOver { winner });
        }

        let origin = self.board.piece_at(mv.from)?;
        let target = self.board.piece_at(mv.to)?;

        let mover = origin.ok_or(RejectionReason::EmptyOrigin(mv.from))?;
        if mover.side != self.turn {
            return Err(RejectionReason::NotYourTurn { turn: self.turn });
        }

        let (d_row, d_col) = mv.displacement();
        if mv.from != mv.to && target.is_some_and(|piece| piece.side == mover.side) {
            return Err(RejectionReason::SelfCapture(mv.to));
        }

        if !mover.can_reach(d_row, d_col) {
            return Err(RejectionReason::IllegalGeometry {
                kind: mover.kind,
                delta: (d_row, d_col),
            });
        }

        Ok(mover)
    }

    /// Check if a move is legal in this state.
    #[inline]
    pub fn is_legal(&self, mv: &MoveRequest) -> bool {
        self.validate(mv).is_ok()
    }

    /// Apply a move, producing the next state.
    ///
    /// On rejection nothing is produced and `self` is unchanged. On success
    /// the mover lands on the destination (capturing whatever opponent piece
    /// was there), the move is recorded, the turn passes, and the terminal
    /// conditions are evaluated.
    pub fn apply_move(&self, mv: &MoveRequest) -> Result<GameState, RejectionReason> {
        let mover = self.validate(mv).inspect_err(|reason| {
            tracing::debug!(%mv, %reason, "move rejected");
        })?;

        let mut next = self.clone();
        let captured = next.board.set(mv.to, Some(mover))?;
        next.board.set(mv.from, None)?;

        let record = MoveRecord {
            piece: mover,
            from: mv.from,
            to: mv.to,
            captured,
        };
        tracing::trace!(%record, "move applied");

        next.history.push(record);
        next.turn = self.turn.opponent();
        next.winner = next.board.detect_winner();

        if let Some(winner) = next.winner {
            tracing::debug!(?winner, moves = next.history.len(), "game over");
        }

        Ok(next)
    }

    /// All legal moves for the side to move. Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<MoveRequest> {
        if self.is_over() {
            return Vec::new();
        }

        let mut moves = Vec::with_capacity(32);
        for (from, piece) in self.board.pieces(self.turn) {
            let forward = piece.side.forward();
            for &(rows, cols) in piece.kind.displacements() {
                let mv = MoveRequest::new(from, from.offset(rows * forward, cols));
                if self.is_legal(&mv) {
                    moves.push(mv);
                }
            }
        }
        moves
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::initial()
    }
}
