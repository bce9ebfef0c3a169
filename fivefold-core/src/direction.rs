//! Direction tokens for button-driven clients.
//!
//! A [`Gesture`] names a direction relative to the mover's side plus a step
//! count, e.g. `"F"`, `"BL2"`. [`Gesture::target`] turns it into a destination
//! coordinate. Nothing here decides legality: the resulting [`MoveRequest`]
//! goes to [`GameState::apply_move`](crate::GameState::apply_move) like any other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Coord, MoveRequest, PieceKind, Side, BOARD_SIZE};

/// Side-relative direction. Left and right are column offsets and do not
/// depend on side.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
    BackLeft,
    BackRight,
}

impl Direction {
    /// Unit step as `(forward rows, columns)`.
    #[inline]
    pub fn unit(self) -> (i8, i8) {
        match self {
            Direction::Forward => (1, 0),
            Direction::Back => (-1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
            Direction::ForwardLeft => (1, -1),
            Direction::ForwardRight => (1, 1),
            Direction::BackLeft => (-1, -1),
            Direction::BackRight => (-1, 1),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Direction::Forward => "F",
            Direction::Back => "B",
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::ForwardLeft => "FL",
            Direction::ForwardRight => "FR",
            Direction::BackLeft => "BL",
            Direction::BackRight => "BR",
        }
    }

    fn from_unit(unit: (i8, i8)) -> Option<Direction> {
        Direction::all().find(|d| d.unit() == unit)
    }

    pub fn all() -> impl Iterator<Item = Direction> {
        [
            Direction::Forward,
            Direction::Back,
            Direction::Left,
            Direction::Right,
            Direction::ForwardLeft,
            Direction::ForwardRight,
            Direction::BackLeft,
            Direction::BackRight,
        ]
        .into_iter()
    }
}

/// Errors from parsing a gesture token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GestureError {
    #[error("unknown direction in gesture {0:?}")]
    UnknownDirection(String),
    #[error("gesture {0:?} has an invalid step count")]
    InvalidSteps(String),
}

/// A direction and how many cells to travel along it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Gesture {
    pub direction: Direction,
    pub steps: u8,
}

impl Gesture {
    pub const fn new(direction: Direction, steps: u8) -> Gesture {
        Gesture { direction, steps }
    }

    /// Destination reached from `from` by a piece of `side`. May be off the board.
    pub fn target(&self, from: Coord, side: Side) -> Coord {
        let (rows, cols) = self.direction.unit();
        let steps = i8::try_from(self.steps).unwrap_or(i8::MAX);
        from.offset(
            rows.saturating_mul(steps).saturating_mul(side.forward()),
            cols.saturating_mul(steps),
        )
    }

    pub fn to_move(&self, from: Coord, side: Side) -> MoveRequest {
        MoveRequest::new(from, self.target(from, side))
    }

    /// The gesture for a `(forward rows, columns)` displacement, if it lies
    /// on a straight or diagonal line.
    pub fn from_displacement(rows: i8, cols: i8) -> Option<Gesture> {
        let steps = rows.unsigned_abs().max(cols.unsigned_abs());
        if steps == 0 {
            return None;
        }
        if rows != 0 && cols != 0 && rows.unsigned_abs() != cols.unsigned_abs() {
            return None;
        }
        Direction::from_unit((rows.signum(), cols.signum())).map(|d| Gesture::new(d, steps))
    }

    /// Buttons a client should offer for a piece kind, derived from the
    /// kind's displacement table.
    pub fn for_kind(kind: PieceKind) -> Vec<Gesture> {
        kind.displacements()
            .iter()
            .filter_map(|&(rows, cols)| Gesture::from_displacement(rows, cols))
            .collect()
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.direction.token())?;
        if self.steps != 1 {
            write!(f, "{}", self.steps)?;
        }
        Ok(())
    }
}

impl FromStr for Gesture {
    type Err = GestureError;

    /// Parse `"<direction>[steps]"`, steps defaulting to 1.
    fn from_str(token: &str) -> Result<Gesture, GestureError> {
        let split = token
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(token.len());
        let (name, digits) = token.split_at(split);

        let direction = Direction::all()
            .find(|d| d.token() == name)
            .ok_or_else(|| GestureError::UnknownDirection(token.to_string()))?;

        let steps = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u8>()
                .map_err(|_| GestureError::InvalidSteps(token.to_string()))?
        };
        if steps == 0 || steps as usize >= BOARD_SIZE {
            return Err(GestureError::InvalidSteps(token.to_string()));
        }

        Ok(Gesture::new(direction, steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameState;

    #[test]
    fn test_parse_tokens() {
        assert_eq!("F".parse::<Gesture>(), Ok(Gesture::new(Direction::Forward, 1)));
        assert_eq!("BL2".parse::<Gesture>(), Ok(Gesture::new(Direction::BackLeft, 2)));
        assert_eq!("R4".parse::<Gesture>(), Ok(Gesture::new(Direction::Right, 4)));
        assert!(matches!("X".parse::<Gesture>(), Err(GestureError::UnknownDirection(_))));
        assert!(matches!("F0".parse::<Gesture>(), Err(GestureError::InvalidSteps(_))));
        assert!(matches!("F5".parse::<Gesture>(), Err(GestureError::InvalidSteps(_))));
    }

    #[test]
    fn test_display_roundtrips_token() {
        for token in ["F", "B", "L2", "FR2", "BR"] {
            let gesture: Gesture = token.parse().unwrap();
            assert_eq!(gesture.to_string(), token);
        }
    }

    #[test]
    fn test_forward_depends_on_side() {
        let from = Coord::new(2, 2);
        let forward = Gesture::new(Direction::Forward, 1);
        assert_eq!(forward.target(from, Side::First), Coord::new(1, 2));
        assert_eq!(forward.target(from, Side::Second), Coord::new(3, 2));
    }

    #[test]
    fn test_left_right_ignore_side() {
        let from = Coord::new(2, 2);
        let left = Gesture::new(Direction::Left, 2);
        assert_eq!(left.target(from, Side::First), Coord::new(2, 0));
        assert_eq!(left.target(from, Side::Second), Coord::new(2, 0));
    }

    #[test]
    fn test_target_may_leave_board() {
        let gesture = Gesture::new(Direction::BackRight, 2);
        assert!(!gesture.target(Coord::new(4, 4), Side::First).in_bounds());
    }

    #[test]
    fn test_from_displacement() {
        assert_eq!(
            Gesture::from_displacement(2, -2),
            Some(Gesture::new(Direction::ForwardLeft, 2))
        );
        assert_eq!(Gesture::from_displacement(0, 0), None);
        assert_eq!(Gesture::from_displacement(2, 1), None);
    }

    #[test]
    fn test_buttons_match_tables() {
        for kind in PieceKind::all() {
            assert_eq!(Gesture::for_kind(kind).len(), kind.displacements().len());
        }
    }

    #[test]
    fn test_kind_gestures_are_legal_from_center() {
        let mut board = crate::Board::empty();
        board
            .set(Coord::new(0, 0), Some("B-P1".parse().unwrap()))
            .unwrap();
        let from = Coord::new(2, 2);

        for kind in PieceKind::all() {
            let mut board = board;
            board
                .set(from, Some(crate::Piece::new(Side::First, kind, 1)))
                .unwrap();
            let state = GameState::from_position(board, Side::First);

            for gesture in Gesture::for_kind(kind) {
                let mv = gesture.to_move(from, Side::First);
                assert!(state.is_legal(&mv), "{:?} {} should be legal", kind, gesture);
            }
        }
    }
}
