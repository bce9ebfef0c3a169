//! Seat assignment and turn gating for one game.
//!
//! The session owns the single authoritative [`GameState`]. Each successful
//! submission replaces it wholesale with the engine's result.

use fivefold_core::{GameState, MoveRequest, RejectionReason, Side};
use thiserror::Error;
use uuid::Uuid;

/// Opaque token handed to a client when it takes a seat.
pub type PlayerId = Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("the game is already full")]
    GameFull,

    #[error("player {0} is not seated in this game")]
    UnknownPlayer(PlayerId),

    #[error("waiting for an opponent to join")]
    WaitingForOpponent,

    #[error("it is {0:?}'s turn")]
    NotYourTurn(Side),

    #[error(transparent)]
    Rejected(#[from] RejectionReason),
}

/// A seat handed out by [`Session::join`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seat {
    pub player_id: PlayerId,
    pub side: Side,
}

/// What happened when a player left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Departure {
    pub side: Side,
    /// A started game was in progress (or the table emptied after one) and
    /// went back to the initial layout.
    pub reset: bool,
}

#[derive(Debug)]
pub struct Session {
    /// Indexed by side: First, then Second.
    seats: [Option<PlayerId>; 2],
    state: GameState,
    /// Both seats have been filled since the last reset.
    started: bool,
}

fn seat_index(side: Side) -> usize {
    match side {
        Side::First => 0,
        Side::Second => 1,
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            seats: [None, None],
            state: GameState::initial(),
            started: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn side_of(&self, player_id: PlayerId) -> Option<Side> {
        Side::all().find(|&side| self.seats[seat_index(side)] == Some(player_id))
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Take the first free seat, First before Second. Filling the table
    /// starts a game, replacing a finished one with the initial layout.
    pub fn join(&mut self) -> Result<Seat, SessionError> {
        let side = Side::all()
            .find(|&side| self.seats[seat_index(side)].is_none())
            .ok_or(SessionError::GameFull)?;

        let player_id = Uuid::new_v4();
        self.seats[seat_index(side)] = Some(player_id);

        if self.is_full() {
            if self.state.is_over() {
                self.state = GameState::initial();
            }
            self.started = true;
        }
        Ok(Seat { player_id, side })
    }

    /// Free a seat. A started game still in progress is reset to the
    /// initial layout. A finished one is kept until the table empties.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<Departure, SessionError> {
        let side = self
            .side_of(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        self.seats[seat_index(side)] = None;

        let emptied = self.seats.iter().all(Option::is_none);
        let reset = self.started && (!self.state.is_over() || emptied);
        if reset {
            self.state = GameState::initial();
            self.started = false;
        }
        Ok(Departure { side, reset })
    }

    /// Forward a move from a seated player into the engine.
    pub fn submit(
        &mut self,
        player_id: PlayerId,
        mv: &MoveRequest,
    ) -> Result<&GameState, SessionError> {
        let side = self
            .side_of(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        if !self.is_full() {
            return Err(SessionError::WaitingForOpponent);
        }
        if !self.state.is_over() && side != self.state.turn() {
            return Err(SessionError::NotYourTurn(self.state.turn()));
        }

        self.state = self.state.apply_move(mv)?;
        Ok(&self.state)
    }

    /// Start over from the initial layout. Any seated player may ask.
    pub fn new_game(&mut self, player_id: PlayerId) -> Result<&GameState, SessionError> {
        self.side_of(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
        self.state = GameState::initial();
        self.started = self.is_full();
        Ok(&self.state)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
