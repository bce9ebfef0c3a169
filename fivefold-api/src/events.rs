//! Events pushed to every connected client over the `/events` WebSocket.

use fivefold_core::{GameState, Side};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A seat was taken.
    PlayerJoined { side: Side },
    /// Both seats are filled and First may move.
    GameStarted { state: GameState },
    /// A move was applied.
    StateUpdate { state: GameState },
    /// The last applied move ended the game.
    GameOver { winner: Side, state: GameState },
    /// A seat was freed.
    PlayerLeft { side: Side },
    /// The board went back to the initial layout.
    GameReset { reason: String, state: GameState },
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("websocket send failed: {0}")]
    Socket(#[from] axum::Error),
}
