//! WASM bindings for fivefold-core
//!
//! Lets a browser client render the authoritative state and translate button
//! presses into coordinate moves without any rules of its own.

use wasm_bindgen::prelude::*;

use crate::{Coord, GameState, Gesture, MoveRequest, Side};

/// WASM-friendly wrapper around GameState
#[wasm_bindgen]
pub struct WasmGame {
    inner: GameState,
}

#[wasm_bindgen]
impl WasmGame {
    /// Start a new game from the initial layout
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame {
            inner: GameState::initial(),
        }
    }

    pub fn reset(&mut self) {
        self.inner = GameState::initial();
    }

    /// Full state as a JS object: { board, turn, history, winner }
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner).map_err(JsValue::from)
    }

    /// Side to move: "A" or "B"
    pub fn turn(&self) -> String {
        self.inner.turn().letter().to_string()
    }

    /// Winning side letter, or undefined while the game is running
    pub fn winner(&self) -> Option<String> {
        self.inner.winner().map(|side: Side| side.letter().to_string())
    }

    #[wasm_bindgen(js_name = isLegal)]
    pub fn is_legal(&self, from_row: i8, from_col: i8, to_row: i8, to_col: i8) -> bool {
        self.inner.is_legal(&request(from_row, from_col, to_row, to_col))
    }

    /// Apply a move. Returns undefined on success, or the rejection code
    /// ("out_of_bounds", "not_your_turn", ...) with the state unchanged.
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(
        &mut self,
        from_row: i8,
        from_col: i8,
        to_row: i8,
        to_col: i8,
    ) -> Option<String> {
        match self.inner.apply_move(&request(from_row, from_col, to_row, to_col)) {
            Ok(next) => {
                self.inner = next;
                None
            }
            Err(reason) => Some(reason.code().to_string()),
        }
    }

    /// Legal moves as an array of { from: {row, col}, to: {row, col} }
    #[wasm_bindgen(js_name = legalMoves)]
    pub fn legal_moves(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.legal_moves()).map_err(JsValue::from)
    }

    /// Destination [row, col] of a button token ("F", "BL2", ...) pressed for
    /// the piece at (row, col), oriented for the side to move
    #[wasm_bindgen(js_name = gestureTarget)]
    pub fn gesture_target(&self, row: i8, col: i8, token: &str) -> Result<Vec<i8>, JsValue> {
        let gesture: Gesture = token
            .parse()
            .map_err(|e: crate::GestureError| JsValue::from_str(&e.to_string()))?;
        let target = gesture.target(Coord::new(row, col), self.inner.turn());
        Ok(vec![target.row, target.col])
    }

    /// Clone the game
    #[wasm_bindgen(js_name = clone)]
    pub fn clone_game(&self) -> WasmGame {
        WasmGame {
            inner: self.inner.clone(),
        }
    }
}

impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}

fn request(from_row: i8, from_col: i8, to_row: i8, to_col: i8) -> MoveRequest {
    MoveRequest::new(Coord::new(from_row, from_col), Coord::new(to_row, to_col))
}
