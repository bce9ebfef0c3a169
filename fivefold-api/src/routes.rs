//! HTTP and WebSocket handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use fivefold_core::{GameState, MoveRequest, Side};

use crate::error::ApiError;
use crate::events::{Event, EventError};
use crate::session::{PlayerId, Session, SessionError};

// =============================================================================
// Shared State
// =============================================================================

pub struct AppStateInner {
    session: Mutex<Session>,
    events: broadcast::Sender<Event>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// `capacity` is the number of events a slow subscriber may fall behind.
    pub fn new(capacity: usize) -> AppState {
        let (events, _) = broadcast::channel(capacity.max(1));
        Arc::new(AppStateInner {
            session: Mutex::new(Session::new()),
            events,
        })
    }

    /// A panic mid-request never leaves the session half-updated, so a
    /// poisoned lock is still usable.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Callers hold the session lock so subscribers see events in state order.
    fn publish(&self, event: Event) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
pub struct HealthModel {
    status: &'static str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SeatModel {
    pub player_id: PlayerId,
    pub side: Side,
}

#[derive(Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

/// Query string of `/events`. A seated player passes its token so that
/// closing the stream frees the seat.
#[derive(Deserialize)]
pub struct EventsQuery {
    pub player_id: Option<PlayerId>,
}

#[derive(Deserialize)]
pub struct MoveBody {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub mv: MoveRequest,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> Json<HealthModel> {
    Json(HealthModel { status: "ok" })
}

async fn get_game(State(state): State<AppState>) -> Json<GameState> {
    Json(state.session().state().clone())
}

async fn get_moves(State(state): State<AppState>) -> Json<Vec<MoveRequest>> {
    Json(state.session().state().legal_moves())
}

async fn join(State(state): State<AppState>) -> Result<Json<SeatModel>, ApiError> {
    let mut session = state.session();
    let seat = session.join()?;
    tracing::info!(side = ?seat.side, player = %seat.player_id, "player joined");

    state.publish(Event::PlayerJoined { side: seat.side });
    if session.is_full() {
        tracing::info!("both seats filled, game started");
        state.publish(Event::GameStarted {
            state: session.state().clone(),
        });
    }

    Ok(Json(SeatModel {
        player_id: seat.player_id,
        side: seat.side,
    }))
}

async fn leave(
    State(state): State<AppState>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<GameState>, ApiError> {
    Ok(Json(release_seat(&state, req.player_id)?))
}

/// Free a seat and tell everyone, resetting a game in progress.
fn release_seat(state: &AppStateInner, player_id: PlayerId) -> Result<GameState, SessionError> {
    let mut session = state.session();
    let departure = session.leave(player_id)?;
    tracing::info!(side = ?departure.side, reset = departure.reset, "player left");

    state.publish(Event::PlayerLeft {
        side: departure.side,
    });
    if departure.reset {
        state.publish(Event::GameReset {
            reason: format!("{:?} left the game", departure.side),
            state: session.state().clone(),
        });
    }

    Ok(session.state().clone())
}

async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveBody>,
) -> Result<Json<GameState>, ApiError> {
    let mut session = state.session();
    let next = session.submit(req.player_id, &req.mv)?.clone();

    state.publish(Event::StateUpdate {
        state: next.clone(),
    });
    if let Some(winner) = next.winner() {
        tracing::info!(?winner, moves = next.history().len(), "game over");
        state.publish(Event::GameOver {
            winner,
            state: next.clone(),
        });
    }

    Ok(Json(next))
}

async fn new_game(
    State(state): State<AppState>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<GameState>, ApiError> {
    let mut session = state.session();
    let fresh = session.new_game(req.player_id)?.clone();
    tracing::info!(player = %req.player_id, "new game");

    state.publish(Event::GameReset {
        reason: "new game requested".to_string(),
        state: fresh.clone(),
    });

    Ok(Json(fresh))
}

async fn events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    if let Some(player_id) = query.player_id {
        state
            .session()
            .side_of(player_id)
            .ok_or(SessionError::UnknownPlayer(player_id))?;
    }

    Ok(ws.on_upgrade(move |socket| async move {
        stream_events(socket, &state).await;
        if let Some(player_id) = query.player_id {
            disconnect(&state, player_id);
        }
    }))
}

/// A seated player's event stream ended.
fn disconnect(state: &AppStateInner, player_id: PlayerId) {
    match release_seat(state, player_id) {
        Ok(_) => tracing::info!(player = %player_id, "seat freed on disconnect"),
        // Already left through /leave
        Err(e) => tracing::debug!(player = %player_id, error = %e, "stream closed"),
    }
}

// =============================================================================
// Event Stream
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), EventError> {
    let text = serde_json::to_string(event)?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Send the current state, then forward every broadcast until either side
/// goes away. Incoming client messages are ignored.
async fn stream_events(mut socket: WebSocket, state: &AppStateInner) {
    // Subscribe under the lock so no event between snapshot and stream is lost
    let (mut rx, snapshot) = {
        let session = state.session();
        let rx = state.subscribe();
        let snapshot = Event::StateUpdate {
            state: session.state().clone(),
        };
        (rx, snapshot)
    };

    if let Err(e) = send_event(&mut socket, &snapshot).await {
        tracing::debug!(error = %e, "subscriber went away before snapshot");
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if let Err(e) = send_event(&mut socket, &event).await {
                        tracing::debug!(error = %e, "dropping subscriber");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber lagged, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/game", get(get_game))
        .route("/moves", get(get_moves))
        .route("/join", post(join))
        .route("/leave", post(leave))
        .route("/move", post(make_move))
        .route("/new-game", post(new_game))
        .route("/events", get(events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use fivefold_core::Coord;

    fn body(player_id: PlayerId, from: (i8, i8), to: (i8, i8)) -> Json<MoveBody> {
        Json(MoveBody {
            player_id,
            mv: MoveRequest::new(Coord::new(from.0, from.1), Coord::new(to.0, to.1)),
        })
    }

    async fn seated(state: &AppState) -> (PlayerId, PlayerId) {
        let Json(first) = join(State(state.clone())).await.unwrap();
        let Json(second) = join(State(state.clone())).await.unwrap();
        (first.player_id, second.player_id)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_join_broadcasts_and_starts_game() {
        let state = AppStateInner::new(16);
        let mut rx = state.subscribe();

        seated(&state).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                Event::PlayerJoined { side: Side::First },
                Event::PlayerJoined { side: Side::Second },
                Event::GameStarted {
                    state: GameState::initial()
                },
            ]
        );

        let err = join(State(state.clone())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_move_updates_and_broadcasts() {
        let state = AppStateInner::new(16);
        let (first, _) = seated(&state).await;
        let mut rx = state.subscribe();

        let Json(next) = make_move(State(state.clone()), body(first, (4, 0), (3, 0)))
            .await
            .unwrap();
        assert_eq!(next.turn(), Side::Second);
        assert_eq!(state.session().state(), &next);
        assert_eq!(drain(&mut rx), vec![Event::StateUpdate { state: next }]);
    }

    #[tokio::test]
    async fn test_rejected_move_is_unprocessable() {
        let state = AppStateInner::new(16);
        let (first, second) = seated(&state).await;
        let mut rx = state.subscribe();

        let err = make_move(State(state.clone()), body(first, (4, 0), (2, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = make_move(State(state.clone()), body(second, (0, 0), (1, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.session().state(), &GameState::initial());
    }

    #[tokio::test]
    async fn test_leave_mid_game_broadcasts_reset() {
        let state = AppStateInner::new(16);
        let (first, second) = seated(&state).await;
        make_move(State(state.clone()), body(first, (4, 0), (3, 0)))
            .await
            .unwrap();
        let mut rx = state.subscribe();

        let Json(after) = leave(State(state.clone()), Json(PlayerRequest { player_id: second }))
            .await
            .unwrap();
        assert_eq!(after, GameState::initial());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::PlayerLeft { side: Side::Second });
        assert!(matches!(&events[1], Event::GameReset { state, .. } if *state == GameState::initial()));
    }

    #[tokio::test]
    async fn test_winning_move_broadcasts_game_over() {
        let state = AppStateInner::new(32);
        let (first, second) = seated(&state).await;

        let script = [
            (first, (4, 4), (3, 4)),
            (second, (0, 2), (1, 2)),
            (first, (3, 4), (2, 4)),
            (second, (1, 2), (1, 1)),
            (first, (2, 4), (1, 4)),
            (second, (1, 1), (1, 2)),
        ];
        for (player, from, to) in script {
            make_move(State(state.clone()), body(player, from, to))
                .await
                .unwrap();
        }

        let mut rx = state.subscribe();
        let Json(last) = make_move(State(state.clone()), body(first, (1, 4), (0, 4)))
            .await
            .unwrap();
        assert_eq!(last.winner(), Some(Side::First));

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                Event::StateUpdate {
                    state: last.clone()
                },
                Event::GameOver {
                    winner: Side::First,
                    state: last,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_refilled_table_after_game_over_starts_fresh() {
        let state = AppStateInner::new(32);
        let (first, second) = seated(&state).await;
        let script = [
            (first, (4, 4), (3, 4)),
            (second, (0, 2), (1, 2)),
            (first, (3, 4), (2, 4)),
            (second, (1, 2), (1, 1)),
            (first, (2, 4), (1, 4)),
            (second, (1, 1), (1, 2)),
            (first, (1, 4), (0, 4)),
        ];
        for (player, from, to) in script {
            make_move(State(state.clone()), body(player, from, to))
                .await
                .unwrap();
        }

        // The finished game survives one departure
        let Json(after) = leave(State(state.clone()), Json(PlayerRequest { player_id: second }))
            .await
            .unwrap();
        assert_eq!(after.winner(), Some(Side::First));

        let mut rx = state.subscribe();
        let Json(newcomer) = join(State(state.clone())).await.unwrap();
        assert_eq!(newcomer.side, Side::Second);
        assert_eq!(
            drain(&mut rx),
            vec![
                Event::PlayerJoined { side: Side::Second },
                Event::GameStarted {
                    state: GameState::initial()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_leave_before_opponent_sends_no_reset() {
        let state = AppStateInner::new(16);
        let Json(only) = join(State(state.clone())).await.unwrap();
        let mut rx = state.subscribe();

        leave(State(state.clone()), Json(PlayerRequest { player_id: only.player_id }))
            .await
            .unwrap();
        assert_eq!(drain(&mut rx), vec![Event::PlayerLeft { side: Side::First }]);
    }

    /// Serve the router on a loopback port.
    async fn serve(state: &AppState) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    /// Send a WebSocket handshake for `path` and read until `marker` shows up.
    async fn open_events(
        addr: std::net::SocketAddr,
        path: &str,
        marker: &str,
    ) -> (tokio::net::TcpStream, String) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        while !String::from_utf8_lossy(&received).contains(marker) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before {marker:?}");
            received.extend_from_slice(&buf[..n]);
        }
        (stream, String::from_utf8_lossy(&received).into_owned())
    }

    #[tokio::test]
    async fn test_closing_seated_stream_frees_seat() {
        use std::time::Duration;
        use tokio::time::timeout;

        let state = AppStateInner::new(16);
        let (first, second) = seated(&state).await;
        make_move(State(state.clone()), body(first, (4, 0), (3, 0)))
            .await
            .unwrap();
        let addr = serve(&state).await;

        // The snapshot frame proves the stream is live
        let (stream, received) =
            open_events(addr, &format!("/events?player_id={second}"), "state_update").await;
        assert!(received.starts_with("HTTP/1.1 101"));

        let mut rx = state.subscribe();
        drop(stream);

        let wait = Duration::from_secs(5);
        let left = timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert_eq!(left, Event::PlayerLeft { side: Side::Second });
        let reset = timeout(wait, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(
            reset,
            Event::GameReset { state: ref fresh, .. } if *fresh == GameState::initial()
        ));

        assert!(!state.session().is_full());
        let Json(newcomer) = join(State(state.clone())).await.unwrap();
        assert_eq!(newcomer.side, Side::Second);
    }

    #[tokio::test]
    async fn test_events_refuse_unknown_player() {
        let state = AppStateInner::new(16);
        seated(&state).await;
        let addr = serve(&state).await;

        let stranger = uuid::Uuid::new_v4();
        let (_stream, received) =
            open_events(addr, &format!("/events?player_id={stranger}"), "\r\n\r\n").await;
        assert!(received.starts_with("HTTP/1.1 403"));
        assert!(state.session().is_full());
    }

    #[tokio::test]
    async fn test_new_game_requires_seat() {
        let state = AppStateInner::new(16);
        let (first, _) = seated(&state).await;
        make_move(State(state.clone()), body(first, (4, 0), (3, 0)))
            .await
            .unwrap();

        let Json(fresh) = new_game(State(state.clone()), Json(PlayerRequest { player_id: first }))
            .await
            .unwrap();
        assert_eq!(fresh, GameState::initial());

        let err = new_game(
            State(state.clone()),
            Json(PlayerRequest {
                player_id: uuid::Uuid::new_v4(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_move_body_flattens_coordinates() {
        let json = r#"{
            "player_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "from": {"row": 4, "col": 0},
            "to": {"row": 3, "col": 0}
        }"#;
        let req: MoveBody = serde_json::from_str(json).unwrap();
        assert_eq!(req.mv, MoveRequest::new(Coord::new(4, 0), Coord::new(3, 0)));
    }
}
