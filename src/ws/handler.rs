//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::types::SnakeId;
use crate::game::PlayerInput;
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let (handle, frame_rx) = match state.sessions.start(&state.store, &state.config.game) {
        Ok(started) => started,
        Err(e) => {
            error!(error = %e, "Failed to start session");
            let msg = ServerMsg::Error {
                code: "session_start".to_string(),
                message: e.to_string(),
            };
            let _ = send_msg(&mut ws_sink, &msg).await;
            return;
        }
    };
    let snake_id = handle.snake_id.clone();
    info!(snake_id = %snake_id, "New WebSocket connection");

    let welcome = ServerMsg::Welcome {
        snake_id: snake_id.clone(),
        server_time: unix_millis(),
        tick_rate: state.config.game.tick_rate,
        bounds: state.config.game.bounds,
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(snake_id = %snake_id, error = %e, "Failed to send welcome");
        // session loop notices the closed channel on its next frame
        return;
    }

    let limiter = InputRateLimiter::new(state.config.input_rate);
    run_session(snake_id.clone(), ws_sink, ws_stream, handle.input_tx, frame_rx, &limiter).await;

    info!(snake_id = %snake_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    snake_id: SnakeId,
    mut ws_sink: WsSink,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut frame_rx: mpsc::Receiver<ServerMsg>,
    rate_limiter: &InputRateLimiter,
) {
    // Writer task: session output -> WebSocket
    let writer_id = snake_id.clone();
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = frame_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(snake_id = %writer_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        debug!(snake_id = %writer_id, "Session output closed");
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.admit() {
                    warn!(snake_id = %snake_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Leave) => {
                        info!(snake_id = %snake_id, "Client left");
                        break;
                    }
                    Ok(client_msg) => {
                        let input = PlayerInput {
                            snake_id: snake_id.clone(),
                            msg: client_msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(snake_id = %snake_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        // unknown directions land here too
                        warn!(snake_id = %snake_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(snake_id = %snake_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(snake_id = %snake_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(snake_id = %snake_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the session loop
    let _ = input_tx
        .send(PlayerInput {
            snake_id: snake_id.clone(),
            msg: ClientMsg::Leave,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();

    if rate_limiter.rejected() > 0 {
        info!(snake_id = %snake_id, rejected = rate_limiter.rejected(), "Connection hit the input rate limit");
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
