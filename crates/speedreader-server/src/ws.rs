//! WebSocket OCR endpoint.

use crate::ApiState;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
};
use speedreader_core::{Image, OcrJsonResult, PageContext};
use tracing::{debug, warn};

/// Upgrade handler for `/api/ws/ocr`. Each binary client frame is one image;
/// each text server frame is the JSON result for the next pending image.
pub async fn ws_ocr(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let mut page = 0usize;

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "websocket receive error");
                break;
            }
        };
        match message {
            Message::Binary(bytes) => {
                let reply = process_frame(&state, page, &bytes).await;
                page += 1;
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; text frames are not part of the
            // protocol and are ignored.
            _ => {}
        }
    }

    // Client half-closed (or errored): finish the handshake normally.
    let _ = socket.send(Message::Close(None)).await;
    debug!(pages = page, "websocket session closed");
}

/// Run one frame through the pipeline and serialize the outcome; errors come
/// back as the `{"error": ...}` object rather than tearing the socket down.
async fn process_frame(state: &ApiState, page: usize, bytes: &[u8]) -> String {
    let outcome = async {
        let image = Image::decode(bytes)?;
        let result = state.pipeline.submit(image, PageContext::new(page)).await?;
        Ok::<_, speedreader_core::OcrError>(OcrJsonResult::new(None, result))
    }
    .await;

    match outcome {
        Ok(result) => {
            serde_json::to_string_pretty(&result).unwrap_or_else(|e| error_json(&e.to_string()))
        }
        Err(err) => {
            warn!(page, error = %err, "websocket ocr failed");
            error_json(&err.to_string())
        }
    }
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
