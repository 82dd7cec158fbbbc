//! Telegram webhook endpoint
//!
//! Telegram retries any update that is not acknowledged with a 2xx, so every
//! update is answered with 200 OK, including ones we cannot parse or act on.

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use tracing::{debug, warn};
use tracker_services::Update;

use crate::AppState;

/// Create webhook routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook/telegram", post(telegram_update))
}

async fn telegram_update(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Ignoring malformed Telegram update: {}", e);
            return StatusCode::OK;
        }
    };

    let Some(message) = update.text_message() else {
        debug!("Update {} carries no text", update.update_id);
        return StatusCode::OK;
    };
    let text = message.text.as_deref().unwrap_or_default();
    let chat_id = message.chat.id.to_string();

    let Some(reply) = state
        .intake
        .handle_text(&chat_id, message.chat.is_private(), text)
        .await
    else {
        return StatusCode::OK;
    };

    match &state.telegram {
        Some(client) => {
            if let Err(e) = client
                .send_message(&chat_id, &reply.text, reply.buttons.as_ref())
                .await
            {
                warn!("Failed to reply to chat {}: {}", chat_id, e);
            }
        }
        None => debug!("No Telegram client configured, reply to {} dropped", chat_id),
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::send;
    use crate::test_support::state;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    fn update(chat_id: i64, kind: &str, text: &str) -> Request<Body> {
        let body = serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 7,
                "chat": { "id": chat_id, "type": kind },
                "text": text,
            }
        });
        Request::post("/webhook/telegram")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_message_is_admitted() {
        let state = state();
        let app = crate::app(state.clone());

        let text = "#SOLANA\n代币：Test\n代币符号：$TST\n市值：10K\n合约：HOOK111";
        let (status, _) = send(app, update(-100, "supergroup", text)).await;
        assert_eq!(status, StatusCode::OK);

        let signal = state.store.get("HOOK111").await.unwrap().unwrap();
        assert_eq!(signal.scope.as_deref(), Some("-100"));
        assert_eq!(signal.market_cap_at_call, 10_000.0);
    }

    #[tokio::test]
    async fn test_noise_and_garbage_are_acknowledged() {
        let state = state();

        let (status, _) = send(crate::app(state.clone()), update(-100, "group", "gm")).await;
        assert_eq!(status, StatusCode::OK);

        let garbage = Request::post("/webhook/telegram")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(crate::app(state.clone()), garbage).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(state.store.count().await.unwrap(), 0);
    }
}
