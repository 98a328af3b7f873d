// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound chat events from the transport adapter.

use crate::error::{AppError, Result};
use crate::models::{ChatId, Directive, InboundEvent, Keyboard};
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Longest text message accepted (Telegram's limit).
const MAX_TEXT_CHARS: usize = 4096;

/// Event routes (webhook secret is checked in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", post(handle_event))
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub user_id: ChatId,
    pub event: InboundEvent,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub directives: Vec<DirectiveResponse>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectiveResponse {
    Reply {
        text: String,
        keyboard: KeyboardResponse,
    },
    ReplyPhoto {
        caption: Option<String>,
        image: ImageResponse,
    },
}

#[derive(Debug, Serialize)]
pub struct KeyboardResponse {
    pub kind: Keyboard,
    pub rows: Vec<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub extension: String,
    pub data_base64: String,
}

impl From<Directive> for DirectiveResponse {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Reply { text, keyboard } => DirectiveResponse::Reply {
                text,
                keyboard: KeyboardResponse {
                    kind: keyboard,
                    rows: keyboard.rows(),
                },
            },
            Directive::ReplyPhoto { image, caption } => DirectiveResponse::ReplyPhoto {
                caption,
                image: ImageResponse {
                    extension: image.extension,
                    data_base64: BASE64.encode(&image.bytes),
                },
            },
        }
    }
}

fn validate_request(request: &EventRequest) -> Result<()> {
    if request.user_id <= 0 {
        return Err(AppError::BadRequest("user_id must be positive".to_string()));
    }
    let text = match &request.event {
        InboundEvent::Text { body } => Some(body),
        InboundEvent::Contact { phone } => Some(phone),
        _ => None,
    };
    if text.is_some_and(|t| t.chars().count() > MAX_TEXT_CHARS) {
        return Err(AppError::BadRequest(format!(
            "text longer than {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

/// Run one event through the conversation controller.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EventResponse>> {
    validate_request(&request)?;

    let directives = state
        .controller
        .handle(request.user_id, request.event)
        .await;

    Ok(Json(EventResponse {
        directives: directives.into_iter().map(DirectiveResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QrImage;

    #[test]
    fn test_photo_is_base64_encoded() {
        let response = DirectiveResponse::from(Directive::ReplyPhoto {
            image: QrImage {
                extension: "png".to_string(),
                bytes: b"qr".to_vec(),
            },
            caption: None,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "reply_photo");
        assert_eq!(json["image"]["data_base64"], "cXI=");
        assert_eq!(json["image"]["extension"], "png");
    }

    #[test]
    fn test_reply_keyboard_rows() {
        let response = DirectiveResponse::from(Directive::reply("hi", Keyboard::MainMenu));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "reply");
        assert_eq!(json["keyboard"]["kind"], "main_menu");
        assert_eq!(json["keyboard"]["rows"][0][0], "Баланс");
    }

    #[test]
    fn test_validate_request() {
        let ok = EventRequest {
            user_id: 1,
            event: InboundEvent::Start,
        };
        assert!(validate_request(&ok).is_ok());

        let bad_id = EventRequest {
            user_id: 0,
            event: InboundEvent::Start,
        };
        assert!(validate_request(&bad_id).is_err());

        let long = EventRequest {
            user_id: 1,
            event: InboundEvent::Text {
                body: "x".repeat(MAX_TEXT_CHARS + 1),
            },
        };
        assert!(validate_request(&long).is_err());
    }
}
