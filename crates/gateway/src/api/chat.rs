//! `POST /chat/stream` — the HTTP/SSE edge over the orchestration kernel.
//! Wires an `async_stream::stream!` over the engine's event receiver, one
//! axum SSE `Event` per `wk_engine` `Event`, mapped onto its ten wire
//! event names.

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use wk_domain::message::Message;
use wk_domain::state::Options;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub deep_thinking_mode: bool,
    #[serde(default)]
    pub search_before_planning: bool,
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let options = Options {
        deep_thinking: body.deep_thinking_mode,
        search_before_planning: body.search_before_planning,
        debug: body.debug,
    };

    let rx = state.engine.run(body.messages, options);
    Sse::new(make_sse_stream(rx)).keep_alive(KeepAlive::default())
}

fn make_sse_stream(
    mut rx: wk_engine::EventReceiver,
) -> impl Stream<Item = Result<SseEvent, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let name = event.kind();
            let data = serde_json::to_string(&event.payload_json()).unwrap_or_default();
            yield Ok(SseEvent::default().event(name).data(data));
        }
    }
}
