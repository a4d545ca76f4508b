//! Records rejected inside the pipeline.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use changelog::ChangelogStore;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct DeadLetterResponse {
    pub topic: String,
    pub offset: i64,
    pub error: String,
}

/// GET /dead-letters: the most recent rejections, oldest first.
pub async fn list<C: ChangelogStore + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> Json<Vec<DeadLetterResponse>> {
    let letters = state
        .view
        .dead_letters()
        .await
        .into_iter()
        .map(|letter| DeadLetterResponse {
            topic: letter.topic.to_string(),
            offset: letter.offset.as_i64(),
            error: letter.error,
        })
        .collect();
    Json(letters)
}
