use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::{Stream, StreamExt};

use crate::extractors::CurrentUser;
use crate::realtime::{ChangeEvent, ChangeFilter};
use crate::state::AppState;

fn to_sse(change: ChangeEvent) -> Result<Event, Infallible> {
    let event = Event::default().event(change.table.as_str());
    Ok(match event.json_data(&change) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Error encoding change event: {}", e);
            Event::default().comment("encode-error")
        }
    })
}

/// GET /api/realtime?table=posts&post_id=…: change events as SSE
async fn changes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<ChangeFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(
        "User {} subscribed to changes (table: {:?}, post: {:?})",
        user.id,
        filter.table,
        filter.post_id
    );
    let stream = state.changes.stream(filter).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/realtime", get(changes))
}
