use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::extractors::{CurrentUser, RequireUser};
use crate::state::AppState;

/// GraphQL endpoint handler
async fn graphql_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let request = req.data(state.clone()).data(user);
    Json(state.graphql_schema.execute(request).await)
}

/// GraphQL Playground UI (development tool)
async fn graphql_playground(_user: RequireUser) -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}

/// GraphQL router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/graphql", post(graphql_handler))
        .route("/graphql/playground", get(graphql_playground))
}
