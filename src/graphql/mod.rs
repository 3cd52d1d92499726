pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

pub use schema::{build_schema, PlazaSchema};

use async_graphql::ErrorExtensions;

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// Application state and the authenticated caller, both attached per request.
pub(crate) fn viewer<'a>(
    ctx: &async_graphql::Context<'a>,
) -> async_graphql::Result<(&'a AppState, &'a CurrentUser)> {
    Ok((ctx.data::<AppState>()?, ctx.data::<CurrentUser>()?))
}

/// Convert to a GraphQL error without leaking server-side details.
pub(crate) fn app_error(e: impl Into<AppError>) -> async_graphql::Error {
    let e = e.into();
    async_graphql::Error::new(e.public_message())
        .extend_with(|_, ext| ext.set("status", e.status().as_u16()))
}
