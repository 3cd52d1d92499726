pub mod auth;
pub mod comments;
pub mod composer;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod graphql;
pub mod likes;
pub mod media;
pub mod posts;
pub mod profiles;
pub mod realtime;
pub mod routes;
pub mod state;

pub use routes::router as app;
