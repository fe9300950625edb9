//! A small notes service consuming the SDK: a public `boards` collection and
//! a per-user `notes` collection with a header-based authenticator.
//!
//! The header authenticator is for local experimentation only; real services
//! verify a bearer token.

use async_trait::async_trait;
use axum::http::request::Parts;
use docbase_sdk::{
    create_app, ensure_collection_table, AppError, AppState, Authenticator, CrudRouter, Model,
    OwnedCrudRouter, OwnedRouterOptions, RouteFlags, Settings, UserClaims,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Board {
    title: String,
}

impl Model for Board {
    const COLLECTION: &'static str = "boards";
}

#[derive(Debug, Serialize, Deserialize)]
struct Note {
    text: String,
    #[serde(default)]
    user_id: Option<String>,
}

impl Model for Note {
    const COLLECTION: &'static str = "notes";
}

struct HeaderAuth;

#[async_trait]
impl Authenticator for HeaderAuth {
    async fn authenticate(&self, parts: &mut Parts) -> Result<UserClaims, AppError> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing x-user-id header".into()))?;
        Ok(UserClaims {
            user_id: user_id.to_string(),
            workspace_id: None,
            tenant_id: None,
            scopes: Vec::new(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/docbase".into());
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    ensure_collection_table(&pool, Board::COLLECTION).await?;
    ensure_collection_table(&pool, Note::COLLECTION).await?;

    let state = AppState::new(pool, Settings::from_env());

    let boards = CrudRouter::<Board>::new()
        .flags(RouteFlags {
            delete: false,
            ..RouteFlags::all()
        })
        .build(state.clone())?;

    let notes = OwnedCrudRouter::<Note>::new(Arc::new(HeaderAuth))
        .options(OwnedRouterOptions {
            self_access: true,
            include_mine: true,
            ..Default::default()
        })
        .build(state.clone())?;

    let app = create_app(state, boards.merge(notes));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
