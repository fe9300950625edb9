//! Minimal service built on the SDK: a `widgets` collection with the
//! update route disabled and a supplementary archive action.
//!
//! Run with `DATABASE_URL=postgres://localhost/docbase cargo run --example server`.

use axum::http::{Method, StatusCode};
use axum::routing::post;
use docbase_sdk::{
    create_app, ensure_collection_table, ensure_database_exists, AppState, CrudRouter, Model,
    RouteFlags, Settings, ValidationRule,
};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Widget {
    name: String,
    #[serde(default)]
    price: f64,
}

impl Model for Widget {
    const COLLECTION: &'static str = "widgets";
}

async fn archive() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/docbase".into());
    ensure_database_exists(&database_url).await?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    ensure_collection_table(&pool, Widget::COLLECTION).await?;

    let state = AppState::new(pool, Settings::from_env());

    let widgets = CrudRouter::<Widget>::new()
        .flags(RouteFlags {
            update: false,
            ..RouteFlags::all()
        })
        .rule(
            "name",
            ValidationRule {
                required: Some(true),
                max_length: Some(120),
                ..Default::default()
            },
        )
        .route(Method::POST, "/:uid/archive", post(archive))
        .build(state.clone())?;

    let app = create_app(state, widgets);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
