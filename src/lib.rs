//! Docbase SDK: a reusable document-model base and CRUD router for
//! multi-tenant services backed by Postgres JSONB.
//!
//! A consumer defines a serde type, implements [`Model`] to name its
//! collection, and mounts a [`CrudRouter`] (or an [`OwnedCrudRouter`] for
//! per-user resources) into an app assembled with [`create_app`]. Route
//! generation is flag-driven and supplementary routes share the same
//! collision-checked aggregation point as the generated ones.

pub mod app;
pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod kv;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod time;

pub use app::create_app;
pub use auth::{Authenticator, ListScope, OwnerAttr, UserClaims};
pub use error::{AppError, ConfigError};
pub use extractors::TenantId;
pub use kv::KvStore;
pub use model::{Document, Model};
pub use response::PaginatedResponse;
pub use routes::{
    common_routes, common_routes_with_ready, Authenticated, CrudOp, CrudRouter, OwnedCrudRouter,
    OwnedRouterOptions, RouteEntry, RouteFlags,
};
pub use service::{CrudService, RequestValidator, ValidationRule};
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_collection_table, ensure_database_exists, ensure_kv_table};
