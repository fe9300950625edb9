//! Application assembly: merges the common routes with caller-built API
//! routers and applies the shared middleware stack.

use crate::routes::common_routes_with_ready;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Compose the final router from the shared state and an API router built
/// with [`CrudRouter`](crate::routes::CrudRouter) or
/// [`OwnedCrudRouter`](crate::routes::OwnedCrudRouter). When the settings
/// carry a non-root base path the whole surface is nested under it.
pub fn create_app(state: AppState, api: Router) -> Router {
    let settings = state.settings.clone();
    let app = common_routes_with_ready(state)
        .merge(api)
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes));
    let base = settings.base_path.trim_end_matches('/');
    if base.is_empty() || base == "/" {
        app
    } else {
        Router::new().nest(base, app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn lazy_state(settings: Settings) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/docbase_test")
            .unwrap();
        AppState::new(pool, settings)
    }

    #[tokio::test]
    async fn health_served_under_base_path() {
        let settings = Settings {
            base_path: "/api/v1".into(),
            ..Settings::default()
        };
        let app = create_app(lazy_state(settings), Router::new());
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_base_path_serves_health_at_root() {
        let app = create_app(lazy_state(Settings::default()), Router::new());
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
