//! Configurable CRUD router for a consumer model: per-route enable flags,
//! supplementary routes through the same aggregation point, and collision
//! detection at configuration time.

use crate::error::ConfigError;
use crate::handlers::entity;
use crate::model::Model;
use crate::service::ValidationRule;
use crate::state::AppState;
use axum::{
    http::{Method, StatusCode},
    routing::MethodRouter,
    Extension, Router,
};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-route switches for the generated CRUD set. All enabled by default.
/// Applying a new set replaces the previous one entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteFlags {
    pub list: bool,
    pub get: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for RouteFlags {
    fn default() -> Self {
        RouteFlags::all()
    }
}

impl RouteFlags {
    pub fn all() -> Self {
        RouteFlags {
            list: true,
            get: true,
            create: true,
            update: true,
            delete: true,
        }
    }

    pub fn none() -> Self {
        RouteFlags {
            list: false,
            get: false,
            create: false,
            update: false,
            delete: false,
        }
    }

    pub fn enabled(&self, op: CrudOp) -> bool {
        match op {
            CrudOp::List => self.list,
            CrudOp::Get => self.get,
            CrudOp::Create => self.create,
            CrudOp::Update => self.update,
            CrudOp::Delete => self.delete,
        }
    }
}

/// The five generated operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrudOp {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl CrudOp {
    pub const ALL: [CrudOp; 5] = [
        CrudOp::List,
        CrudOp::Get,
        CrudOp::Create,
        CrudOp::Update,
        CrudOp::Delete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CrudOp::List => "list",
            CrudOp::Get => "get",
            CrudOp::Create => "create",
            CrudOp::Update => "update",
            CrudOp::Delete => "delete",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            CrudOp::List | CrudOp::Get => Method::GET,
            CrudOp::Create => Method::POST,
            CrudOp::Update => Method::PATCH,
            CrudOp::Delete => Method::DELETE,
        }
    }

    /// Route path relative to the router prefix.
    pub fn path(&self) -> &'static str {
        match self {
            CrudOp::List | CrudOp::Create => "/",
            CrudOp::Get | CrudOp::Update | CrudOp::Delete => "/:uid",
        }
    }
}

/// One effective route, for inspection and tests. `path` includes the prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub method: Method,
    pub path: String,
}

/// Runtime data handlers need per router, carried via an Extension layer.
pub struct CrudContext {
    pub collection: &'static str,
    pub validation: HashMap<String, ValidationRule>,
}

struct ExtraRoute {
    method: Method,
    path: String,
    handler: MethodRouter<AppState>,
}

/// Normalize a route path: leading slash, no duplicate or trailing
/// separators (root stays "/"). Collisions are judged on the normalized form.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(seg);
    }
    out
}

/// Collision key for a normalized path: parameter and wildcard segments all
/// occupy the same matcher slot whatever their name, so `/:id` conflicts with
/// `/:uid` just like it would inside the router.
pub(crate) fn match_key(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    out.push('/');
    for seg in path.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        if seg.starts_with(':') || seg.starts_with('*') {
            out.push(':');
        } else {
            out.push_str(seg);
        }
    }
    out
}

pub(crate) async fn disabled_method() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn join_prefix(prefix: &str, rel: &str) -> String {
    if rel == "/" {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, rel)
    }
}

/// Builder for the generated CRUD route set of one model.
///
/// ```ignore
/// let widgets = CrudRouter::<Widget>::new()
///     .flags(RouteFlags { update: false, ..RouteFlags::all() })
///     .route(Method::POST, "/:uid/archive", post(archive_widget))
///     .build(state)?;
/// ```
pub struct CrudRouter<M: Model> {
    prefix: String,
    flags: RouteFlags,
    validation: HashMap<String, ValidationRule>,
    extra: Vec<ExtraRoute>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Default for CrudRouter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> CrudRouter<M> {
    /// Router mounted at "/{collection}".
    pub fn new() -> Self {
        Self::with_prefix(format!("/{}", M::COLLECTION))
    }

    pub fn with_prefix(prefix: impl AsRef<str>) -> Self {
        CrudRouter {
            prefix: normalize_path(prefix.as_ref()),
            flags: RouteFlags::all(),
            validation: HashMap::new(),
            extra: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Replace the route flags. The previous set does not leak: the effective
    /// routes are always exactly those implied by the last call.
    pub fn flags(mut self, flags: RouteFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the per-field validation rules applied on create and update.
    pub fn validation(mut self, rules: HashMap<String, ValidationRule>) -> Self {
        self.validation = rules;
        self
    }

    /// Add one validation rule.
    pub fn rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.validation.insert(field.into(), rule);
        self
    }

    /// Register a supplementary route (relative to the prefix) alongside the
    /// generated ones. A (method, path) collision with a generated or prior
    /// supplementary route is reported by [`route_entries`](Self::route_entries)
    /// and [`build`](Self::build).
    pub fn route(mut self, method: Method, path: &str, handler: MethodRouter<AppState>) -> Self {
        self.extra.push(ExtraRoute {
            method,
            path: normalize_path(path),
            handler,
        });
        self
    }

    fn generated(&self) -> Vec<(CrudOp, String)> {
        CrudOp::ALL
            .iter()
            .filter(|op| self.flags.enabled(**op))
            .map(|op| (*op, op.path().to_string()))
            .collect()
    }

    /// The effective route set, or the first collision found.
    pub fn route_entries(&self) -> Result<Vec<RouteEntry>, ConfigError> {
        let mut seen: HashSet<(Method, String)> = HashSet::new();
        let mut entries = Vec::new();
        for (op, path) in self.generated() {
            seen.insert((op.method(), match_key(&path)));
            entries.push(RouteEntry {
                name: op.name().to_string(),
                method: op.method(),
                path: join_prefix(&self.prefix, &path),
            });
        }
        for extra in &self.extra {
            if !seen.insert((extra.method.clone(), match_key(&extra.path))) {
                return Err(ConfigError::RouteCollision {
                    method: extra.method.to_string(),
                    path: join_prefix(&self.prefix, &extra.path),
                });
            }
            entries.push(RouteEntry {
                name: format!("{} {}", extra.method, extra.path),
                method: extra.method.clone(),
                path: join_prefix(&self.prefix, &extra.path),
            });
        }
        Ok(entries)
    }

    /// Materialize the axum router. Disabled routes are absent: requests to a
    /// disabled method answer 404, same as an unknown path.
    pub fn build(self, state: AppState) -> Result<Router, ConfigError> {
        self.route_entries()?;
        let ctx = Arc::new(CrudContext {
            collection: M::COLLECTION,
            validation: self.validation,
        });
        let mut r: Router<AppState> = Router::new();
        if self.flags.list || self.flags.create {
            let mut mr = MethodRouter::new();
            if self.flags.list {
                mr = mr.get(entity::list::<M>);
            }
            if self.flags.create {
                mr = mr.post(entity::create::<M>);
            }
            r = r.route("/", mr.fallback(disabled_method));
        }
        if self.flags.get || self.flags.update || self.flags.delete {
            let mut mr = MethodRouter::new();
            if self.flags.get {
                mr = mr.get(entity::get_one::<M>);
            }
            if self.flags.update {
                mr = mr.patch(entity::update::<M>);
            }
            if self.flags.delete {
                mr = mr.delete(entity::delete::<M>);
            }
            r = r.route("/:uid", mr.fallback(disabled_method));
        }
        for extra in self.extra {
            r = r.route(&extra.path, extra.handler);
        }
        let r = r.layer(Extension(ctx));
        let out = if self.prefix == "/" {
            r
        } else {
            Router::new().nest(&self.prefix, r)
        };
        Ok(out.with_state(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use serde::{Deserialize, Serialize};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Widget {
        name: String,
    }

    impl Model for Widget {
        const COLLECTION: &'static str = "widgets";
    }

    fn flags_from_mask(mask: u8) -> RouteFlags {
        RouteFlags {
            list: mask & 1 != 0,
            get: mask & 2 != 0,
            create: mask & 4 != 0,
            update: mask & 8 != 0,
            delete: mask & 16 != 0,
        }
    }

    fn generated_names(router: &CrudRouter<Widget>) -> Vec<String> {
        router
            .route_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    // No connection is made; handlers are never reached in these tests.
    fn test_state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/docbase_test")
            .unwrap();
        AppState::new(pool, Settings::default())
    }

    fn noop() -> MethodRouter<AppState> {
        post(|| async { StatusCode::NO_CONTENT })
    }

    #[test]
    fn every_flag_subset_yields_exactly_that_route_set() {
        for mask in 0u8..32 {
            let flags = flags_from_mask(mask);
            let router = CrudRouter::<Widget>::new().flags(flags);
            let names = generated_names(&router);
            for op in CrudOp::ALL {
                assert_eq!(
                    names.contains(&op.name().to_string()),
                    flags.enabled(op),
                    "mask {:#07b}, op {}",
                    mask,
                    op.name()
                );
            }
            assert_eq!(names.len(), mask.count_ones() as usize);
        }
    }

    #[test]
    fn reapplying_flags_replaces_previous_set() {
        let first = RouteFlags {
            update: false,
            ..RouteFlags::all()
        };
        let second = RouteFlags {
            delete: false,
            ..RouteFlags::all()
        };
        let reconfigured = CrudRouter::<Widget>::new().flags(first).flags(second);
        let direct = CrudRouter::<Widget>::new().flags(second);
        assert_eq!(
            reconfigured.route_entries().unwrap(),
            direct.route_entries().unwrap()
        );
        // update came back, delete went away; nothing merged
        let names = generated_names(&reconfigured);
        assert!(names.contains(&"update".to_string()));
        assert!(!names.contains(&"delete".to_string()));
    }

    #[test]
    fn supplementary_route_joins_generated_set() {
        let router =
            CrudRouter::<Widget>::new().route(Method::POST, "/:uid/archive", noop());
        let entries = router.route_entries().unwrap();
        assert_eq!(entries.len(), 6);
        assert!(entries
            .iter()
            .any(|e| e.method == Method::POST && e.path == "/widgets/:uid/archive"));
        assert!(entries.iter().any(|e| e.name == "list"));
    }

    #[test]
    fn supplementary_collision_with_generated_route_is_rejected() {
        let router = CrudRouter::<Widget>::new().route(Method::PATCH, "/:uid", noop());
        match router.route_entries() {
            Err(ConfigError::RouteCollision { method, path }) => {
                assert_eq!(method, "PATCH");
                assert_eq!(path, "/widgets/:uid");
            }
            other => panic!("expected collision, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn collision_clears_when_generated_route_is_disabled() {
        let router = CrudRouter::<Widget>::new()
            .flags(RouteFlags {
                update: false,
                ..RouteFlags::all()
            })
            .route(Method::PATCH, "/:uid", noop());
        assert!(router.route_entries().is_ok());
    }

    #[tokio::test]
    async fn parameter_name_does_not_evade_collision_detection() {
        // same matcher slot as the generated GET /:uid
        let router = CrudRouter::<Widget>::new().route(Method::GET, "/:id", noop_get());
        assert!(matches!(
            router.route_entries(),
            Err(ConfigError::RouteCollision { .. })
        ));
        let err = CrudRouter::<Widget>::new()
            .route(Method::GET, "/:id", noop_get())
            .build(test_state())
            .unwrap_err();
        assert!(matches!(err, ConfigError::RouteCollision { .. }));
    }

    #[test]
    fn supplementary_params_collide_across_names() {
        let router = CrudRouter::<Widget>::new()
            .route(Method::POST, "/:uid/run", noop())
            .route(Method::POST, "/:id/run", noop());
        assert!(matches!(
            router.route_entries(),
            Err(ConfigError::RouteCollision { .. })
        ));
    }

    #[test]
    fn match_key_merges_param_names_only() {
        assert_eq!(match_key("/:uid"), "/:");
        assert_eq!(match_key("/:id/run"), "/:/run");
        assert_eq!(match_key("/mine"), "/mine");
        assert_eq!(match_key("/"), "/");
    }

    #[test]
    fn supplementary_routes_collide_with_each_other() {
        let router = CrudRouter::<Widget>::new()
            .route(Method::POST, "/worker/run", noop())
            .route(Method::POST, "worker//run/", noop());
        assert!(matches!(
            router.route_entries(),
            Err(ConfigError::RouteCollision { .. })
        ));
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("worker//status/"), "/worker/status");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/widgets"), "/widgets");
    }

    #[test]
    fn widget_scenario_route_set() {
        let router = CrudRouter::<Widget>::new().flags(RouteFlags {
            update: false,
            ..RouteFlags::all()
        });
        let names = generated_names(&router);
        assert_eq!(names, vec!["list", "get", "create", "delete"]);
    }

    #[tokio::test]
    async fn disabled_update_route_is_a_framework_404() {
        let app = CrudRouter::<Widget>::new()
            .flags(RouteFlags {
                update: false,
                ..RouteFlags::all()
            })
            .build(test_state())
            .unwrap();
        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/widgets/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disabled_list_route_is_a_framework_404() {
        let app = CrudRouter::<Widget>::new()
            .flags(RouteFlags {
                list: false,
                ..RouteFlags::all()
            })
            .build(test_state())
            .unwrap();
        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/widgets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_with_unsafe_field_name_is_a_bad_request() {
        let app = CrudRouter::<Widget>::new().build(test_state()).unwrap();
        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/widgets/00000000-0000-0000-0000-000000000000")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"bad-name": 1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn supplementary_route_is_served() {
        let app = CrudRouter::<Widget>::new()
            .route(Method::POST, "/:uid/archive", noop())
            .build(test_state())
            .unwrap();
        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/widgets/00000000-0000-0000-0000-000000000000/archive")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn build_surfaces_collision_instead_of_panicking() {
        let err = CrudRouter::<Widget>::new()
            .route(Method::GET, "/", noop_get())
            .build(test_state())
            .unwrap_err();
        assert!(matches!(err, ConfigError::RouteCollision { .. }));
    }

    fn noop_get() -> MethodRouter<AppState> {
        get(|| async { StatusCode::NO_CONTENT })
    }
}
