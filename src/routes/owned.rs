//! Ownership-authorized CRUD router: same flags / supplementary-route /
//! collision contract as [`CrudRouter`](crate::routes::CrudRouter), with every
//! handler gated by a consumer-supplied authenticator and a `/mine` route for
//! the caller's own documents.

use crate::auth::{Authenticator, OwnerAttr, UserClaims};
use crate::error::{AppError, ConfigError};
use crate::handlers::owned;
use crate::model::Model;
use crate::routes::crud::{
    disabled_method, match_key, normalize_path, CrudOp, RouteEntry, RouteFlags,
};
use crate::service::ValidationRule;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Method},
    routing::{get, MethodRouter},
    Extension, Router,
};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// Behavior switches beyond the route flags.
#[derive(Clone, Debug)]
pub struct OwnedRouterOptions {
    /// Owners may read and list their own documents without a scope.
    pub self_access: bool,
    /// Generate the GET /mine route.
    pub include_mine: bool,
    /// Create an empty owned document when /mine finds none.
    pub create_mine_if_missing: bool,
    /// /mine returns the single owned document instead of a page.
    pub unique_per_user: bool,
    /// Resource name in scope paths; defaults to the collection name.
    pub resource: Option<String>,
}

impl Default for OwnedRouterOptions {
    fn default() -> Self {
        OwnedRouterOptions {
            self_access: true,
            include_mine: true,
            create_mine_if_missing: false,
            unique_per_user: false,
            resource: None,
        }
    }
}

/// Per-router context for the owned handlers, carried via an Extension layer.
pub struct OwnedContext {
    pub authenticator: Arc<dyn Authenticator>,
    pub owner_attr: OwnerAttr,
    pub options: OwnedRouterOptions,
    pub validation: HashMap<String, ValidationRule>,
    pub collection: &'static str,
}

impl OwnedContext {
    pub fn resource(&self) -> &str {
        self.options.resource.as_deref().unwrap_or(self.collection)
    }
}

/// Claims extractor for owned routes. Runs the router's authenticator;
/// rejections surface as the authenticator's error (typically 401).
pub struct Authenticated(pub UserClaims);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<Arc<OwnedContext>>()
            .cloned()
            .ok_or_else(|| {
                AppError::Config(ConfigError::Load("owned router context missing".into()))
            })?;
        let claims = ctx.authenticator.authenticate(parts).await?;
        Ok(Authenticated(claims))
    }
}

struct ExtraRoute {
    method: Method,
    path: String,
    handler: MethodRouter<AppState>,
}

pub struct OwnedCrudRouter<M: Model> {
    prefix: String,
    flags: RouteFlags,
    owner_attr: OwnerAttr,
    options: OwnedRouterOptions,
    validation: HashMap<String, ValidationRule>,
    authenticator: Arc<dyn Authenticator>,
    extra: Vec<ExtraRoute>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> OwnedCrudRouter<M> {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        OwnedCrudRouter {
            prefix: normalize_path(&format!("/{}", M::COLLECTION)),
            flags: RouteFlags::all(),
            owner_attr: OwnerAttr::UserId,
            options: OwnedRouterOptions::default(),
            validation: HashMap::new(),
            authenticator,
            extra: Vec::new(),
            _model: PhantomData,
        }
    }

    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = normalize_path(prefix.as_ref());
        self
    }

    /// Replace the route flags; the previous set does not leak.
    pub fn flags(mut self, flags: RouteFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn owner_attr(mut self, owner_attr: OwnerAttr) -> Self {
        self.owner_attr = owner_attr;
        self
    }

    pub fn options(mut self, options: OwnedRouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validation(mut self, rules: HashMap<String, ValidationRule>) -> Self {
        self.validation = rules;
        self
    }

    /// Register a supplementary route; same collision contract as
    /// [`CrudRouter::route`](crate::routes::CrudRouter::route).
    pub fn route(mut self, method: Method, path: &str, handler: MethodRouter<AppState>) -> Self {
        self.extra.push(ExtraRoute {
            method,
            path: normalize_path(path),
            handler,
        });
        self
    }

    fn join(&self, rel: &str) -> String {
        if rel == "/" {
            self.prefix.clone()
        } else {
            format!("{}{}", self.prefix, rel)
        }
    }

    pub fn route_entries(&self) -> Result<Vec<RouteEntry>, ConfigError> {
        let mut seen: HashSet<(Method, String)> = HashSet::new();
        let mut entries = Vec::new();
        for op in CrudOp::ALL {
            if !self.flags.enabled(op) {
                continue;
            }
            seen.insert((op.method(), match_key(op.path())));
            entries.push(RouteEntry {
                name: op.name().to_string(),
                method: op.method(),
                path: self.join(op.path()),
            });
        }
        if self.options.include_mine {
            seen.insert((Method::GET, match_key("/mine")));
            entries.push(RouteEntry {
                name: "mine".to_string(),
                method: Method::GET,
                path: self.join("/mine"),
            });
        }
        for extra in &self.extra {
            if !seen.insert((extra.method.clone(), match_key(&extra.path))) {
                return Err(ConfigError::RouteCollision {
                    method: extra.method.to_string(),
                    path: self.join(&extra.path),
                });
            }
            entries.push(RouteEntry {
                name: format!("{} {}", extra.method, extra.path),
                method: extra.method.clone(),
                path: self.join(&extra.path),
            });
        }
        Ok(entries)
    }

    pub fn build(self, state: AppState) -> Result<Router, ConfigError> {
        self.route_entries()?;
        let ctx = Arc::new(OwnedContext {
            authenticator: self.authenticator,
            owner_attr: self.owner_attr,
            options: self.options,
            validation: self.validation,
            collection: M::COLLECTION,
        });
        let mut r: Router<AppState> = Router::new();
        if ctx.options.include_mine {
            r = r.route("/mine", get(owned::mine::<M>).fallback(disabled_method));
        }
        if self.flags.list || self.flags.create {
            let mut mr = MethodRouter::new();
            if self.flags.list {
                mr = mr.get(owned::list::<M>);
            }
            if self.flags.create {
                mr = mr.post(owned::create::<M>);
            }
            r = r.route("/", mr.fallback(disabled_method));
        }
        if self.flags.get || self.flags.update || self.flags.delete {
            let mut mr = MethodRouter::new();
            if self.flags.get {
                mr = mr.get(owned::get_one::<M>);
            }
            if self.flags.update {
                mr = mr.patch(owned::update::<M>);
            }
            if self.flags.delete {
                mr = mr.delete(owned::delete::<M>);
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
