//! Ownership authorization for generated routes. Token verification itself is
//! external: consumers implement [`Authenticator`] and the SDK decides access
//! from the returned claims.

use crate::error::AppError;
use crate::settings::Settings;
use async_trait::async_trait;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// Claims resolved from a request by a consumer-supplied [`Authenticator`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Scope strings of the form `action:namespace/service/resource`, with
    /// `*` allowed for the action and for any path segment.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Resolves user claims from request headers. Implementations typically
/// verify a bearer token or API key against an external identity service.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, parts: &mut Parts) -> Result<UserClaims, AppError>;
}

/// Which payload field records ownership, and how the owner id is derived
/// from claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerAttr {
    /// Field `user_id`; owner id is the user id.
    UserId,
    /// Field `owner_id`; owner id is the workspace id, falling back to the
    /// user id for callers without a workspace.
    OwnerId,
}

impl OwnerAttr {
    pub fn field(&self) -> &'static str {
        match self {
            OwnerAttr::UserId => "user_id",
            OwnerAttr::OwnerId => "owner_id",
        }
    }

    pub fn owner_id(&self, claims: &UserClaims) -> String {
        match self {
            OwnerAttr::UserId => claims.user_id.clone(),
            OwnerAttr::OwnerId => claims
                .workspace_id
                .clone()
                .unwrap_or_else(|| claims.user_id.clone()),
        }
    }
}

/// Scope resource path: `{namespace}/{service}/{resource}`, leading slashes
/// stripped when the namespace is empty.
pub fn resource_path(settings: &Settings, resource: &str) -> String {
    format!(
        "{}/{}/{}",
        settings.auth_namespace, settings.auth_service, resource
    )
    .trim_start_matches('/')
    .to_string()
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some((last, prefix)) = pat.split_last() {
        if *last == "*" && prefix.len() <= segs.len() {
            return prefix.iter().zip(&segs).all(|(p, s)| *p == "*" || p == s);
        }
    }
    pat.len() == segs.len() && pat.iter().zip(&segs).all(|(p, s)| *p == "*" || p == s)
}

/// Whether one scope string grants `action` on `resource`.
pub fn scope_matches(scope: &str, action: &str, resource: &str) -> bool {
    if scope == "*" {
        return true;
    }
    let Some((scope_action, scope_path)) = scope.split_once(':') else {
        return false;
    };
    if scope_action != "*" && scope_action != action {
        return false;
    }
    path_matches(scope_path, resource)
}

pub fn has_scope(claims: &UserClaims, action: &str, resource: &str) -> bool {
    claims
        .scopes
        .iter()
        .any(|s| scope_matches(s, action, resource))
}

/// Permit when the caller owns the resource or holds a matching scope.
pub fn authorize(
    claims: &UserClaims,
    action: &str,
    resource: &str,
    owner_attr: OwnerAttr,
    owner_value: Option<&str>,
) -> Result<(), AppError> {
    if owner_value == Some(owner_attr.owner_id(claims).as_str()) {
        return Ok(());
    }
    if has_scope(claims, action, resource) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "user {} is not authorized to {} {}",
        claims.user_id, action, resource
    )))
}

/// How a list request is scoped for the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListScope {
    /// A matching read scope: no ownership filter.
    All,
    /// Self access only: filter on the owner field with this value.
    Owner(String),
}

/// Decide list scoping: scope holders see everything, owners see their own,
/// anyone else is rejected.
pub fn list_scope(
    claims: &UserClaims,
    resource: &str,
    owner_attr: OwnerAttr,
    self_access: bool,
) -> Result<ListScope, AppError> {
    if has_scope(claims, "read", resource) {
        return Ok(ListScope::All);
    }
    if self_access {
        return Ok(ListScope::Owner(owner_attr.owner_id(claims)));
    }
    Err(AppError::Forbidden(
        "you are not authorized to access this resource".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(scopes: &[&str]) -> UserClaims {
        UserClaims {
            user_id: "u1".into(),
            workspace_id: Some("w1".into()),
            tenant_id: None,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn scope_grammar() {
        assert!(scope_matches("read:acme/shop/widgets", "read", "acme/shop/widgets"));
        assert!(scope_matches("*:acme/shop/widgets", "delete", "acme/shop/widgets"));
        assert!(scope_matches("read:acme/*/widgets", "read", "acme/shop/widgets"));
        assert!(scope_matches("read:acme/*", "read", "acme/shop/widgets"));
        assert!(scope_matches("*", "update", "anything/at/all"));
        assert!(!scope_matches("read:acme/shop/widgets", "update", "acme/shop/widgets"));
        assert!(!scope_matches("read:acme/shop/orders", "read", "acme/shop/widgets"));
        assert!(!scope_matches("read", "read", "acme/shop/widgets"));
    }

    #[test]
    fn owner_attr_derivation() {
        let c = claims(&[]);
        assert_eq!(OwnerAttr::UserId.owner_id(&c), "u1");
        assert_eq!(OwnerAttr::OwnerId.owner_id(&c), "w1");
        let mut c = c;
        c.workspace_id = None;
        assert_eq!(OwnerAttr::OwnerId.owner_id(&c), "u1");
    }

    #[test]
    fn authorize_owner_or_scope() {
        let c = claims(&[]);
        assert!(authorize(&c, "read", "acme/shop/widgets", OwnerAttr::UserId, Some("u1")).is_ok());
        assert!(authorize(&c, "read", "acme/shop/widgets", OwnerAttr::UserId, Some("u2")).is_err());

        let c = claims(&["read:acme/shop/widgets"]);
        assert!(authorize(&c, "read", "acme/shop/widgets", OwnerAttr::UserId, Some("u2")).is_ok());
        assert!(authorize(&c, "delete", "acme/shop/widgets", OwnerAttr::UserId, Some("u2")).is_err());
    }

    #[test]
    fn list_scoping() {
        let c = claims(&["read:acme/shop/widgets"]);
        assert_eq!(
            list_scope(&c, "acme/shop/widgets", OwnerAttr::UserId, true).unwrap(),
            ListScope::All
        );

        let c = claims(&[]);
        assert_eq!(
            list_scope(&c, "acme/shop/widgets", OwnerAttr::UserId, true).unwrap(),
            ListScope::Owner("u1".into())
        );
        assert!(list_scope(&c, "acme/shop/widgets", OwnerAttr::UserId, false).is_err());
    }

    #[test]
    fn resource_path_handles_empty_namespace() {
        let mut s = Settings::default();
        s.auth_namespace = String::new();
        s.auth_service = "shop".into();
        assert_eq!(resource_path(&s, "widgets"), "shop/widgets");
        s.auth_namespace = "acme".into();
        assert_eq!(resource_path(&s, "widgets"), "acme/shop/widgets");
    }
}
