//! Service settings, read from env. All fields have usable defaults so a
//! consumer can start with `Settings::default()` and override per deployment.

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Service name, reported by /version. Env: PROJECT_NAME.
    pub project_name: String,
    /// Prefix under which all routes are mounted (e.g. "/api/v1"). Empty for root. Env: BASE_PATH.
    pub base_path: String,
    /// Upper bound for the `limit` query parameter on list routes. Env: PAGE_MAX_LIMIT.
    pub page_max_limit: u32,
    /// Request body size cap in bytes. Env: BODY_LIMIT_BYTES.
    pub body_limit_bytes: usize,
    /// Namespace segment of scope resource paths. Env: AUTH_NAMESPACE.
    pub auth_namespace: String,
    /// Service segment of scope resource paths. Defaults to project_name. Env: AUTH_SERVICE.
    pub auth_service: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            project_name: "docbase".into(),
            base_path: String::new(),
            page_max_limit: 100,
            body_limit_bytes: 2 * 1024 * 1024,
            auth_namespace: String::new(),
            auth_service: "docbase".into(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        let project_name = env_or("PROJECT_NAME", &defaults.project_name);
        let auth_service = env_or("AUTH_SERVICE", &project_name);
        Settings {
            base_path: env_or("BASE_PATH", &defaults.base_path),
            page_max_limit: std::env::var("PAGE_MAX_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.page_max_limit),
            body_limit_bytes: std::env::var("BODY_LIMIT_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.body_limit_bytes),
            auth_namespace: env_or("AUTH_NAMESPACE", &defaults.auth_namespace),
            auth_service,
            project_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let s = Settings::default();
        assert_eq!(s.project_name, "docbase");
        assert_eq!(s.page_max_limit, 100);
        assert!(s.base_path.is_empty());
        assert_eq!(s.auth_service, "docbase");
    }
}
