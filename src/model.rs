//! Consumer-supplied model types and the stored document envelope.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A consumer model persisted as a JSON document. The SDK never looks inside
/// the payload except for filter fields named by the caller.
///
/// `COLLECTION` names the backing table and must be a safe SQL identifier
/// (letters, digits, underscore; see [`crate::sql::is_safe_ident`]).
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
}

/// Stored envelope around a model payload. The payload is flattened into the
/// JSON representation, so clients see `uid`, timestamps and the model fields
/// as one object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document<M> {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub data: M,
}

impl<M: Model> Document<M> {
    /// Fresh envelope with a v4 uid and current timestamps.
    pub fn new(data: M, tenant_id: Option<String>) -> Self {
        let now = Utc::now();
        Document {
            uid: Uuid::new_v4(),
            tenant_id,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Widget {
        name: String,
    }

    impl Model for Widget {
        const COLLECTION: &'static str = "widgets";
    }

    #[test]
    fn payload_is_flattened() {
        let doc = Document::new(
            Widget {
                name: "anvil".into(),
            },
            None,
        );
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["name"], "anvil");
        assert!(v.get("data").is_none());
        assert!(v.get("uid").is_some());
        assert!(v.get("tenant_id").is_none());
    }

    #[test]
    fn new_documents_are_live() {
        let doc = Document::new(
            Widget {
                name: "anvil".into(),
            },
            Some("acme".into()),
        );
        assert!(!doc.is_deleted);
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.tenant_id.as_deref(), Some("acme"));
    }
}
