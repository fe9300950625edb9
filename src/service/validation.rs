//! Request validation from per-field rules attached to a router.

use crate::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declarative constraints for one payload field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    /// "email" or "uuid".
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full body against the rules. All required fields must be present.
    pub fn validate(
        body: &serde_json::Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (field, rule) in rules {
            let val = body.get(field);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required is not
    /// enforced for missing fields.
    pub fn validate_partial(
        body: &serde_json::Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (field, v) in body {
            if let Some(rule) = rules.get(field) {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(field, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.len() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    field, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.len() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    field, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern)
            .map_err(|_| AppError::Validation(format!("invalid pattern for {}", field)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!(
                    "{} does not match required pattern",
                    field
                )));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                field,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!(
                    "{} must be at least {}",
                    field, min
                )));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!(
                    "{} must be at most {}",
                    field, max
                )));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!(
                        "{} must be a valid email",
                        field
                    )));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!(
                        "{} must be a valid UUID",
                        field
                    )));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(field: &str, rule: ValidationRule) -> HashMap<String, ValidationRule> {
        let mut m = HashMap::new();
        m.insert(field.to_string(), rule);
        m
    }

    fn body(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn required_enforced_on_full_body_only() {
        let r = rules(
            "name",
            ValidationRule {
                required: Some(true),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body(json!({})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"name": "x"})), &r).is_ok());
        // PATCH semantics: absent fields are not required
        assert!(RequestValidator::validate_partial(&body(json!({})), &r).is_ok());
    }

    #[test]
    fn length_and_pattern() {
        let r = rules(
            "code",
            ValidationRule {
                min_length: Some(2),
                max_length: Some(4),
                pattern: Some("^[A-Z]+$".into()),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body(json!({"code": "AB"})), &r).is_ok());
        assert!(RequestValidator::validate(&body(json!({"code": "A"})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"code": "ABCDE"})), &r).is_err());
        assert!(RequestValidator::validate(&body(json!({"code": "ab"})), &r).is_err());
    }

    #[test]
    fn allowed_compares_numbers_loosely() {
        let r = rules(
            "size",
            ValidationRule {
                allowed: Some(vec![json!(1), json!(2)]),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body(json!({"size": 1.0})), &r).is_ok());
        assert!(RequestValidator::validate(&body(json!({"size": 3})), &r).is_err());
    }

    #[test]
    fn range_and_formats() {
        let r = rules(
            "price",
            ValidationRule {
                minimum: Some(0.0),
                maximum: Some(100.0),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(&body(json!({"price": 5})), &r).is_ok());
        assert!(RequestValidator::validate(&body(json!({"price": -1})), &r).is_err());

        let r = rules(
            "owner",
            ValidationRule {
                format: Some("uuid".into()),
                ..Default::default()
            },
        );
        assert!(RequestValidator::validate(
            &body(json!({"owner": "00000000-0000-0000-0000-000000000000"})),
            &r
        )
        .is_ok());
        assert!(RequestValidator::validate(&body(json!({"owner": "nope"})), &r).is_err());
    }
}
