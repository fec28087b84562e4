// handlers/mod.rs - Classroom API handlers
//
// Reads are scoped by the unsigned `start_param` (ReadScope) and degrade to an
// empty or default payload. Writes take a WriteAccess, which has already
// verified the signature and the caller's role.

pub mod announcements;
pub mod assignments;
pub mod auth;
pub mod calendar;
pub mod courses;
pub mod schedule;

use serde::Deserialize;

use crate::error::ApiError;

/// `?id=` on DELETE requests.
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn require(&self) -> Result<i32, ApiError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::bad_request("id is required"))?;
        raw.parse()
            .map_err(|_| ApiError::invalid_field("id", format!("'{}' is not a valid id", raw)))
    }
}

/// Trimmed text, with blank treated as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Collects required fields that are missing, then fails once with all of them.
#[derive(Debug, Default)]
pub(crate) struct Required {
    missing: Vec<&'static str>,
}

impl Required {
    pub fn text(&mut self, field: &'static str, value: Option<String>) -> String {
        match non_empty(value) {
            Some(v) => v,
            None => {
                self.missing.push(field);
                String::new()
            }
        }
    }

    pub fn id(&mut self, field: &'static str, value: Option<i32>) -> i32 {
        match value {
            Some(v) => v,
            None => {
                self.missing.push(field);
                0
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::missing_fields(&self.missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_query_requires_a_number() {
        assert_eq!(IdQuery { id: Some(" 12 ".into()) }.require().unwrap(), 12);
        assert_eq!(IdQuery { id: None }.require().unwrap_err().status_code(), 400);
        assert_eq!(IdQuery { id: Some("".into()) }.require().unwrap_err().status_code(), 400);
        assert_eq!(
            IdQuery { id: Some("abc".into()) }.require().unwrap_err().error_code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn required_reports_every_missing_field() {
        let mut required = Required::default();
        assert_eq!(required.text("title", Some("  Lab 1 ".into())), "Lab 1");
        required.text("dueDate", Some("   ".into()));
        required.id("courseId", None);
        let body = required.finish().unwrap_err().to_json();
        assert!(body["field_errors"].get("dueDate").is_some());
        assert!(body["field_errors"].get("courseId").is_some());
        assert!(body["field_errors"].get("title").is_none());
    }
}
