// src/response.rs

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response envelope shared by every endpoint, success or failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }
}

impl ApiResponse<Value> {
    /// Success with no payload, only a message for the user.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Value::Array(Vec::new()),
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Array(Vec::new()),
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Offset pagination input. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    /// Saturates instead of overflowing for absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of a listing, shaped like a length-aware paginator.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: i64) -> Self {
        let last_page = ((total + request.per_page - 1) / request.per_page).max(1);
        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_to_first_page() {
        let req = PageRequest::new(Some(0), 20);
        assert_eq!(req.page, 1);
        assert_eq!(req.offset(), 0);
        assert_eq!(PageRequest::new(Some(3), 10).offset(), 20);
    }

    #[test]
    fn huge_page_saturates_the_offset() {
        let req = PageRequest::new(Some(i64::MAX), 20);
        assert_eq!(req.offset(), i64::MAX);
    }

    #[test]
    fn last_page_rounds_up_and_never_hits_zero() {
        let req = PageRequest::new(None, 10);
        assert_eq!(Page::<i64>::new(vec![], req, 0).last_page, 1);
        assert_eq!(Page::<i64>::new(vec![], req, 10).last_page, 1);
        assert_eq!(Page::<i64>::new(vec![], req, 11).last_page, 2);
    }

    #[test]
    fn failure_envelope_has_empty_data() {
        let body = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "data": [], "message": "nope"})
        );
    }

    #[test]
    fn ok_envelope_omits_message() {
        let body = serde_json::to_value(ApiResponse::ok(5)).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 5}));
    }
}
