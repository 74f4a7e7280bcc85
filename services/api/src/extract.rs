//! Extractors whose rejections render as [`CardHubError`] JSON bodies.
//!
//! axum's stock `Json`, `Query` and `Path` reject with plain-text 4xx
//! responses; these wrappers route every rejection through the API error
//! taxonomy instead.

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use cardhub_utils::CardHubError;
use serde::Serialize;

/// JSON request body, and JSON response body.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(CardHubError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(CardHubError))]
pub struct Query<T>(pub T);

#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(CardHubError))]
pub struct Path<T>(pub T);
