//! Request extractors whose rejections use the API error envelope.

use axum::extract::FromRequest;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::Error;

/// JSON body extractor and response.
///
/// Same as `axum::Json`, except a body that fails to parse is answered with
/// a 400 `{"error": ...}` payload instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}
