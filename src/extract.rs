//! Request extractors whose rejections use the `{"error": ...}` body.
//!
//! axum's own `Json` and `Path` reject with plain-text bodies and a mix of
//! 400, 415 and 422 statuses; these wrappers route every rejection through
//! [`AppError::Validation`].

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);
