// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request extractors that report malformed input as `400 bad_request`.

use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body extractor; deserialization failures become [`AppError::BadRequest`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor; deserialization failures become [`AppError::BadRequest`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
