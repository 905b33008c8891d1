// SPDX-License-Identifier: MIT
// Copyright 2026 The Futurecard Authors

//! Security headers middleware.
//!
//! The CSP allows Google's sign-in script on the index page and nothing
//! else; every other route only ever returns JSON or plain text.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; script-src https://apis.google.com; connect-src 'self'; frame-ancestors 'none'";

/// Add security headers to all responses.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("accelerometer=(), camera=(), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()"),
    );

    response
}
