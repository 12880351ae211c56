//! Logging things
//!

use std::time::Duration;

use axum::{http::header::CONTENT_LENGTH, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{OnRequest, OnResponse, TraceLayer},
};
use stashes_shared::USER_HEADER;
use tracing::{trace, Span};

/// Request spans carry the caller from [`USER_HEADER`] so a file write can be
/// traced back to its author.
#[derive(Copy, Clone)]
pub(crate) struct StashSpanner {}

/// The caller as sent, unverified. The extractor does the checking.
fn caller<B>(request: &axum::http::Request<B>) -> &str {
    request
        .headers()
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

impl<B> tower_http::trace::MakeSpan<B> for StashSpanner {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            user = %caller(request),
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty
        )
    }
}

impl<B> OnRequest<B> for StashSpanner {
    fn on_request(&mut self, _request: &axum::http::Request<B>, _span: &Span) {
        trace!("request received");
    }
}

impl<B> OnResponse<B> for StashSpanner {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        span.record("status", response.status().as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if let Some(content_length) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            span.record("bytes", content_length);
        }
        if response.status().is_server_error() {
            tracing::event!(tracing::Level::WARN, "response sent");
        } else {
            tracing::event!(tracing::Level::INFO, "response sent");
        }
    }
}

pub(crate) fn logging_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, StashSpanner, StashSpanner, StashSpanner>
{
    TraceLayer::new_for_http()
        .on_request(StashSpanner {})
        .make_span_with(StashSpanner {})
        .on_response(StashSpanner {})
}
