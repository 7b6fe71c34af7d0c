//! Guard for the settlement collaborator's endpoints.
//!
//! Requests must carry `X-API-Key` equal to the configured settlement key.
//! Without a configured key the endpoints are closed.

use crate::http::ApiError;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time string comparison.
///
/// Both inputs are padded to the longer length with different fill bytes so
/// neither the content nor the length leaks through timing.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

#[derive(Clone)]
pub struct SettlementKeyLayer {
    api_key: Option<Arc<str>>,
}

impl SettlementKeyLayer {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key.map(Arc::from),
        }
    }
}

impl<S> Layer<S> for SettlementKeyLayer {
    type Service = SettlementKeyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SettlementKeyService {
            inner,
            api_key: self.api_key.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SettlementKeyService<S> {
    inner: S,
    api_key: Option<Arc<str>>,
}

/// Why a request was turned away, if it was.
fn check_api_key<B>(req: &Request<B>, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "settlement_disabled",
            "Settlement endpoint is not configured",
        ));
    };
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match presented {
        Some(key) if constant_time_compare(key, expected) => Ok(()),
        _ => Err(ApiError::unauthorized("invalid_api_key", "Invalid or missing API key")),
    }
}

impl<S> Service<Request<Body>> for SettlementKeyService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let verdict = check_api_key(&req, self.api_key.as_deref());
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match verdict {
                Ok(()) => inner.call(req).await,
                Err(err) => {
                    warn!(path = %req.uri().path(), code = err.code, "Settlement request rejected");
                    Ok(err.into_response())
                }
            }
        })
    }
}
