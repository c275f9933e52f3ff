//! Admission middleware service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::connect_info::MockConnectInfo;
use axum::extract::ConnectInfo;
use futures::future::{ready, Either, Ready};
use http::{Request, Response, StatusCode};
use tower::Service;
use tracing::{debug, warn};

use super::layer::{RequestLimitLayer, Shared};
use crate::ratelimit::{ClientIdentity, Decision, LimitConfig, WindowCounterStore};

/// Origin address of a request in `host:port` form.
///
/// Servers that do not go through axum's connect info insert this as a
/// request extension. It takes precedence over
/// [`ConnectInfo<SocketAddr>`](axum::extract::ConnectInfo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// Middleware that admits or rejects each request based on its client's
/// budget in the current window.
///
/// Admitted requests reach the inner service untouched. Rejected requests get
/// an empty `429 Too Many Requests` and never reach it.
pub struct RequestLimit<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> RequestLimit<S> {
    /// Wrap `inner` with a fresh limiter enforcing `limits`.
    pub fn new(inner: S, limits: LimitConfig) -> Self {
        tower::Layer::layer(&RequestLimitLayer::new(limits), inner)
    }

    pub(crate) fn from_shared(inner: S, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    /// Get the store deciding admissions for this service.
    pub fn store(&self) -> &Arc<WindowCounterStore> {
        &self.shared.store
    }

    /// Get a reference to the inner service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the middleware, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Clone> Clone for RequestLimit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

/// Derive the client identity from the request's origin address.
///
/// Looks at [`RemoteAddr`] first, then axum's connect info, falling back to
/// [`MockConnectInfo`] the same way axum's own extractor does.
pub fn client_identity<B>(request: &Request<B>) -> Option<ClientIdentity> {
    let extensions = request.extensions();

    if let Some(RemoteAddr(addr)) = extensions.get::<RemoteAddr>() {
        return ClientIdentity::from_remote_addr(addr);
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
        .map(|addr| ClientIdentity::from_ip(addr.ip()))
}

fn status_response<B: Default>(status: StatusCode) -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = status;
    response
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLimit<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Default,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Either<S::Future, Ready<Result<Response<ResBody>, S::Error>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let Some(identity) = client_identity(&request) else {
            warn!(
                method = %request.method(),
                "Request has no origin address, cannot attribute it to a client"
            );
            return Either::Right(ready(Ok(status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
            ))));
        };

        match self.shared.store.admit(&identity) {
            Decision::Allowed => Either::Left(self.inner.call(request)),
            Decision::Denied => {
                debug!(identity = %identity, "Rejecting request over limit");
                Either::Right(ready(Ok(status_response(StatusCode::TOO_MANY_REQUESTS))))
            }
        }
    }
}
