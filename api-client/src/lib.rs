//! Shared HTTP plumbing for the Azure service clients.
//!
//! Each service crate wraps an [`ApiClient`] with its own [`Authentication`]
//! and models. Requests are built with [`RequestBuilder`] and come back as
//! [`ApiResponse`].

#![allow(clippy::arc_with_non_send_sync)]

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
pub use secret::Secret;
use tower::ServiceExt;

mod authentication;
pub mod error;
pub mod mock;
pub mod request;
pub mod response;
pub mod uri;

pub use self::authentication::{
    Authentication, AuthenticationLayer, AuthenticationService, BearerAuth,
};
pub use self::error::{Error, HttpResponseError};
pub use self::request::RequestBuilder;
pub use self::response::ApiResponse;
use self::uri::UriExtension as _;

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients.
#[derive(Debug, Clone)]
pub struct ApiClient<A> {
    base: Arc<Uri>,
    inner: hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>,
    authentication: Arc<ArcSwap<A>>,
}

impl<A> ApiClient<A>
where
    A: Authentication + Send + Sync + 'static,
{
    /// Create a new API Client from a base URL and an authentication method
    pub fn new(base: Uri, authentication: A) -> Self {
        let authentication = Arc::new(ArcSwap::new(Arc::new(authentication)));
        let inner = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .layer(AuthenticationLayer::new(authentication.clone()))
            .build_service();

        ApiClient {
            base: Arc::new(base),
            inner,
            authentication,
        }
    }

    /// Create a new API Client which sends requests through `inner`.
    ///
    /// Tests use this with [`mock::MockService`].
    pub fn new_with_inner_service<S>(base: Uri, authentication: A, inner: S) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let authentication = Arc::new(ArcSwap::new(Arc::new(authentication)));

        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .layer(AuthenticationLayer::new(authentication.clone()))
            .service(inner);

        ApiClient {
            base: Arc::new(base),
            inner: service,
            authentication,
        }
    }

    /// Replace the authentication for subsequent requests.
    pub fn refresh_auth(&self, authentication: A) {
        self.authentication.store(Arc::new(authentication));
    }
}

impl<A> ApiClient<A> {
    /// The base URI requests are resolved against.
    pub fn base(&self) -> Uri {
        (*self.base).clone()
    }
}

impl<A> ApiClient<A>
where
    A: Authentication,
{
    /// Build a GET request against an endpoint relative to the base URI.
    pub fn get(&self, endpoint: &str) -> RequestBuilder<A> {
        RequestBuilder::new(self.clone(), self.base().join(endpoint), Method::GET)
    }

    /// Build a POST request against an endpoint relative to the base URI.
    pub fn post(&self, endpoint: &str) -> RequestBuilder<A> {
        RequestBuilder::new(self.clone(), self.base().join(endpoint), Method::POST)
    }

    /// Send a fully built request through the client.
    pub async fn execute(&self, req: http::Request<hyperdriver::Body>) -> Result<ApiResponse, Error> {
        let method = req.method().clone();
        let uri = req.uri().clone();

        tracing::trace!(%method, %uri, "sending request");
        let response = self.inner.clone().oneshot(req).await?;
        tracing::trace!(status = %response.status(), %uri, "received response");

        Ok(ApiResponse::new(response))
    }
}
