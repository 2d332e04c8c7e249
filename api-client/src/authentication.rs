//! Authentication for API clients.
//!
//! The `Authentication` trait is applied to every request sent by an `ApiClient`.
//!
//! Two implementations are provided here:
//! - `BearerAuth` for OAuth2 bearer tokens
//! - `()` for no authentication (token endpoints, instance metadata)
//!
//! Service crates add their own where a service wants extra headers.

use std::sync::Arc;

use arc_swap::ArcSwap;
use secret::Secret;
use tower::layer::Layer;

/// Trait to represent authenticating with an API queried via an `ApiClient`.
pub trait Authentication: Clone {
    /// Called by the `ApiClient` to implement authorization.
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B>;
}

/// Authentication with an OAuth2 bearer token.
///
/// The token is stored as a [Secret] to prevent it from being logged.
///
/// # Example
/// ```rust
/// use api_client::BearerAuth;
///
/// let auth = BearerAuth::new("my-token");
/// let header = auth.header_value();
///
/// assert_eq!(header.to_str().unwrap(), "Bearer my-token");
/// assert!(header.is_sensitive());
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuth(Secret);

impl BearerAuth {
    /// Create a new Bearer authentication with a given token.
    pub fn new<K: Into<Secret>>(token: K) -> Self {
        BearerAuth(token.into())
    }

    /// The token sent with each request.
    pub fn token(&self) -> &Secret {
        &self.0
    }

    /// Get the header value for the Bearer token.
    pub fn header_value(&self) -> http::HeaderValue {
        self.0
            .bearer()
            .expect("bearer token is a valid HTTP header value")
    }
}

impl Authentication for BearerAuth {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        if !req.headers().contains_key(http::header::AUTHORIZATION) {
            req.headers_mut()
                .append(http::header::AUTHORIZATION, self.header_value());
        } else {
            tracing::warn!("{} header already set", http::header::AUTHORIZATION);
        }
        req
    }
}

impl Authentication for () {
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B> {
        req
    }
}

/// Authentication which may not be known yet, e.g. before the first token is issued.
impl<A> Authentication for Option<A>
where
    A: Authentication,
{
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B> {
        match self {
            Some(auth) => auth.authenticate(req),
            None => req,
        }
    }
}

/// A layer to provide a swappable authentication mechanism.
///
/// This allows users to update the authentication mechanism without needing to recreate the client.
#[derive(Debug)]
pub struct AuthenticationLayer<A> {
    auth: Arc<ArcSwap<A>>,
}

impl<A> Clone for AuthenticationLayer<A> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
        }
    }
}

impl<A> AuthenticationLayer<A> {
    pub(crate) fn new(auth: Arc<ArcSwap<A>>) -> Self {
        Self { auth }
    }
}

impl<A, S> Layer<S> for AuthenticationLayer<A> {
    type Service = AuthenticationService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService::new(inner, self.auth.clone())
    }
}

/// A service to provide a swappable authentication mechanism.
#[derive(Debug)]
pub struct AuthenticationService<A, S> {
    inner: S,
    auth: Arc<ArcSwap<A>>,
}

impl<A, S: Clone> Clone for AuthenticationService<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<A, S> AuthenticationService<A, S> {
    pub(crate) fn new(inner: S, auth: Arc<ArcSwap<A>>) -> Self {
        Self { inner, auth }
    }
}

impl<A, S, BIn, BOut> tower::Service<http::Request<BIn>> for AuthenticationService<A, S>
where
    A: Authentication,
    S: tower::Service<http::Request<BIn>, Response = http::Response<BOut>>,
    S::Future: Send + 'static,
{
    type Response = http::Response<BOut>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BIn>) -> Self::Future {
        let req = self.auth.load().authenticate(req);
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_does_not_replace_existing_authorization() {
        let auth = BearerAuth::new("new-token");
        let req = http::Request::get("https://graph.microsoft.com/v1.0/groups")
            .header(http::header::AUTHORIZATION, "Bearer old-token")
            .body(())
            .unwrap();

        let req = auth.authenticate(req);
        let values: Vec<_> = req
            .headers()
            .get_all(http::header::AUTHORIZATION)
            .iter()
            .collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer old-token");
    }

    #[test]
    fn bearer_debug_hides_token() {
        let auth = BearerAuth::new("super-secret");
        assert!(!format!("{auth:?}").contains("super-secret"));
    }
}
