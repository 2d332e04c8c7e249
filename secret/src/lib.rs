//! Wrapper for credentials that should never show up in logs.
//!
//! Client secrets pulled out of Key Vault and bearer tokens issued by Entra ID
//! both pass through [`Secret`], so a stray `{:?}` or `tracing` field can't leak them.

use std::{borrow::Cow, fmt, ops::Deref};

use http::{header::InvalidHeaderValue, HeaderValue};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A client secret, access token or other credential value.
///
/// This wrapper keeps the value out of debug reprs and zeroes owned memory on drop.
///
/// Use [Secret::revealed] to get the underlying value.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String")]
pub struct Secret(Cow<'static, str>);

impl Secret {
    /// Expose the underlying value of this secret
    pub fn revealed(&self) -> &str {
        self.0.deref()
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the secret holds no value at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `n` characters of the secret, for confirming which token is in use.
    ///
    /// Never use this for anything longer than a handful of characters.
    pub fn preview(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// The secret as a sensitive `Bearer` authorization header value.
    pub fn bearer(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut header = HeaderValue::try_from(format!("Bearer {}", self.revealed()))?;
        header.set_sensitive(true);
        Ok(header)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        if let Cow::Owned(ref mut s) = self.0 {
            s.zeroize()
        }
    }
}

/// Tiny wrapper struct to indicate that the inner object should
/// be directly printed in fmt::Debug implementations.
struct DirectDebug<D>(D);

impl<D> fmt::Debug for DirectDebug<D>
where
    D: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&DirectDebug("****")).finish()
    }
}

impl From<Cow<'static, str>> for Secret {
    fn from(inner: Cow<'static, str>) -> Self {
        Secret(inner)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret(value.into())
    }
}

impl From<&'static str> for Secret {
    fn from(value: &'static str) -> Self {
        Secret(value.into())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn secret_hidden_debug() {
        let value = "client-secret-value";
        let secret = Secret::from(value);

        assert!(!format!("{secret:?}").contains(value));
        assert_eq!(&format!("{secret:?}"), "Secret(****)");
        assert_eq!(secret.revealed(), value);
    }

    #[test]
    fn preview_is_bounded() {
        let token = Secret::from("eyJ0eXAiOiJKV1QiLCJhbGciOi");
        assert_eq!(token.preview(10), "eyJ0eXAiOi");

        let short = Secret::from("abc");
        assert_eq!(short.preview(10), "abc");
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let token = Secret::from(String::from("abc.def"));
        let header = token.bearer().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Bearer abc.def");
    }

    #[test]
    fn deserializes_from_plain_string() {
        let secret: Secret = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(secret.revealed(), "hunter2");
    }
}
