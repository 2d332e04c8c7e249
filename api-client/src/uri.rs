//! URI utilities.

use camino::Utf8Path;
use http::uri::PathAndQuery;
use http::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use url::Url;

/// The provided URL cannot be a base URL,
/// and so is not valid as the base part of an API URL.
#[derive(Debug, Error)]
#[error("cannot be a base URL: {0}")]
pub struct CannotBeABase(url::Url);

/// Errors that can occur when parsing a URI.
#[derive(Debug, Error)]
pub enum ParseUriError {
    /// An error occurred while parsing the URI.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The provided URL cannot be a base URL,
    #[error(transparent)]
    CannotBeABase(#[from] CannotBeABase),

    /// The URI is invalid, but URL parsing succeded.
    #[error("invalid URI: {0}")]
    Invalid(http::uri::InvalidUri),
}

/// Convert a value into a URI.
pub trait IntoUri {
    /// Convert the value into a URI.
    fn into_uri(self) -> Result<Uri, ParseUriError>;
}

impl IntoUri for Url {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        if self.cannot_be_a_base() {
            return Err(CannotBeABase(self).into());
        }

        match self.as_str().parse() {
            Ok(uri) => Ok(uri),
            Err(e) => Err(ParseUriError::Invalid(e)),
        }
    }
}

impl IntoUri for Uri {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        Ok(self)
    }
}

impl IntoUri for &str {
    fn into_uri(self) -> Result<Uri, ParseUriError> {
        let url: Url = self.parse()?;
        url.into_uri()
    }
}

/// Characters escaped in query keys and values.
///
/// Everything a query component can't carry literally, plus the separators
/// `&`, `=`, `+` and the OData string delimiter `'`.
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Extension trait for URIs.
pub trait UriExtension {
    /// Join a path to a URI.
    fn join<P: AsRef<str>>(self, path: P) -> Uri;

    /// Append a percent-encoded query parameter to a URI.
    fn append_query(self, key: &str, value: &str) -> Uri;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(self, path: P) -> Uri {
        let mut parts = self.into_parts();

        let base = parts
            .path_and_query
            .as_ref()
            .map(|pq| pq.path().to_owned())
            .unwrap_or_else(|| "/".to_owned());
        let joined = Utf8Path::new(&base).join(path.as_ref());
        parts.path_and_query = Some(
            PathAndQuery::from_maybe_shared(joined.to_string()).expect("joined path is valid"),
        );
        Uri::from_parts(parts).expect("joined uri is valid")
    }

    fn append_query(self, key: &str, value: &str) -> Uri {
        let mut parts = self.into_parts();

        let pair = format!(
            "{}={}",
            utf8_percent_encode(key, QUERY_COMPONENT),
            utf8_percent_encode(value, QUERY_COMPONENT)
        );

        let pq = match parts.path_and_query.as_ref() {
            Some(pq) => match pq.query() {
                Some(query) if !query.is_empty() => format!("{}?{}&{}", pq.path(), query, pair),
                _ => format!("{}?{}", pq.path(), pair),
            },
            None => format!("/?{pair}"),
        };

        parts.path_and_query =
            Some(PathAndQuery::from_maybe_shared(pq).expect("encoded query is valid"));
        Uri::from_parts(parts).expect("uri with query is valid")
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_uri_join() {
        let uri = "https://graph.microsoft.com".parse::<Uri>().unwrap();
        assert_eq!(uri.join("v1.0").to_string(), "https://graph.microsoft.com/v1.0");

        let uri = "https://graph.microsoft.com/v1.0".parse::<Uri>().unwrap();
        assert_eq!(
            uri.join("groups").to_string(),
            "https://graph.microsoft.com/v1.0/groups"
        );

        let uri = "https://graph.microsoft.com/v1.0/".parse::<Uri>().unwrap();
        assert_eq!(
            uri.join("groups").to_string(),
            "https://graph.microsoft.com/v1.0/groups"
        );

        let uri = "https://login.microsoftonline.com".parse::<Uri>().unwrap();
        assert_eq!(
            uri.join("contoso/oauth2/v2.0/token").to_string(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );

        let uri = "https://example.vault.azure.net/bar".parse::<Uri>().unwrap();
        assert_eq!(
            uri.join("/secrets").to_string(),
            "https://example.vault.azure.net/secrets"
        );
    }

    #[test]
    fn test_uri_join_drops_query() {
        let uri = "https://graph.microsoft.com/v1.0?x=1".parse::<Uri>().unwrap();
        assert_eq!(
            uri.join("groups").to_string(),
            "https://graph.microsoft.com/v1.0/groups"
        );
    }

    #[test]
    fn test_append_query() {
        let uri = "https://example.vault.azure.net/secrets/name"
            .parse::<Uri>()
            .unwrap();
        let uri = uri.append_query("api-version", "7.4");
        assert_eq!(
            uri.to_string(),
            "https://example.vault.azure.net/secrets/name?api-version=7.4"
        );

        let uri = uri.append_query("$filter", "displayName eq 'A&B'");
        assert_eq!(
            uri.query(),
            Some("api-version=7.4&$filter=displayName%20eq%20%27A%26B%27")
        );
    }

    #[test]
    fn test_into_uri_rejects_non_base() {
        assert!("mailto:someone@example.com".into_uri().is_err());
        assert!("https://graph.microsoft.com/v1.0".into_uri().is_ok());
    }
}
