use std::fmt;
use std::str::FromStr;

use http::uri::{InvalidUri, InvalidUriParts, PathAndQuery};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidUriError(String);

impl From<InvalidUri> for InvalidUriError {
    fn from(value: InvalidUri) -> Self {
        Self(value.to_string())
    }
}

impl From<InvalidUriParts> for InvalidUriError {
    fn from(value: InvalidUriParts) -> Self {
        Self(value.to_string())
    }
}

/// Base URI of a remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri(http::Uri);

impl Uri {
    pub fn from_static(src: &'static str) -> Self {
        Self(http::Uri::from_static(src))
    }

    /// Build a URI for `path` on the same scheme and authority, replacing
    /// any path and query the base had.
    pub fn join(&self, path: &str, query: Option<&str>) -> Result<Self, InvalidUriError> {
        let path_and_query = match query {
            Some(qs) => PathAndQuery::from_maybe_shared(format!("{path}?{qs}"))?,
            None => PathAndQuery::from_str(path)?,
        };

        let mut parts = self.0.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Ok(Self(http::Uri::from_parts(parts)?))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Uri {
    type Err = InvalidUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl TryFrom<String> for Uri {
    type Error = InvalidUriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(http::Uri::from_maybe_shared(value)?))
    }
}
