//! Cross-boundary resource addresses
//!
//! A [`Uri`] is the value the extension runtime and the host exchange to name
//! files and other resources. On the wire it travels as [`UriComponents`], a
//! map of its five parts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IdeError, IdeResult};

/// RFC 3986 appendix B splitter
static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$")
        .expect("URI pattern is a valid regex")
});

const FILE_SCHEME: &str = "file";

static SCHEME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("scheme pattern is a valid regex")
});

/// Wire form of a [`Uri`]
///
/// Every field is optional so that a partially filled map from the remote side
/// decodes; [`Uri::from_components`] decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UriComponents {
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

/// Immutable resource address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "UriComponents", try_from = "UriComponents")]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    fn new(
        scheme: String,
        authority: String,
        path: String,
        query: String,
        fragment: String,
    ) -> IdeResult<Self> {
        if scheme.is_empty() {
            return Err(IdeError::invalid_uri("scheme is required"));
        }
        if !SCHEME_PATTERN.is_match(&scheme) {
            return Err(IdeError::invalid_uri(format!(
                "scheme '{}' contains illegal characters",
                scheme
            )));
        }
        // Both forms are written with a `//` authority marker
        if (!authority.is_empty() || scheme == FILE_SCHEME)
            && !path.is_empty()
            && !path.starts_with('/')
        {
            return Err(IdeError::invalid_uri(format!(
                "path '{}' must be empty or start with '/' in a '{}' URI with an authority",
                path, scheme
            )));
        }
        if authority.is_empty() && path.starts_with("//") {
            return Err(IdeError::invalid_uri(format!(
                "path '{}' cannot start with '//' without an authority",
                path
            )));
        }

        Ok(Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        })
    }

    /// Build a URI from its wire components
    ///
    /// `scheme` and `path` are required; the remaining parts default to empty.
    pub fn from_components(components: &UriComponents) -> IdeResult<Self> {
        let scheme = components
            .scheme
            .clone()
            .ok_or_else(|| IdeError::invalid_uri("scheme is required"))?;
        let path = components
            .path
            .clone()
            .ok_or_else(|| IdeError::invalid_uri("path is required"))?;

        Self::new(
            scheme,
            components.authority.clone().unwrap_or_default(),
            path,
            components.query.clone().unwrap_or_default(),
            components.fragment.clone().unwrap_or_default(),
        )
    }

    /// `file` URI for a local filesystem path
    pub fn file(path: impl AsRef<Path>) -> IdeResult<Self> {
        let mut path = path.as_ref().to_string_lossy().replace('\\', "/");
        let mut authority = String::new();

        // UNC share: //server/share/file
        if let Some(rest) = path.strip_prefix("//") {
            let (server, share) = match rest.find('/') {
                Some(idx) => (rest[..idx].to_string(), rest[idx..].to_string()),
                None => (rest.to_string(), "/".to_string()),
            };
            authority = server;
            path = share;
        }
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        Self::new(
            FILE_SCHEME.to_string(),
            authority,
            path,
            String::new(),
            String::new(),
        )
    }

    /// Parse the string form produced by `Display`
    pub fn parse(value: &str) -> IdeResult<Self> {
        let captures = URI_PATTERN
            .captures(value)
            .ok_or_else(|| IdeError::invalid_uri(format!("cannot parse '{}'", value)))?;
        let part = |idx: usize| captures.get(idx).map(|m| m.as_str()).unwrap_or("");

        let scheme = part(2);
        if scheme.is_empty() {
            return Err(IdeError::invalid_uri(format!(
                "'{}' has no scheme",
                value
            )));
        }

        Self::new(
            scheme.to_string(),
            part(4).to_string(),
            decode(part(5))?,
            decode(part(7))?,
            decode(part(9))?,
        )
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Wire map with every component present
    pub fn to_components(&self) -> UriComponents {
        UriComponents {
            scheme: Some(self.scheme.clone()),
            authority: Some(self.authority.clone()),
            path: Some(self.path.clone()),
            query: Some(self.query.clone()),
            fragment: Some(self.fragment.clone()),
        }
    }

    /// Copy with a different path
    pub fn with_path(&self, path: impl Into<String>) -> IdeResult<Self> {
        Self::new(
            self.scheme.clone(),
            self.authority.clone(),
            path.into(),
            self.query.clone(),
            self.fragment.clone(),
        )
    }

    /// Copy with a different query
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self.clone()
        }
    }

    /// Copy with a different fragment
    pub fn with_fragment(&self, fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            ..self.clone()
        }
    }

    /// Local filesystem path of a `file` URI
    pub fn fs_path(&self) -> IdeResult<PathBuf> {
        if self.scheme != FILE_SCHEME {
            return Err(IdeError::invalid_uri(format!(
                "'{}' is not a file URI",
                self
            )));
        }
        if !self.authority.is_empty() {
            return Ok(PathBuf::from(format!("//{}{}", self.authority, self.path)));
        }

        // /C:/dir -> C:/dir
        let bytes = self.path.as_bytes();
        if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
        {
            return Ok(PathBuf::from(&self.path[1..]));
        }
        Ok(PathBuf::from(&self.path))
    }
}

fn decode(value: &str) -> IdeResult<String> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| IdeError::invalid_uri(format!("invalid percent-encoding in '{}': {}", value, e)))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if !self.authority.is_empty() || self.scheme == FILE_SCHEME {
            write!(f, "//{}", self.authority)?;
        }
        f.write_str(&encode_path(&self.path))?;
        if !self.query.is_empty() {
            write!(f, "?{}", urlencoding::encode(&self.query))?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", urlencoding::encode(&self.fragment))?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = IdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl From<Uri> for UriComponents {
    fn from(uri: Uri) -> Self {
        UriComponents {
            scheme: Some(uri.scheme),
            authority: Some(uri.authority),
            path: Some(uri.path),
            query: Some(uri.query),
            fragment: Some(uri.fragment),
        }
    }
}

impl TryFrom<UriComponents> for Uri {
    type Error = IdeError;

    fn try_from(components: UriComponents) -> Result<Self, Self::Error> {
        Uri::from_components(&components)
    }
}
