//! Gist identifiers and the URLs derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use gdir_common::{Error, Result};

const GIST_HOST: &str = "gist.github.com";
const SSH_PREFIX: &str = "git@gist.github.com:";

/// 32 hex character gist identifier, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GistId(String);

impl GistId {
    /// Accept any of the forms an operator is likely to paste:
    ///
    /// - `0123…cdef` (bare id)
    /// - `git@gist.github.com:<id>` with optional `.git`
    /// - `https://gist.github.com/<id>` with optional `.git`
    /// - `https://gist.github.com/<user>/<id>`
    ///
    /// # Errors
    /// - None of the forms match
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let candidate = if let Some(rest) = input.strip_prefix(SSH_PREFIX) {
            Some(rest.strip_suffix(".git").unwrap_or(rest).to_string())
        } else if is_gist_id(input) {
            Some(input.to_string())
        } else {
            from_web_url(input)
        };

        match candidate {
            Some(id) if is_gist_id(&id) => Ok(Self(id.to_ascii_lowercase())),
            _ => Err(Error::InputValidation(format!(
                "Not a gist URL or ID: {}",
                input
            ))),
        }
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Git remote over HTTPS.
    pub fn https_remote(&self) -> String {
        format!("https://{}/{}.git", GIST_HOST, self.0)
    }

    /// Git remote over SSH.
    pub fn ssh_remote(&self) -> String {
        format!("{}{}.git", SSH_PREFIX, self.0)
    }

    /// Base URL the worker fetches raw files from.
    pub fn raw_url(&self, user: &str) -> String {
        format!("https://gist.githubusercontent.com/{}/{}/raw/", user, self.0)
    }
}

impl fmt::Display for GistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GistId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<GistId> for String {
    fn from(id: GistId) -> Self {
        id.0
    }
}

fn is_gist_id(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn from_web_url(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str() != Some(GIST_HOST) {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match *segments.as_slice() {
        [id] => Some(id.strip_suffix(".git").unwrap_or(id).to_string()),
        [_user, id] => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_forms() {
        let forms = [
            ID.to_string(),
            format!("  {}  ", ID),
            format!("git@gist.github.com:{}", ID),
            format!("git@gist.github.com:{}.git", ID),
            format!("https://gist.github.com/{}", ID),
            format!("https://gist.github.com/{}.git", ID),
            format!("http://gist.github.com/{}", ID),
            format!("https://gist.github.com/someone/{}", ID),
            ID.to_uppercase(),
        ];

        for form in forms {
            assert_eq!(GistId::parse(&form).unwrap().as_str(), ID, "{}", form);
        }
    }

    #[test]
    fn test_parse_rejects() {
        let bad = [
            "",
            "0123",
            "https://github.com/someone/0123456789abcdef0123456789abcdef",
            "https://gist.github.com/",
            "https://gist.github.com/a/b/0123456789abcdef0123456789abcdef",
            "git@gist.github.com:zz23456789abcdef0123456789abcdef",
            "ftp://gist.github.com/0123456789abcdef0123456789abcdef",
        ];

        for input in bad {
            assert!(GistId::parse(input).is_err(), "{}", input);
        }
    }

    #[test]
    fn test_urls() {
        let id = GistId::parse(ID).unwrap();
        assert_eq!(
            id.https_remote(),
            format!("https://gist.github.com/{}.git", ID)
        );
        assert_eq!(id.ssh_remote(), format!("git@gist.github.com:{}.git", ID));
        assert_eq!(
            id.raw_url("someone"),
            format!("https://gist.githubusercontent.com/someone/{}/raw/", ID)
        );
    }

    #[test]
    fn test_serde_validates() {
        let id: GistId = serde_json::from_str(&format!("\"{}\"", ID)).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", ID));
        assert!(serde_json::from_str::<GistId>("\"nope\"").is_err());
    }
}
