//! Remote identity: the filesystem-safe name that namespaces a remote's
//! slot registry, slot directories and lock keys.

use crate::core::DocdepsError;
use crate::git::{parse_git_url, strip_auth_from_url};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::fmt;

/// Normalized identity of a remote content repository.
///
/// The name has the form `{owner}_{repo}_{hash8}`, where `hash8` is the first
/// eight hex characters of the SHA-256 of the normalized URL. The hash keeps
/// two remotes with the same owner and repository name on different hosts
/// apart.
///
/// # Examples
///
/// ```rust
/// use docdeps::cache::RemoteIdentity;
///
/// let a = RemoteIdentity::from_url("https://github.com/dotnet/docs.git").unwrap();
/// let b = RemoteIdentity::from_url("https://github.com/dotnet/docs/").unwrap();
/// assert_eq!(a, b);
/// assert!(a.name().starts_with("dotnet_docs_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteIdentity {
    url: String,
    name: String,
}

impl RemoteIdentity {
    /// Derive the identity of `url`.
    ///
    /// Credentials are stripped and a trailing `/` or `.git` is ignored, so
    /// spellings of the same remote share one pool.
    ///
    /// # Errors
    ///
    /// Returns [`DocdepsError::InvalidRemoteUrl`] for an empty URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = normalize_url(url)?;
        let hash = hex::encode(Sha256::digest(url.as_bytes()));
        let hash8 = &hash[..8];

        let name = match parse_git_url(&url) {
            Ok((owner, repo)) if !repo.is_empty() => {
                format!("{}_{}_{hash8}", sanitize(&owner), sanitize(&repo))
            }
            _ => format!("remote_{hash8}"),
        };

        Ok(Self {
            url,
            name,
        })
    }

    /// Directory and lock namespace of this remote.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized URL (credentials stripped), as recorded in the registry.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn index_lock_key(&self) -> String {
        format!("{}/index", self.name)
    }

    pub(crate) fn slot_lock_key(&self, slot_id: u32) -> String {
        format!("{}/{slot_id}", self.name)
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn normalize_url(url: &str) -> Result<String> {
    let stripped = strip_auth_from_url(url.trim())?;
    let normalized = stripped.trim_end_matches('/').trim_end_matches(".git").trim_end_matches('/');
    if normalized.is_empty() {
        return Err(DocdepsError::InvalidRemoteUrl {
            url: url.to_string(),
        }
        .into());
    }
    Ok(normalized.to_string())
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    cleaned.trim_start_matches('_').to_string()
}
