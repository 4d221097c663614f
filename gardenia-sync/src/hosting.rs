//! Hosting-service access: branch listing and archive download.
//!
//! [`BranchResolver`] and [`ArchiveFetcher`] are the seams the coordinator
//! works against; [`HostClient`] implements both over blocking `ureq` calls
//! against the GitHub REST API and archive endpoints.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use gardenia_core::{CommitMarker, SyncConfig};

use crate::error::{FetchError, ResolutionError};

const USER_AGENT: &str = concat!("gardenia/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Commit a branch currently points at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchCommit {
    pub sha: CommitMarker,
    #[serde(default)]
    pub url: String,
}

/// One entry of the branch listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: BranchCommit,
}

/// Lists the branches of a bundle's upstream repository.
pub trait BranchResolver: Send + Sync {
    fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>, ResolutionError>;
}

/// Downloads a full snapshot archive of a bundle at a given commit.
pub trait ArchiveFetcher: Send + Sync {
    fn fetch(
        &self,
        owner: &str,
        repo: &str,
        marker: &CommitMarker,
        dest: &Path,
    ) -> Result<(), FetchError>;
}

/// Pick the commit of the branch called `name`, if listed.
pub fn find_branch<'a>(branches: &'a [Branch], name: &str) -> Option<&'a CommitMarker> {
    branches
        .iter()
        .find(|branch| branch.name == name)
        .map(|branch| &branch.commit.sha)
}

/// Blocking client for the hosting service.
#[derive(Debug, Clone)]
pub struct HostClient {
    agent: ureq::Agent,
    api_base: String,
    archive_base: String,
}

impl HostClient {
    pub fn new(api_base: impl Into<String>, archive_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: trim_base(api_base.into()),
            archive_base: trim_base(archive_base.into()),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.api_base.clone(), config.archive_base.clone())
    }

    /// `{api_base}/repos/{owner}/{repo}/branches?per_page=100`
    pub fn branches_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/branches?per_page=100", self.api_base)
    }

    /// `{archive_base}/{owner}/{repo}/archive/{marker}.zip`
    pub fn archive_url(&self, owner: &str, repo: &str, marker: &CommitMarker) -> String {
        format!("{}/{owner}/{repo}/archive/{marker}.zip", self.archive_base)
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

impl BranchResolver for HostClient {
    fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<Branch>, ResolutionError> {
        let url = self.branches_url(owner, repo);
        tracing::debug!("listing branches: {url}");
        let resp = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => ResolutionError::Status {
                url: url.clone(),
                status,
            },
            ureq::Error::Transport(t) => ResolutionError::Transport {
                url: url.clone(),
                message: t.to_string(),
            },
        })?;
        resp.into_json::<Vec<Branch>>()
            .map_err(|source| ResolutionError::Decode { url, source })
    }
}

impl ArchiveFetcher for HostClient {
    fn fetch(
        &self,
        owner: &str,
        repo: &str,
        marker: &CommitMarker,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let url = self.archive_url(owner, repo, marker);
        tracing::debug!("downloading {url} -> {}", dest.display());
        let resp = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.clone(),
                status,
            },
            ureq::Error::Transport(t) => FetchError::Transport {
                url: url.clone(),
                message: t.to_string(),
            },
        })?;

        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };
        let file = File::create(dest).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        let mut reader = resp.into_reader();
        if let Err(source) = std::io::copy(&mut reader, &mut writer) {
            let _ = std::fs::remove_file(dest);
            return Err(FetchError::Transport {
                url,
                message: source.to_string(),
            });
        }
        writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?
            .sync_all()
            .map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_hosting_conventions() {
        let client = HostClient::new("https://api.github.com/", "https://github.com");
        assert_eq!(
            client.branches_url("tpope", "vim-fugitive"),
            "https://api.github.com/repos/tpope/vim-fugitive/branches?per_page=100"
        );
        assert_eq!(
            client.archive_url("tpope", "vim-fugitive", &CommitMarker::from("abc123")),
            "https://github.com/tpope/vim-fugitive/archive/abc123.zip"
        );
    }

    #[test]
    fn branch_listing_decodes() {
        let body = r#"[
            {"name": "dev", "commit": {"sha": "111", "url": "https://x/111"}},
            {"name": "master", "commit": {"sha": "222", "url": "https://x/222"}}
        ]"#;
        let branches: Vec<Branch> = serde_json::from_str(body).unwrap();
        assert_eq!(
            find_branch(&branches, "master"),
            Some(&CommitMarker::from("222"))
        );
        assert_eq!(find_branch(&branches, "main"), None);
    }

    #[test]
    fn commit_url_is_optional() {
        let body = r#"[{"name": "master", "commit": {"sha": "333"}}]"#;
        let branches: Vec<Branch> = serde_json::from_str(body).unwrap();
        assert_eq!(branches[0].commit.url, "");
    }
}
