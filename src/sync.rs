//! Refreshes the built-in dialect schemas from their upstream repositories

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::future::try_join_all;
use tempfile::NamedTempFile;

use crate::dialect::{DialectKind, SchemaLayout};
use crate::error::{Result, TbxCheckError};
use crate::http_client::SchemaHttpClient;

const UPSTREAM_BASE: &str = "https://raw.githubusercontent.com/LTAC-Global";

/// Upstream URLs of a built-in dialect's grammar and rule-set
pub fn upstream_urls(kind: &DialectKind) -> Option<(String, String)> {
    let (repo, folder, grammar, ruleset) = match kind {
        DialectKind::Core => (
            "TBX-Core_dialect",
            "Schemas",
            "TBXcoreStructV03_TBX-Core_integrated.rng",
            "TBX-Core.sch",
        ),
        DialectKind::Min => (
            "TBX-Min_dialect",
            "DCA",
            "TBXcoreStructV03_TBX-Min_integrated.rng",
            "TBX-Min_DCA.sch",
        ),
        DialectKind::Basic => (
            "TBX-Basic_dialect",
            "DCA",
            "TBXcoreStructV03_TBX-Basic_integrated.rng",
            "TBX-Basic_DCA.sch",
        ),
        DialectKind::Custom(_) => return None,
    };
    let url = |file: &str| format!("{}/{}/master/{}/{}", UPSTREAM_BASE, repo, folder, file);
    Some((url(grammar), url(ruleset)))
}

/// Source of schema bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl SchemaFetcher for SchemaHttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        SchemaHttpClient::fetch(self, url).await
    }
}

/// One file replaced by a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFile {
    pub url: String,
    pub path: PathBuf,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub files: Vec<SyncedFile>,
}

impl SyncSummary {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

/// Downloads every built-in schema, then swaps them into the layout
pub struct SchemaSync<F: SchemaFetcher> {
    fetcher: F,
    layout: SchemaLayout,
}

impl<F: SchemaFetcher> SchemaSync<F> {
    pub fn new(fetcher: F, layout: SchemaLayout) -> Self {
        Self { fetcher, layout }
    }

    /// (url, destination) for all six built-in files
    pub fn targets(&self) -> Vec<(String, PathBuf)> {
        DialectKind::BUILT_IN
            .iter()
            .filter_map(|kind| {
                let (grammar_url, ruleset_url) = upstream_urls(kind)?;
                let (grammar_path, ruleset_path) = self.layout.pair(kind);
                Some([(grammar_url, grammar_path), (ruleset_url, ruleset_path)])
            })
            .flatten()
            .collect()
    }

    /// Fetch everything; only when every download succeeded is anything replaced
    pub async fn run(&self) -> Result<SyncSummary> {
        let targets = self.targets();

        let bodies = try_join_all(targets.iter().map(|(url, _)| async move {
            tracing::info!(url = %url, "downloading");
            self.fetcher.fetch(url).await
        }))
        .await?;

        let downloads: Vec<(String, PathBuf, Vec<u8>)> = targets
            .into_iter()
            .zip(bodies)
            .map(|((url, path), body)| (url, path, body))
            .collect();

        let files = tokio::task::spawn_blocking(move || install_all(downloads))
            .await
            .map_err(|e| TbxCheckError::Concurrency {
                details: format!("schema install task failed: {}", e),
            })??;

        Ok(SyncSummary { files })
    }
}

fn install_all(downloads: Vec<(String, PathBuf, Vec<u8>)>) -> Result<Vec<SyncedFile>> {
    let mut installed = Vec::with_capacity(downloads.len());

    for (url, path, body) in downloads {
        let parent = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let write_err = |source: std::io::Error| TbxCheckError::FileAccess {
            path: path.clone(),
            reason: source.to_string(),
        };

        fs::create_dir_all(&parent).map_err(write_err)?;
        let mut staged = NamedTempFile::new_in(&parent).map_err(write_err)?;
        staged.write_all(&body).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::info!(path = %path.display(), bytes = body.len(), "schema replaced");
        installed.push(SyncedFile {
            url,
            path,
            bytes: body.len(),
        });
    }

    Ok(installed)
}
