//! File-backed moderation lists.
//!
//! Each room gets its own directory under the configured base path, with
//! one file per list and one entry per line. Files that do not exist yet
//! read as empty lists; the directory is created on first write.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{ListKind, ListSource};
use crate::config::ListsConfig;
use crate::error::ProviderError;
use crate::moderation::Lists;

pub struct FileLists {
    dir: PathBuf,
    config: ListsConfig,
}

impl FileLists {
    pub fn new(room: &str, config: &ListsConfig) -> Self {
        Self {
            dir: config.path.join(room),
            config: config.clone(),
        }
    }

    fn file_for(&self, kind: ListKind) -> PathBuf {
        let name = match kind {
            ListKind::Approved => &self.config.approved,
            ListKind::NickBans => &self.config.nick_bans,
            ListKind::AccountBans => &self.config.account_bans,
            ListKind::StringBans => &self.config.string_bans,
        };
        self.dir.join(name)
    }

    async fn read_lines(&self, kind: ListKind) -> Result<Vec<String>, ProviderError> {
        let path = self.file_for(kind);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl ListSource for FileLists {
    async fn load(&self) -> Result<Lists, ProviderError> {
        Ok(Lists {
            approved: self.read_lines(ListKind::Approved).await?,
            nick_bans: self.read_lines(ListKind::NickBans).await?,
            account_bans: self.read_lines(ListKind::AccountBans).await?,
            string_bans: self.read_lines(ListKind::StringBans).await?,
        })
    }

    async fn add(&self, kind: ListKind, entry: &str) -> Result<(), ProviderError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(kind))
            .await?;
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        Ok(())
    }

    async fn remove(&self, kind: ListKind, entry: &str) -> Result<bool, ProviderError> {
        let mut lines = self.read_lines(kind).await?;
        let before = lines.len();
        lines.retain(|line| line != entry);
        if lines.len() == before {
            return Ok(false);
        }
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        tokio::fs::write(self.file_for(kind), content).await?;
        Ok(true)
    }
}
