//! Loading and atomically saving config.toml.

use crate::constants;
use crate::models::agent_config::AgentFile;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Read config.toml; a missing file yields an empty document.
pub fn load(path: &Path) -> Result<AgentFile> {
    if !path.exists() {
        return Ok(AgentFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))
}

/// Write config.toml via a same-directory temp file and rename.
pub fn save(path: &Path, file: &AgentFile) -> Result<()> {
    let content = toml::to_string_pretty(file).context("serialize config")?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).context("create temp config")?;
    tmp.write_all(content.as_bytes()).context("write config")?;
    tmp.as_file().sync_all().context("sync config")?;

    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(constants::CONFIG_FILE_MODE);
        tmp.as_file()
            .set_permissions(perm)
            .context("set permissions on temp config")?;
    }

    tmp.persist(path)
        .map_err(|err| anyhow::anyhow!("persist config {}: {}", path.display(), err))?;
    Ok(())
}
