use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use papercast_schema::Role;

use crate::templates::{baseline_prompt, MAIN_YAML, OPENAI_PROVIDER_YAML};

/// Creates the config files and baseline prompts under `root`. Existing files
/// are left untouched; returns the paths that were written.
pub fn init_workspace(root: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for dir in [
        root.join("config").join("providers.d"),
        root.join("prompts"),
        root.join("logs"),
    ] {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut files = vec![
        (root.join("config").join("main.yaml"), MAIN_YAML.to_string()),
        (
            root.join("config").join("providers.d").join("openai.yaml"),
            OPENAI_PROVIDER_YAML.to_string(),
        ),
    ];
    for role in Role::ALL {
        files.push((
            root.join("prompts").join(format!("{role}_prompt.txt")),
            baseline_prompt(role).to_string(),
        ));
    }

    for (path, content) in files {
        if path.exists() {
            continue;
        }
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
