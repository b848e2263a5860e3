//! CLI command implementations

pub mod dataset;
pub mod init;
pub mod order;
pub mod upload;

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::Settings;
use crate::manifest::{MANIFEST_FILENAME, Manifest};
use crate::models::TableRef;

/// Load settings from a config directory
pub(crate) fn load_settings(config_dir: &Path) -> Result<Settings, CliError> {
    Ok(Settings::load(config_dir)?)
}

/// Manifest path from the flag, the config, or `<root>/datapackage.json`
pub(crate) fn manifest_path(explicit: Option<&Path>, settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = settings.datapackage_path() {
        return Some(path);
    }
    let fallback = settings.root_dir().join(MANIFEST_FILENAME);
    fallback.exists().then_some(fallback)
}

/// Load the manifest if one is configured or present
pub(crate) fn load_manifest(
    explicit: Option<&Path>,
    settings: &Settings,
) -> Result<Option<Manifest>, CliError> {
    match manifest_path(explicit, settings) {
        Some(path) => Ok(Some(Manifest::load(&path)?)),
        None => Ok(None),
    }
}

/// Parse table arguments (`table` or `schema.table`)
pub(crate) fn parse_tables(tables: &[String], default_schema: &str) -> Vec<TableRef> {
    tables
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| TableRef::parse(t, default_schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_tables() {
        let tables = parse_tables(
            &["Households".into(), " ".into(), "sandbox.persons".into()],
            "model_draft",
        );
        assert_eq!(
            tables,
            vec![
                TableRef::new("model_draft", "households"),
                TableRef::new("sandbox", "persons"),
            ]
        );
    }

    #[test]
    fn test_manifest_path_precedence() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::new();
        settings.paths.root = dir.path().display().to_string();

        assert_eq!(manifest_path(None, &settings), None);

        std::fs::write(dir.path().join(MANIFEST_FILENAME), "{}").unwrap();
        assert_eq!(
            manifest_path(None, &settings),
            Some(dir.path().join(MANIFEST_FILENAME))
        );

        settings.paths.datapackage_file = Some("meta/package.json".into());
        assert_eq!(
            manifest_path(None, &settings),
            Some(dir.path().join("meta/package.json"))
        );

        let explicit = PathBuf::from("/tmp/other.json");
        assert_eq!(
            manifest_path(Some(&explicit), &settings),
            Some(explicit.clone())
        );
    }
}
