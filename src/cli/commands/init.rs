//! Init-config command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, sample_config};

/// Arguments for the init-config command
#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config_dir: PathBuf,
    /// Overwrite an existing config file
    pub force: bool,
}

/// Write a sample `oep-upload.toml`; returns the written path
pub fn handle_init(args: &InitArgs) -> Result<PathBuf, CliError> {
    let path = args.config_dir.join(CONFIG_FILENAME);
    if path.exists() && !args.force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    std::fs::create_dir_all(&args.config_dir)
        .map_err(|e| CliError::FileWriteError(args.config_dir.clone(), e.to_string()))?;
    std::fs::write(&path, sample_config())
        .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;

    println!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tempfile::tempdir;

    #[test]
    fn test_writes_loadable_config() {
        let dir = tempdir().unwrap();
        let args = InitArgs {
            config_dir: dir.path().join("conf"),
            force: false,
        };
        let path = handle_init(&args).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(Settings::parse(&content).is_ok());
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "custom = true\n").unwrap();

        let mut args = InitArgs {
            config_dir: dir.path().to_path_buf(),
            force: false,
        };
        assert!(matches!(
            handle_init(&args),
            Err(CliError::InvalidArgument(_))
        ));

        args.force = true;
        handle_init(&args).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(content.contains("[upload]"));
    }
}
