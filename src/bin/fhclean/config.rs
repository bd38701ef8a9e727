use std::fs;

use anyhow::Context;
use serde::Deserialize;

use crate::Args;
use crate::cleanup::QUARANTINE_DIR_NAME;

/// Final config created from CLI arguments and user config file.
#[derive(Debug)]
pub struct Config {
    pub(crate) dryrun: bool,
    pub(crate) purge: bool,
    pub(crate) quarantine_dir: String,
    pub(crate) recurse: bool,
    pub(crate) rename: bool,
    pub(crate) threads: Option<usize>,
    pub(crate) verbose: bool,
}

/// Config from a config file
#[derive(Debug, Default, Deserialize)]
struct CleanupConfig {
    #[serde(default)]
    dryrun: bool,
    #[serde(default)]
    keep_names: bool,
    #[serde(default)]
    purge: bool,
    #[serde(default)]
    quarantine_dir: Option<String>,
    #[serde(default)]
    recurse: bool,
    #[serde(default)]
    verbose: bool,
}

/// Wrapper needed for parsing the config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    fhclean: CleanupConfig,
}

impl CleanupConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    fn get_user_config() -> anyhow::Result<Self> {
        let Some(path) = fhclean::config_path() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.fhclean)
            .context("Failed to parse fhclean config TOML")
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or parsed,
    /// or the quarantine directory name is not usable.
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let user_config = CleanupConfig::get_user_config()?;

        // Quarantine directory name: args > config > default
        let quarantine_dir = args
            .quarantine_dir
            .or(user_config.quarantine_dir)
            .unwrap_or_else(|| QUARANTINE_DIR_NAME.to_string());

        if quarantine_dir.is_empty() || quarantine_dir.contains(['/', '\\']) {
            anyhow::bail!("Quarantine directory must be a plain directory name, got '{quarantine_dir}'");
        }

        Ok(Self {
            dryrun: args.dryrun || user_config.dryrun,
            purge: args.purge || user_config.purge,
            quarantine_dir,
            recurse: args.recurse || user_config.recurse,
            rename: !(args.keep_names || user_config.keep_names),
            threads: args.threads,
            verbose: args.verbose || user_config.verbose,
        })
    }
}
