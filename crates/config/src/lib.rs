//! Configuration for cairn.
//!
//! Layered with [`figment`], each layer overriding the previous one:
//!
//! 1. built-in defaults ([`Config::default()`]);
//! 2. a configuration file: the one passed explicitly, or else `cairn.toml`,
//!    `cairn.yaml` or `cairn.json` in the platform configuration directory
//!    (e.g. `~/.config/cairn/` on Linux), when present;
//! 3. environment variables prefixed `CAIRN_`, with `__` separating
//!    sections (`CAIRN_VAULT__KEY_SECRET`, `CAIRN_POLL_INTERVAL_SECS`).
//!
//! Command-line flags are applied on top by the binary.
//!
//! ```toml
//! poll_interval_secs = 60
//!
//! [vault]
//! account_id = "012345678901"
//! region = "eu-west-1"
//! vault_name = "photos"
//! key_id = "AKIA..."
//! key_secret = "..."
//!
//! [volume]
//! excludes = [".DS_Store", "node_modules"]
//!
//! [retrieval]
//! tier = "Bulk"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use cairn_glacier::RetrievalTier;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "CAIRN_";
const FILE_STEM: &str = "cairn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vault: VaultConfig,
    pub volume: VolumeConfig,
    pub retrieval: RetrievalConfig,
    pub log: LogConfig,
    /// Seconds between two status checks of a running job.
    pub poll_interval_secs: u64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            volume: VolumeConfig::default(),
            retrieval: RetrievalConfig::default(),
            log: LogConfig::default(),
            poll_interval_secs: 1,
        }
    }
}

/// Where the archives live and how to authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Empty means the account owning the credentials.
    pub account_id: String,
    pub region: String,
    pub vault_name: String,
    pub key_id: String,
    pub key_secret: String,
    /// Custom endpoint URL, for test doubles and proxies.
    pub endpoint: Option<String>,
}
impl VaultConfig {
    /// Check that everything needed to talk to the vault is set.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("vault.region", &self.region),
            ("vault.vault_name", &self.vault_name),
            ("vault.key_id", &self.key_id),
            ("vault.key_secret", &self.key_secret),
        ] {
            if value.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Name of the index log, stored at the root of the backed up tree.
    pub index_file: String,
    /// Relative paths containing any of these are ignored.
    pub excludes: Vec<String>,
}
impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            index_file: ".changes.log".to_string(),
            excludes: Vec::new(),
        }
    }
}
impl VolumeConfig {
    /// Location of the index log for a tree rooted at `root`.
    pub fn index_path(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.index_file)
    }

    /// The configured excludes plus the index log itself.
    pub fn all_excludes(&self) -> Vec<String> {
        let mut excludes = self.excludes.clone();
        excludes.push(self.index_file.clone());
        excludes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub tier: RetrievalTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `info` or `cairn_glacier=debug`.
    pub level: String,
    pub format: LogFormat,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
impl FromStr for LogFormat {
    type Err = ErrorKind;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ErrorKind::UnknownLogFormat(s.to_string())),
        }
    }
}
impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

impl Config {
    /// Build the layered figment without extracting it.
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(path) => figment = merge_file(figment, path),
            None => {
                if let Some(dirs) = ProjectDirs::from("", "", FILE_STEM) {
                    for extension in ["toml", "yaml", "yml", "json"] {
                        let path = dirs.config_dir().join(format!("{FILE_STEM}.{extension}"));
                        if path.is_file() {
                            tracing::debug!(path = %path.display(), "Using configuration file");
                            figment = merge_file(figment, &path);
                        }
                    }
                }
            },
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// Vault settings are not required here; commands that talk to the vault
    /// check them with [`VaultConfig::validate()`].
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(explicit).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.volume.index_file.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("volume.index_file"));
        }
        if self.poll_interval_secs == 0 {
            exn::bail!(ErrorKind::Invalid("poll_interval_secs"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Merge a file, picking the format from its extension (TOML when unknown).
fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.volume.index_file, ".changes.log");
        assert_eq!(config.retrieval.tier, RetrievalTier::Standard);
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
        // Vault settings have no usable default.
        assert!(config.vault.validate().is_err());
    }

    #[rstest]
    #[case("cairn.toml", "[vault]\nregion = \"eu-west-1\"\n\n[retrieval]\ntier = \"bulk\"\n")]
    #[case("cairn.yaml", "vault:\n  region: eu-west-1\nretrieval:\n  tier: Bulk\n")]
    #[case("cairn.json", r#"{"vault": {"region": "eu-west-1"}, "retrieval": {"tier": "BULK"}}"#)]
    fn test_explicit_file(#[case] name: &str, #[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.vault.region, "eu-west-1");
        assert_eq!(config.retrieval.tier, RetrievalTier::Bulk);
        // Untouched settings keep their defaults.
        assert_eq!(config.volume.index_file, ".changes.log");
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("cairn.toml", "poll_interval_secs = 30\n[vault]\nvault_name = \"from-file\"\n")?;
            jail.set_env("CAIRN_VAULT__VAULT_NAME", "from-env");
            jail.set_env("CAIRN_LOG__FORMAT", "json");
            let config: Config = Config::figment(Some(Path::new("cairn.toml"))).extract()?;
            assert_eq!(config.vault.vault_name, "from-env");
            assert_eq!(config.poll_interval_secs, 30);
            assert_eq!(config.log.format, LogFormat::Json);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cairn.toml");
        std::fs::write(&path, "poll_interval_secs = 0\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid("poll_interval_secs")));

        std::fs::write(&path, "[retrieval]\ntier = \"glacial\"\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load));
    }

    #[test]
    fn test_vault_validation_names_field() {
        let vault = VaultConfig {
            region: "eu-west-1".to_string(),
            vault_name: "v".to_string(),
            key_id: "id".to_string(),
            ..VaultConfig::default()
        };
        let err = vault.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid("vault.key_secret")));
    }

    #[test]
    fn test_volume_excludes_index_file() {
        let volume = VolumeConfig {
            excludes: vec!["tmp".to_string()],
            ..VolumeConfig::default()
        };
        assert_eq!(volume.all_excludes(), ["tmp", ".changes.log"]);
        assert_eq!(volume.index_path("/data"), Path::new("/data/.changes.log"));
    }

    #[rstest]
    #[case("text", LogFormat::Text)]
    #[case("JSON", LogFormat::Json)]
    fn test_log_format_parse(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().unwrap(), expected);
    }
}
