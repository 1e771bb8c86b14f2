//! Layered configuration: built-in defaults, then an optional file, then
//! `QUIRE_*` environment variables (`__` separates nested keys, so
//! `QUIRE_SCAN__CONCURRENCY=4` sets `scan.concurrency`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "QUIRE_";
const FILE_STEM: &str = "quire";
const FILE_EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite catalog.
    pub database: PathBuf,
    pub libraries: Vec<LibraryConfig>,
    pub scan: ScanConfig,
    pub log: LogConfig,
}
impl Default for Config {
    fn default() -> Self {
        let database = project_dirs()
            .map(|dirs| dirs.data_dir().join("quire.db"))
            .unwrap_or_else(|| PathBuf::from("quire.db"));
        Self { database, libraries: Vec::new(), scan: ScanConfig::default(), log: LogConfig::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub name: String,
    /// Absolute root directories.
    pub paths: Vec<PathBuf>,
    /// Rename books and files into `[Authors] Title` folders after each scan.
    #[serde(default = "organize_by_default")]
    pub organize_file_structure: bool,
}

fn organize_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files processed at once during a library walk.
    pub concurrency: usize,
    pub force_refresh: bool,
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self { concurrency: 8, force_refresh: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Load from `file` (or the first `quire.*` in the platform config
    /// directory when `None`), then the environment, and validate.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => {
                exn::ensure!(path.is_file(), ErrorKind::Invalid(format!("{} is not a file", path.display())));
                Some(path.to_path_buf())
            },
            None => Self::default_file(),
        };
        debug!(file = ?file, "loading configuration");
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// Every provider, in merge order.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn default_file() -> Option<PathBuf> {
        let dirs = project_dirs()?;
        FILE_EXTENSIONS
            .iter()
            .map(|ext| dirs.config_dir().join(format!("{FILE_STEM}.{ext}")))
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<()> {
        exn::ensure!(self.scan.concurrency > 0, ErrorKind::Invalid("scan.concurrency must be at least 1".to_string()));
        let mut names = HashSet::new();
        for library in &self.libraries {
            let name = library.name.trim();
            exn::ensure!(!name.is_empty(), ErrorKind::Invalid("library name must not be empty".to_string()));
            exn::ensure!(names.insert(name), ErrorKind::Invalid(format!("library {name:?} is configured twice")));
            exn::ensure!(
                !library.paths.is_empty(),
                ErrorKind::Invalid(format!("library {name:?} has no paths"))
            );
            for path in &library.paths {
                exn::ensure!(
                    path.is_absolute(),
                    ErrorKind::Invalid(format!("library {name:?}: {} is not absolute", path.display()))
                );
                exn::ensure!(
                    path.is_dir(),
                    ErrorKind::Invalid(format!("library {name:?}: {} is not a directory", path.display()))
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn library(name: &str, path: &Path) -> LibraryConfig {
        LibraryConfig { name: name.to_string(), paths: vec![path.to_path_buf()], organize_file_structure: true }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config.scan.concurrency, 8);
        assert!(!config.scan.force_refresh);
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.libraries.is_empty());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let root = tempfile::tempdir().unwrap();
        let toml = format!(
            "database = \"/tmp/catalog.db\"\n\n[scan]\nconcurrency = 2\n\n[[libraries]]\nname = \"Books\"\npaths = [{:?}]\n",
            root.path()
        );
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(&toml)))
            .unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/catalog.db"));
        assert_eq!(config.scan.concurrency, 2);
        assert_eq!(config.libraries, vec![library("Books", root.path())]);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_load_yaml_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("quire.yaml");
        let yaml = format!(
            "libraries:\n  - name: Comics\n    paths: [{:?}]\n    organize_file_structure: false\nlog:\n  format: json\n",
            root.path()
        );
        std::fs::write(&file, yaml).unwrap();
        let config = Config::load(Some(&file)).unwrap();
        assert!(!config.libraries[0].organize_file_structure);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[rstest]
    #[case::zero_concurrency(|c: &mut Config, _: &Path| c.scan.concurrency = 0)]
    #[case::blank_name(|c: &mut Config, p: &Path| c.libraries.push(library(" ", p)))]
    #[case::duplicate_name(|c: &mut Config, p: &Path| {
        c.libraries.push(library("Books", p));
        c.libraries.push(library("Books", p));
    })]
    #[case::relative_path(|c: &mut Config, _: &Path| c.libraries.push(library("Books", Path::new("books"))))]
    #[case::missing_path(|c: &mut Config, p: &Path| c.libraries.push(library("Books", &p.join("nope"))))]
    #[case::no_paths(|c: &mut Config, p: &Path| {
        let mut lib = library("Books", p);
        lib.paths.clear();
        c.libraries.push(lib);
    })]
    fn test_validation_rejects(#[case] mutate: fn(&mut Config, &Path)) {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        mutate(&mut config, root.path());
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_validation_accepts_existing_roots() {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.libraries.push(library("Books", root.path()));
        config.libraries.push(library("Audio", root.path()));
        config.validate().unwrap();
    }
}
