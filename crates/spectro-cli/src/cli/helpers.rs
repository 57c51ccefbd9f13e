use super::CliError;
use anyhow::Context;
use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use spectro_core::domain::{DEFAULT_WAVE_END, DEFAULT_WAVE_START, SpectroError, WaveRange};
use spectro_core::parser::TextEncoding;
use spectro_core::store::MeasurementStore;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) const CONFIG_FILE_NAME: &str = "spectro.json";
pub(super) const DEFAULT_STORE_RELATIVE_PATH: &str = ".spectro/catalog.json";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(super) struct SpectroConfig {
    pub(super) store: PathBuf,
    pub(super) encoding: String,
    pub(super) wave_start: f64,
    pub(super) wave_end: f64,
}

impl Default for SpectroConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from(DEFAULT_STORE_RELATIVE_PATH),
            encoding: TextEncoding::UTF8.name().to_string(),
            wave_start: DEFAULT_WAVE_START,
            wave_end: DEFAULT_WAVE_END,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct CliContext {
    pub(super) working_dir: PathBuf,
    pub(super) store_path: PathBuf,
    pub(super) config: SpectroConfig,
}

impl CliContext {
    pub(super) fn open_store(&self) -> Result<MeasurementStore, CliError> {
        tracing::debug!(store = %self.store_path.display(), "opening measurement store");
        MeasurementStore::open(&self.store_path).map_err(CliError::from)
    }

    pub(super) fn encoding(&self, flag: Option<&str>) -> Result<TextEncoding, CliError> {
        let label = flag.unwrap_or(&self.config.encoding);
        TextEncoding::for_label(label).map_err(CliError::from)
    }

    /// Initial window for new samples; each flag overrides its configured bound.
    pub(super) fn ingest_range(
        &self,
        wave_start: Option<f64>,
        wave_end: Option<f64>,
    ) -> Result<WaveRange, CliError> {
        wave_range(
            wave_start.unwrap_or(self.config.wave_start),
            wave_end.unwrap_or(self.config.wave_end),
        )
    }

    pub(super) fn resolve(&self, path: &Path) -> PathBuf {
        absolute_from(&self.working_dir, path)
    }
}

pub(super) fn resolve_context(
    config_flag: Option<&Path>,
    store_flag: Option<&Path>,
) -> Result<CliContext, CliError> {
    let working_dir = current_working_dir()?;
    let config_path = match config_flag {
        Some(path) => Some(absolute_from(&working_dir, path)),
        None => find_config_file(&working_dir),
    };

    let (config, config_dir) = match config_path {
        Some(path) => {
            let config = load_config(&path)?;
            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| working_dir.clone());
            (config, config_dir)
        }
        None => (SpectroConfig::default(), working_dir.clone()),
    };

    let store_path = match store_flag {
        Some(path) => absolute_from(&working_dir, path),
        None => absolute_from(&config_dir, &config.store),
    };

    Ok(CliContext {
        working_dir,
        store_path,
        config,
    })
}

pub(super) fn current_working_dir() -> Result<PathBuf, SpectroError> {
    std::env::current_dir().map_err(|source| {
        SpectroError::storage(
            "IO.CLI_CURRENT_DIR",
            format!("failed to read current working directory: {}", source),
        )
    })
}

pub(super) fn find_config_file(start: &Path) -> Option<PathBuf> {
    for candidate in start.ancestors() {
        let config = candidate.join(CONFIG_FILE_NAME);
        if config.is_file() {
            return Some(config);
        }
    }
    None
}

pub(super) fn load_config(path: &Path) -> Result<SpectroConfig, CliError> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    serde_json::from_str::<SpectroConfig>(&content)
        .with_context(|| format!("failed to parse config '{}'", path.display()))
        .map_err(CliError::from)
}

fn absolute_from(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub(super) fn wave_range(wave_start: f64, wave_end: f64) -> Result<WaveRange, CliError> {
    WaveRange::new(wave_start, wave_end).map_err(CliError::from)
}

pub(super) fn build_matcher(pattern: &str) -> Result<GlobMatcher, CliError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| {
            CliError::Spectro(SpectroError::input_validation(
                "INPUT.CLI_PATTERN",
                format!("invalid file pattern '{}': {}", pattern, source),
            ))
        })
}

/// Regular files directly inside `directory` whose file name matches, sorted
/// by path.
pub(super) fn matching_files(
    directory: &Path,
    matcher: &GlobMatcher,
) -> Result<Vec<PathBuf>, CliError> {
    let entries = fs::read_dir(directory).map_err(|source| {
        SpectroError::source_unavailable(
            "IO.SOURCE_DIRECTORY",
            format!(
                "failed to read directory '{}': {}",
                directory.display(),
                source
            ),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list directory '{}'", directory.display()))?
            .path();
        let matches = path
            .file_name()
            .is_some_and(|file_name| matcher.is_match(file_name));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::{
        CONFIG_FILE_NAME, SpectroConfig, build_matcher, find_config_file, load_config,
        matching_files,
    };
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn config_fields_default_individually() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "encoding": "windows-1250", "wave_end": 700.0 }"#)
            .expect("config should be written");

        let config = load_config(&path).expect("config should parse");
        assert_eq!(config.encoding, "windows-1250");
        assert_eq!(config.wave_start, 400.0);
        assert_eq!(config.wave_end, 700.0);
        assert_eq!(config.store, PathBuf::from(".spectro/catalog.json"));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{ "stroe": "x.json" }"#).expect("config should be written");

        load_config(&path).expect_err("typo should be rejected");
        assert_eq!(SpectroConfig::default().encoding, "UTF-8");
    }

    #[test]
    fn config_is_found_in_ancestor_directories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("nested dirs should be created");
        fs::write(temp.path().join(CONFIG_FILE_NAME), "{}").expect("config should be written");

        assert_eq!(
            find_config_file(&nested),
            Some(temp.path().join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn only_matching_files_are_listed_in_order() {
        let temp = TempDir::new().expect("tempdir should be created");
        for name in ["b.txt", "a.txt", "notes.md"] {
            fs::write(temp.path().join(name), "").expect("fixture should be written");
        }
        fs::create_dir(temp.path().join("dir.txt")).expect("dir should be created");

        let matcher = build_matcher("*.txt").expect("pattern should compile");
        let files = matching_files(temp.path(), &matcher).expect("listing should succeed");
        assert_eq!(
            files,
            vec![temp.path().join("a.txt"), temp.path().join("b.txt")]
        );

        build_matcher("[").expect_err("unclosed class should be rejected");
    }
}
