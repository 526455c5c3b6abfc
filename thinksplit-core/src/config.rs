use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{CoreResult, ThinkSplitError};

fn default_separator() -> String {
    "\n".to_string()
}

/// Construction-time settings of one extractor. Immutable once an extractor is built.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExtractorCfg {
    /// Tag name without angle brackets, e.g. `think` for `<think>...</think>`.
    pub tag_name: String,
    /// Inserted once when a channel resumes after a phase switch.
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl ExtractorCfg {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            separator: default_separator(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Only emptiness is rejected; the tag name is otherwise taken verbatim.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tag_name.is_empty() {
            return Err(ThinkSplitError::Validation(
                "extractor tag_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn opening_tag(&self) -> String {
        format!("<{}>", self.tag_name)
    }

    pub fn closing_tag(&self) -> String {
        format!("</{}>", self.tag_name)
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
fn default_ansi() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingCfg {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            ansi: default_ansi(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub extractor: ExtractorCfg,
    /// Missing in minimal configs → defaults.
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    /// The extractor section is validated before returning.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(ThinkSplitError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| ThinkSplitError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| ThinkSplitError::Other(e.into()))?
            }
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| ThinkSplitError::Other(e.into()))?
            }
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| ThinkSplitError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s).map_err(|e| ThinkSplitError::Other(e.into()))
                })?,
        };
        cfg.extractor.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn derived_tags() {
        let cfg = ExtractorCfg::new("think");
        assert_eq!(cfg.opening_tag(), "<think>");
        assert_eq!(cfg.closing_tag(), "</think>");
        assert_eq!(cfg.separator, "\n");
        assert_eq!(cfg.with_separator("\n\n").separator, "\n\n");
    }

    #[test]
    fn empty_tag_name_is_rejected() {
        let err = ExtractorCfg::new("").validate().unwrap_err();
        match err {
            ThinkSplitError::Validation(msg) => assert!(msg.contains("tag_name")),
            other => panic!("expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("split.json");
        let json = r#"{
          "extractor": {"tag_name": "think"},
          "logging": {"filter": "thinksplit_core=debug"}
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.extractor.tag_name, "think");
        assert_eq!(cfg.extractor.separator, "\n");
        assert_eq!(cfg.logging.filter, "thinksplit_core=debug");
        assert!(cfg.logging.ansi);
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("split.toml");
        let toml = r#"
[extractor]
tag_name = "reasoning"
separator = "\n\n"
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.extractor.tag_name, "reasoning");
        assert_eq!(cfg.extractor.separator, "\n\n");
        assert_eq!(cfg.logging, LoggingCfg::default());
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/thinksplit-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        match err {
            ThinkSplitError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_utf8_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.bin");
        fs::write(&file, vec![0xff, 0xfe, 0xfd, 0x00, 0x80]).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            ThinkSplitError::Other(_) => {}
            other => panic!("expected Other(utf8) error, got: {:?}", other),
        }
    }

    #[test]
    fn empty_tag_in_file_fails_validation() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.json");
        fs::write(&file, r#"{"extractor":{"tag_name":""}}"#).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            ThinkSplitError::Validation(_) => {}
            other => panic!("expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("split.conf");
        fs::write(&json_path, r#"{"extractor":{"tag_name":"think","separator":" "}}"#).unwrap();
        let cfg = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg.extractor.separator, " ");

        let toml_path = dir.path().join("split2.conf");
        let toml = r#"
[extractor]
tag_name = "think"

[logging]
ansi = false
"#;
        fs::write(&toml_path, toml).unwrap();
        let cfg = Config::from_path(&toml_path).unwrap();
        assert_eq!(cfg.extractor.tag_name, "think");
        assert!(!cfg.logging.ansi);
        assert_eq!(cfg.logging.filter, "info");
    }
}
