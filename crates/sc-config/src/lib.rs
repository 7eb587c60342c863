// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the procurement pipeline.
//!
//! This crate provides [`SupplyEngineConfig`] — the top-level runtime
//! settings — together with helpers for loading from TOML files, merging
//! overlays, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A supplier poll/handler timeout is unusually large.
    LargeTimeout {
        /// Supplier name.
        supplier: String,
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { supplier, secs } => {
                write!(f, "supplier '{supplier}' has a large timeout ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the procurement pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SupplyEngineConfig {
    /// Default poll interval, in seconds, for async report endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_poll_interval_secs: Option<u64>,

    /// Maximum number of poll retries for async report endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_poll_retries: Option<u32>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Directory for persisting Manifest/Stamp JSON files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifests_dir: Option<String>,

    /// Named supplier overrides (base URL, rate limit, credentials source).
    #[serde(default)]
    pub suppliers: BTreeMap<String, SupplierEntry>,
}

impl Default for SupplyEngineConfig {
    fn default() -> Self {
        Self {
            default_poll_interval_secs: Some(60),
            default_poll_retries: Some(6),
            log_level: Some("info".into()),
            manifests_dir: None,
            suppliers: BTreeMap::new(),
        }
    }
}

/// Configuration for a single supplier.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SupplierEntry {
    /// A mock supplier (for testing against `wiremock`).
    #[serde(rename = "mock")]
    Mock {
        /// Base URL to target instead of the real supplier endpoint.
        base_url: String,
    },
    /// A live third-party HTTP supplier.
    #[serde(rename = "live")]
    Live {
        /// Base URL for the supplier's API.
        base_url: String,
        /// Environment variable name holding the API key.
        api_key_env: String,
        /// Optional per-handler timeout in seconds (1–86 400).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed timeout in seconds (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 3_600;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`SupplyEngineConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`SupplyEngineConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<SupplyEngineConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => SupplyEngineConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`SupplyEngineConfig`].
pub fn parse_toml(content: &str) -> Result<SupplyEngineConfig, ConfigError> {
    toml::from_str::<SupplyEngineConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `SUPPLYCHAIN_LOG_LEVEL`
/// - `SUPPLYCHAIN_MANIFESTS_DIR`
/// - `SUPPLYCHAIN_POLL_INTERVAL_SECS`
/// - `SUPPLYCHAIN_POLL_RETRIES`
pub fn apply_env_overrides(config: &mut SupplyEngineConfig) {
    if let Ok(val) = std::env::var("SUPPLYCHAIN_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("SUPPLYCHAIN_MANIFESTS_DIR") {
        config.manifests_dir = Some(val);
    }
    if let Ok(val) = std::env::var("SUPPLYCHAIN_POLL_INTERVAL_SECS")
        && let Ok(n) = val.parse()
    {
        config.default_poll_interval_secs = Some(n);
    }
    if let Ok(val) = std::env::var("SUPPLYCHAIN_POLL_RETRIES")
        && let Ok(n) = val.parse()
    {
        config.default_poll_retries = Some(n);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty base URLs, out-of-range timeouts) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &SupplyEngineConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    for (name, supplier) in &config.suppliers {
        if name.is_empty() {
            errors.push("supplier name must not be empty".into());
        }

        match supplier {
            SupplierEntry::Live {
                base_url,
                api_key_env,
                timeout_secs,
            } => {
                if base_url.trim().is_empty() {
                    errors.push(format!("supplier '{name}': base_url must not be empty"));
                }
                if api_key_env.trim().is_empty() {
                    errors.push(format!("supplier '{name}': api_key_env must not be empty"));
                }
                if let Some(t) = timeout_secs {
                    if *t == 0 || *t > MAX_TIMEOUT_SECS {
                        errors.push(format!(
                            "supplier '{name}': timeout {t}s out of range (1..{MAX_TIMEOUT_SECS})"
                        ));
                    } else if *t > LARGE_TIMEOUT_THRESHOLD {
                        warnings.push(ConfigWarning::LargeTimeout {
                            supplier: name.clone(),
                            secs: *t,
                        });
                    }
                }
            }
            SupplierEntry::Mock { base_url } => {
                if base_url.trim().is_empty() {
                    errors.push(format!("supplier '{name}': base_url must not be empty"));
                }
            }
        }
    }

    if config.manifests_dir.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "manifests_dir".into(),
            hint: "manifests will be kept in memory only, not persisted to disk".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Supplier maps are combined; on name collisions the overlay entry wins.
pub fn merge_configs(base: SupplyEngineConfig, overlay: SupplyEngineConfig) -> SupplyEngineConfig {
    let mut suppliers = base.suppliers;
    suppliers.extend(overlay.suppliers);
    SupplyEngineConfig {
        default_poll_interval_secs: overlay
            .default_poll_interval_secs
            .or(base.default_poll_interval_secs),
        default_poll_retries: overlay.default_poll_retries.or(base.default_poll_retries),
        log_level: overlay.log_level.or(base.log_level),
        manifests_dir: overlay.manifests_dir.or(base.manifests_dir),
        suppliers,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use std::io::Write;

    // -- 1. Default config is valid ------------------------------------------

    #[test]
    fn default_config_is_valid() {
        let cfg = SupplyEngineConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(!warnings.is_empty(), "should have advisory warnings");
    }

    // -- 2. Default config has sensible defaults -----------------------------

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = SupplyEngineConfig::default();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
        assert_eq!(cfg.default_poll_interval_secs, Some(60));
        assert_eq!(cfg.default_poll_retries, Some(6));
        assert!(cfg.suppliers.is_empty());
    }

    // -- 3. Load from valid TOML string --------------------------------------

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            log_level = "debug"
            manifests_dir = "/tmp/manifests"

            [suppliers.virustotal]
            type = "live"
            base_url = "https://www.virustotal.com/vtapi/v2/"
            api_key_env = "VT_API_KEY"
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.suppliers.len(), 1);
    }

    // -- 4. Load from invalid TOML produces ParseError -----------------------

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let bad = "this is [not valid toml =";
        let err = parse_toml(bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 5. Valid TOML but wrong types gives ParseError ----------------------

    #[test]
    fn parse_wrong_types_gives_parse_error() {
        let toml = r#"log_level = 42"#;
        let err = parse_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 6. Validation catches invalid log level -----------------------------

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = SupplyEngineConfig {
            log_level: Some("verbose".into()),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 7. Validation catches empty live base_url ---------------------------

    #[test]
    fn validation_catches_empty_base_url() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.suppliers.insert(
            "bad".into(),
            SupplierEntry::Live {
                base_url: "  ".into(),
                api_key_env: "KEY".into(),
                timeout_secs: None,
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("base_url must not be empty")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    // -- 8. Validation catches zero timeout ----------------------------------

    #[test]
    fn validation_catches_zero_timeout() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.suppliers.insert(
            "s".into(),
            SupplierEntry::Live {
                base_url: "https://example.com".into(),
                api_key_env: "KEY".into(),
                timeout_secs: Some(0),
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 9. Validation catches timeout exceeding max -------------------------

    #[test]
    fn validation_catches_timeout_exceeding_max() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.suppliers.insert(
            "s".into(),
            SupplierEntry::Live {
                base_url: "https://example.com".into(),
                api_key_env: "KEY".into(),
                timeout_secs: Some(MAX_TIMEOUT_SECS + 1),
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 10. Valid config with suppliers passes validation -------------------

    #[test]
    fn valid_config_with_suppliers_passes() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.manifests_dir = Some("/tmp".into());
        cfg.suppliers.insert(
            "mock".into(),
            SupplierEntry::Mock {
                base_url: "http://127.0.0.1:9999".into(),
            },
        );
        cfg.suppliers.insert(
            "virustotal".into(),
            SupplierEntry::Live {
                base_url: "https://www.virustotal.com/vtapi/v2/".into(),
                api_key_env: "VT_API_KEY".into(),
                timeout_secs: Some(30),
            },
        );
        validate_config(&cfg).expect("should pass");
    }

    // -- 11. Large timeout produces warning ----------------------------------

    #[test]
    fn large_timeout_produces_warning() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.manifests_dir = Some("/tmp".into());
        cfg.suppliers.insert(
            "vt".into(),
            SupplierEntry::Live {
                base_url: "https://www.virustotal.com".into(),
                api_key_env: "VT_API_KEY".into(),
                timeout_secs: Some(7200),
            },
        );
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.iter().any(|w| matches!(w, ConfigWarning::LargeTimeout { .. })));
    }

    // -- 12. Merge overlay overrides base values -----------------------------

    #[test]
    fn merge_overlay_overrides_base() {
        let base = SupplyEngineConfig {
            log_level: Some("info".into()),
            ..Default::default()
        };
        let overlay = SupplyEngineConfig {
            log_level: None,
            default_poll_retries: Some(3),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.log_level.as_deref(), Some("info"));
        assert_eq!(merged.default_poll_retries, Some(3));
    }

    // -- 13. Merge preserves base when overlay is default --------------------

    #[test]
    fn merge_preserves_base_when_overlay_is_default() {
        let base = SupplyEngineConfig {
            default_poll_interval_secs: Some(30),
            log_level: Some("debug".into()),
            manifests_dir: Some("/manifests".into()),
            suppliers: BTreeMap::from([(
                "m".into(),
                SupplierEntry::Mock {
                    base_url: "http://localhost".into(),
                },
            )]),
            ..Default::default()
        };
        let merged = merge_configs(base.clone(), SupplyEngineConfig::default());
        assert_eq!(merged.manifests_dir.as_deref(), Some("/manifests"));
        assert!(merged.suppliers.contains_key("m"));
    }

    // -- 14. Merge combines supplier maps -------------------------------------

    #[test]
    fn merge_combines_supplier_maps() {
        let base = SupplyEngineConfig {
            suppliers: BTreeMap::from([(
                "a".into(),
                SupplierEntry::Mock {
                    base_url: "http://a".into(),
                },
            )]),
            ..Default::default()
        };
        let overlay = SupplyEngineConfig {
            suppliers: BTreeMap::from([(
                "b".into(),
                SupplierEntry::Mock {
                    base_url: "http://b".into(),
                },
            )]),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert!(merged.suppliers.contains_key("a"));
        assert!(merged.suppliers.contains_key("b"));
    }

    // -- 15. Merge overlay supplier wins on collision ------------------------

    #[test]
    fn merge_overlay_supplier_wins_on_collision() {
        let base = SupplyEngineConfig {
            suppliers: BTreeMap::from([(
                "vt".into(),
                SupplierEntry::Live {
                    base_url: "https://old".into(),
                    api_key_env: "OLD_KEY".into(),
                    timeout_secs: None,
                },
            )]),
            ..Default::default()
        };
        let overlay = SupplyEngineConfig {
            suppliers: BTreeMap::from([(
                "vt".into(),
                SupplierEntry::Live {
                    base_url: "https://new".into(),
                    api_key_env: "NEW_KEY".into(),
                    timeout_secs: Some(60),
                },
            )]),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        match &merged.suppliers["vt"] {
            SupplierEntry::Live { base_url, .. } => assert_eq!(base_url, "https://new"),
            other => panic!("expected Live, got {other:?}"),
        }
    }

    // -- 16. Empty string TOML is valid (all defaults) -----------------------

    #[test]
    fn empty_string_toml_parses_to_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg.log_level, None);
        assert!(cfg.suppliers.is_empty());
    }

    // -- 17. Roundtrip serialize / deserialize -------------------------------

    #[test]
    fn toml_roundtrip() {
        let cfg = SupplyEngineConfig {
            default_poll_interval_secs: Some(45),
            default_poll_retries: Some(5),
            log_level: Some("debug".into()),
            manifests_dir: Some("/r".into()),
            suppliers: BTreeMap::from([(
                "m".into(),
                SupplierEntry::Mock {
                    base_url: "http://localhost".into(),
                },
            )]),
        };
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: SupplyEngineConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    // -- 18. Load from file on disk ------------------------------------------

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supplychain.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "log_level = \"warn\"\nmanifests_dir = \"/tmp/m\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));
        assert_eq!(cfg.manifests_dir.as_deref(), Some("/tmp/m"));
    }

    // -- 19. Load missing file gives FileNotFound ----------------------------

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/supplychain.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    // -- 20. Load None path returns default config ---------------------------

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    // -- 21. Validation catches empty supplier name --------------------------

    #[test]
    fn validation_catches_empty_supplier_name() {
        let mut cfg = SupplyEngineConfig::default();
        cfg.suppliers.insert(
            "".into(),
            SupplierEntry::Mock {
                base_url: "http://x".into(),
            },
        );
        let err = validate_config(&cfg).unwrap_err();
        match err {
            ConfigError::ValidationError { reasons } => {
                assert!(reasons.iter().any(|r| r.contains("name must not be empty")));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    // -- 22. ConfigError Display trait ----------------------------------------

    #[test]
    fn config_error_display() {
        let e = ConfigError::FileNotFound {
            path: "/foo".into(),
        };
        assert!(e.to_string().contains("/foo"));

        let e = ConfigError::ParseError {
            reason: "bad toml".into(),
        };
        assert!(e.to_string().contains("bad toml"));

        let e = ConfigError::MergeConflict {
            reason: "oops".into(),
        };
        assert!(e.to_string().contains("oops"));
    }

    // -- 23. ConfigWarning Display trait --------------------------------------

    #[test]
    fn config_warning_display() {
        let w = ConfigWarning::DeprecatedField {
            field: "old_field".into(),
            suggestion: Some("new_field".into()),
        };
        let s = w.to_string();
        assert!(s.contains("old_field"));
        assert!(s.contains("new_field"));

        let w = ConfigWarning::MissingOptionalField {
            field: "f".into(),
            hint: "h".into(),
        };
        assert!(w.to_string().contains('f'));

        let w = ConfigWarning::LargeTimeout {
            supplier: "vt".into(),
            secs: 9999,
        };
        assert!(w.to_string().contains("9999"));
    }

    // -- 24. Nested live-supplier args roundtrip -----------------------------

    #[test]
    fn live_supplier_roundtrip() {
        let toml_str = r#"
            [suppliers.virustotal]
            type = "live"
            base_url = "https://www.virustotal.com/vtapi/v2/"
            api_key_env = "VT_API_KEY"
            timeout_secs = 120
        "#;
        let cfg = parse_toml(toml_str).unwrap();
        match &cfg.suppliers["virustotal"] {
            SupplierEntry::Live {
                base_url,
                api_key_env,
                timeout_secs,
            } => {
                assert_eq!(base_url, "https://www.virustotal.com/vtapi/v2/");
                assert_eq!(api_key_env, "VT_API_KEY");
                assert_eq!(*timeout_secs, Some(120));
            }
            other => panic!("expected Live, got {other:?}"),
        }
    }

    // -- 25. Merge manifests_dir overlay wins --------------------------------

    #[test]
    fn merge_manifests_dir_overlay_wins() {
        let base = SupplyEngineConfig {
            manifests_dir: Some("/old".into()),
            ..Default::default()
        };
        let overlay = SupplyEngineConfig {
            manifests_dir: Some("/new".into()),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.manifests_dir.as_deref(), Some("/new"));
    }
}
