//! Deployment configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI)
//! 2. Environment variables (FABDEPLOY_WORKSPACE_ID, FABDEPLOY_TOKEN,
//!    FABDEPLOY_API_ROOT, FABDEPLOY_ENVIRONMENT)
//! 3. `environments.<NAME>.deployment` overlay in the config file
//! 4. `deployment` section of the config file
//! 5. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .fabdeploy/config.yaml
//! - Falls back to <user config dir>/fabdeploy/config.yaml
//! - `bundle_dir` is relative to the directory holding `.fabdeploy/`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::adapters::fabric::DEFAULT_API_ROOT;
use crate::core::{RetryPolicy, StagePlan, SubstitutionMode};
use crate::domain::{SelfArtifact, SelfPolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".fabdeploy";
const CONFIG_FILE: &str = "config.yaml";

/// The `deployment` section after environment overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub workspace_id: Option<String>,
    pub environment: Option<String>,
    pub api_root_url: String,

    /// Bundle root holding the artifact directories
    pub bundle_dir: PathBuf,

    pub allow_non_empty_workspace: bool,
    pub fix_zero_logical_ids: bool,
    pub item_types: Option<Vec<String>>,
    pub item_type_stages: Option<Vec<Vec<String>>>,
    pub deployment_retries: u32,
    pub retry_delay_seconds: u64,

    /// Artifact the deployment is driven from; tolerated by the
    /// empty-workspace check. When unset the workspace must be empty.
    pub self_item_name: Option<String>,
    pub self_item_type: Option<String>,

    pub substitution_mode: SubstitutionMode,
    pub verify_after_deployment: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            workspace_id: None,
            environment: None,
            api_root_url: DEFAULT_API_ROOT.to_string(),
            bundle_dir: PathBuf::from("workspace"),
            allow_non_empty_workspace: false,
            fix_zero_logical_ids: true,
            item_types: None,
            item_type_stages: None,
            deployment_retries: 2,
            retry_delay_seconds: 10,
            self_item_name: None,
            self_item_type: None,
            substitution_mode: SubstitutionMode::default(),
            verify_after_deployment: false,
        }
    }
}

impl DeploymentConfig {
    pub fn stage_plan(&self) -> crate::error::Result<StagePlan> {
        StagePlan::from_options(self.item_types.clone(), self.item_type_stages.clone())
    }

    /// Fixed-delay retry policy from `deployment_retries` and
    /// `retry_delay_seconds`
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.deployment_retries,
            std::time::Duration::from_secs(self.retry_delay_seconds),
        )
    }

    /// The command line runs outside the workspace, so without a configured
    /// self artifact nothing is tolerated
    pub fn self_policy(&self) -> SelfPolicy {
        let Some(name) = self.self_item_name.as_deref().filter(|n| !n.is_empty()) else {
            return SelfPolicy::Absent;
        };
        let artifact = SelfArtifact::named(name);
        SelfPolicy::Named(match self.self_item_type.as_deref() {
            Some(kind) if !kind.is_empty() => artifact.with_type(kind),
            _ => artifact,
        })
    }
}

/// Values taken from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub workspace_id: Option<String>,
    pub token: Option<String>,
    pub api_root: Option<String>,
    pub environment: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            workspace_id: var("FABDEPLOY_WORKSPACE_ID"),
            token: var("FABDEPLOY_TOKEN"),
            api_root: var("FABDEPLOY_API_ROOT"),
            environment: var("FABDEPLOY_ENVIRONMENT"),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub deployment: DeploymentConfig,

    /// Bearer token for the workspace API
    pub token: Option<String>,

    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Find config file from the current directory, then the user config dir
fn find_config_file() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file_from(&cwd))
        .or_else(|| {
            let path = dirs::config_dir()?.join("fabdeploy").join(CONFIG_FILE);
            path.exists().then_some(path)
        })
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let doc: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    // An empty file parses as null
    Ok(if doc.is_null() {
        Value::Mapping(Default::default())
    } else {
        doc
    })
}

/// Merge `overlay` into `base`; mappings merge key by key, anything else
/// replaces
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Extract the `deployment` section with the named environment's overlay
fn deployment_section(doc: &Value, environment: Option<&str>) -> Result<DeploymentConfig> {
    let mut section = doc
        .get("deployment")
        .cloned()
        .unwrap_or_else(|| Value::Mapping(Default::default()));

    let environment = environment
        .map(str::to_string)
        .or_else(|| {
            section
                .get("environment")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    if let Some(name) = &environment {
        if let Some(overlay) = doc
            .get("environments")
            .and_then(|envs| envs.get(name.as_str()))
            .and_then(|env| env.get("deployment"))
        {
            deep_merge(&mut section, overlay.clone());
        }
    }

    let mut deployment: DeploymentConfig = if section.is_null() {
        DeploymentConfig::default()
    } else {
        serde_yaml::from_value(section).context("Invalid deployment section")?
    };

    if environment.is_some() {
        deployment.environment = environment;
    }

    Ok(deployment)
}

/// Load configuration from an explicit file (or discovery) plus overrides
pub fn load_config_with(config_file: Option<PathBuf>, env: &EnvOverrides) -> Result<ResolvedConfig> {
    let environment = env.environment.as_deref();

    let mut deployment = match &config_file {
        Some(path) => {
            let doc = load_config_file(path)?;
            let mut deployment = deployment_section(&doc, environment)?;

            // Project root is the parent of .fabdeploy/
            if deployment.bundle_dir.is_relative() {
                let base_dir = path
                    .parent()
                    .and_then(|p| p.parent())
                    .unwrap_or(Path::new("."));
                deployment.bundle_dir = base_dir.join(&deployment.bundle_dir);
            }
            deployment
        }
        None => DeploymentConfig {
            environment: env.environment.clone(),
            ..DeploymentConfig::default()
        },
    };

    if let Some(ws) = &env.workspace_id {
        deployment.workspace_id = Some(ws.clone());
    }
    if let Some(root) = &env.api_root {
        deployment.api_root_url = root.clone();
    }

    Ok(ResolvedConfig {
        deployment,
        token: env.token.clone(),
        config_file,
    })
}

/// Load configuration from all sources
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };
    load_config_with(config_file, &EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config(None).map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
deployment:
  workspace_id: ws-dev
  environment: DEV
  allow_non_empty_workspace: false
  item_type_stages:
    - [Lakehouse]
    - [Notebook]
  deployment_retries: 3
  self_item_name: Launcher
  self_item_type: Notebook
environments:
  PROD:
    deployment:
      workspace_id: ws-prod
      deployment_retries: 5
"#;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config_with(None, &EnvOverrides::default()).unwrap();
        let d = &config.deployment;

        assert!(config.config_file.is_none());
        assert_eq!(d.api_root_url, DEFAULT_API_ROOT);
        assert!(d.fix_zero_logical_ids);
        assert!(!d.allow_non_empty_workspace);
        assert_eq!(d.deployment_retries, 2);
        assert_eq!(d.retry_delay_seconds, 10);
        assert_eq!(d.stage_plan().unwrap().len(), 1);
        assert_eq!(d.self_policy(), SelfPolicy::Absent);
    }

    #[test]
    fn test_config_file_parsing() {
        let (temp, path) = write_config(SAMPLE);
        let config = load_config_with(Some(path), &EnvOverrides::default()).unwrap();
        let d = &config.deployment;

        assert_eq!(d.workspace_id.as_deref(), Some("ws-dev"));
        assert_eq!(d.environment.as_deref(), Some("DEV"));
        assert_eq!(d.deployment_retries, 3);
        assert_eq!(d.stage_plan().unwrap().len(), 2);
        assert_eq!(d.bundle_dir, temp.path().join("workspace"));

        assert_eq!(
            d.self_policy(),
            SelfPolicy::Named(SelfArtifact::named("Launcher").with_type("Notebook"))
        );
    }

    #[test]
    fn test_environment_overlay() {
        let (_temp, path) = write_config(SAMPLE);
        let env = EnvOverrides {
            environment: Some("PROD".to_string()),
            ..Default::default()
        };
        let d = load_config_with(Some(path), &env).unwrap().deployment;

        assert_eq!(d.workspace_id.as_deref(), Some("ws-prod"));
        assert_eq!(d.deployment_retries, 5);
        assert_eq!(d.environment.as_deref(), Some("PROD"));
        // Untouched keys survive the merge
        assert_eq!(d.self_item_name.as_deref(), Some("Launcher"));
        assert_eq!(d.stage_plan().unwrap().len(), 2);
    }

    #[test]
    fn test_env_overrides_win() {
        let (_temp, path) = write_config(SAMPLE);
        let env = EnvOverrides {
            workspace_id: Some("ws-env".to_string()),
            token: Some("secret".to_string()),
            api_root: Some("http://localhost:9999".to_string()),
            environment: None,
        };
        let config = load_config_with(Some(path), &env).unwrap();

        assert_eq!(config.deployment.workspace_id.as_deref(), Some("ws-env"));
        assert_eq!(config.deployment.api_root_url, "http://localhost:9999");
        assert_eq!(config.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_conflicting_scopes_rejected() {
        let (_temp, path) = write_config(
            "deployment:\n  item_types: [Lakehouse]\n  item_type_stages: [[Notebook]]\n",
        );
        let d = load_config_with(Some(path), &EnvOverrides::default())
            .unwrap()
            .deployment;
        assert!(d.stage_plan().is_err());
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let (temp, path) = write_config("deployment: {}\n");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file_from(&nested), Some(path));
    }

    #[test]
    fn test_deep_merge_nested() {
        let mut base: Value = serde_yaml::from_str("a: {x: 1, y: 2}\nb: [1]\n").unwrap();
        let overlay: Value = serde_yaml::from_str("a: {y: 3}\nb: [2, 3]\n").unwrap();
        deep_merge(&mut base, overlay);

        let expected: Value = serde_yaml::from_str("a: {x: 1, y: 3}\nb: [2, 3]\n").unwrap();
        assert_eq!(base, expected);
    }
}
