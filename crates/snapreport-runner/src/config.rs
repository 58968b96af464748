use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snapreport_core::{QueryCatalog, RenderOptions};

pub const DEFAULT_CONFIG_FILE: &str = "snapreport.toml";
pub const ENV_REGION: &str = "SNAPREPORT_REGION";
pub const ENV_CONTAINER: &str = "SNAPREPORT_CONTAINER";
pub const ENV_SCRATCH_DIR: &str = "SNAPREPORT_SCRATCH_DIR";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub deployment: DeploymentConfig,
    pub snapshot: SnapshotConfig,
    pub scratch: ScratchConfig,
    pub report: ReportConfig,
    pub dispatch: DispatchConfig,
    pub params: ParamsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeploymentConfig {
    pub region: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub container: String,
    pub object_key: String,
    pub store_root: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScratchConfig {
    pub dir: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    pub merge_cells: bool,
    pub row_separator: bool,
    pub render_as_table: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Outbox,
    Command,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Parameter key holding the downstream target identifier.
    pub target_param: String,
    pub event_source: String,
    pub mode: DispatchMode,
    pub outbox_dir: String,
    pub command_args: Vec<String>,
    /// Upper bound on the serialized envelope; 0 means unlimited.
    pub max_payload_bytes: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParamsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            container: "retgits-fdio".to_string(),
            object_key: "fdiodb.db".to_string(),
            store_root: "~/.snapreport/store".to_string(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self { dir: ".".to_string() }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let opts = RenderOptions::default();
        Self {
            title: "Weekly stats for Flogo".to_string(),
            catalog: None,
            merge_cells: opts.merge_cells,
            row_separator: opts.row_separator,
            render_as_table: opts.render_as_table,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            target_param: "/trello/arn".to_string(),
            event_source: "snapreport:pipeline".to_string(),
            mode: DispatchMode::Outbox,
            outbox_dir: "~/.snapreport/outbox".to_string(),
            command_args: vec![],
            max_payload_bytes: 6 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (explicit path, or `snapreport.toml` in
    /// the working directory when present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::load_from(p)?,
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::load_from(local)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "serialize toml")
    }

    /// Overlay the environment-style settings. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).filter(|v| !v.is_empty());
        if let Some(v) = get(ENV_REGION) {
            self.deployment.region = v;
        }
        if let Some(v) = get(ENV_CONTAINER) {
            self.snapshot.container = v;
        }
        if let Some(v) = get(ENV_SCRATCH_DIR) {
            self.scratch.dir = v;
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            merge_cells: self.report.merge_cells,
            row_separator: self.report.row_separator,
            render_as_table: self.report.render_as_table,
        }
    }

    /// The built-in catalog unless `report.catalog` names a YAML file.
    pub fn load_catalog(&self) -> Result<QueryCatalog> {
        match &self.report.catalog {
            Some(p) => {
                let path = expand(p);
                let s = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
                QueryCatalog::from_yaml_str(&s).with_context(|| format!("load query catalog {}", path.display()))
            }
            None => Ok(QueryCatalog::builtin()),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        expand(&self.scratch.dir)
    }

    pub fn store_root(&self) -> PathBuf {
        expand(&self.snapshot.store_root)
    }

    pub fn outbox_dir(&self) -> PathBuf {
        expand(&self.dispatch.outbox_dir)
    }

    pub fn params_file(&self) -> Option<PathBuf> {
        self.params.file.as_deref().map(expand)
    }
}

fn expand(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}
