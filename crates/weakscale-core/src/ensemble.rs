//! Ensemble task tables consumed by the multi-node launcher
//!
//! An ensemble is a named group of tasks sharing one launch template. The
//! per-task values are stored column-wise: one array per parameter, all of
//! the same length, where index `i` across the arrays is task `i`.

use crate::{artifact, WeakscaleError, WeakscaleResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First port handed out to the tasks of an ensemble
pub const DEFAULT_BASE_PORT: u16 = 8000;

/// Launch script invoked once per task
pub const DEFAULT_CMD_TEMPLATE: &str =
    "./infer_no_ray.sh {idx} {port} {ngpus} {model} {cache_dir} {tmpdir} {num_prompts}";

/// Model served by every instance when none is given
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";

/// Default per-task scratch directory
pub const DEFAULT_TMPDIR: &str = "/tmp";

/// How the launcher maps an ensemble's tasks onto nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    /// Task `i` runs on node `idx[i]`, no fan-out or fan-in
    OneToOne,
}

impl Relation {
    /// Expand a parameter table into task placements
    pub fn expand(&self, params: &TaskParameters) -> Vec<Placement> {
        match self {
            Relation::OneToOne => params
                .idx
                .iter()
                .enumerate()
                .map(|(task, &node)| Placement { task, node })
                .collect(),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::OneToOne => write!(f, "one-to-one"),
        }
    }
}

/// A task assigned to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Position of the task in the parameter table
    pub task: usize,
    /// 1-based node index in the launcher's addressing
    pub node: u32,
}

/// Column-wise per-task launch parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameters {
    pub idx: Vec<u32>,
    pub port: Vec<u16>,
    pub ngpus: Vec<u32>,
    pub model: Vec<String>,
    pub cache_dir: Vec<PathBuf>,
    pub tmpdir: Vec<PathBuf>,
    pub num_prompts: Vec<u32>,
}

/// One row of a [`TaskParameters`] table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub idx: u32,
    pub port: u16,
    pub ngpus: u32,
    pub model: String,
    pub cache_dir: PathBuf,
    pub tmpdir: PathBuf,
    pub num_prompts: u32,
}

impl TaskParameters {
    /// Number of tasks in the table
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Column names paired with their lengths, in serialized order
    fn column_lengths(&self) -> [(&'static str, usize); 7] {
        [
            ("idx", self.idx.len()),
            ("port", self.port.len()),
            ("ngpus", self.ngpus.len()),
            ("model", self.model.len()),
            ("cache_dir", self.cache_dir.len()),
            ("tmpdir", self.tmpdir.len()),
            ("num_prompts", self.num_prompts.len()),
        ]
    }

    /// Check that every column has the same number of entries
    pub fn validate(&self, label: &str) -> WeakscaleResult<()> {
        let expected = self.len();
        for (name, len) in self.column_lengths() {
            if len != expected {
                return Err(WeakscaleError::InvalidEnsemble {
                    label: label.to_string(),
                    reason: format!("{} has {} entries, expected {}", name, len, expected),
                });
            }
        }
        Ok(())
    }

    /// Get the complete launch configuration of task `i`
    pub fn task(&self, i: usize) -> Option<TaskSpec> {
        Some(TaskSpec {
            idx: *self.idx.get(i)?,
            port: *self.port.get(i)?,
            ngpus: *self.ngpus.get(i)?,
            model: self.model.get(i)?.clone(),
            cache_dir: self.cache_dir.get(i)?.clone(),
            tmpdir: self.tmpdir.get(i)?.clone(),
            num_prompts: *self.num_prompts.get(i)?,
        })
    }
}

impl TaskSpec {
    fn placeholder(&self, key: &str) -> Option<String> {
        let value = match key {
            "idx" => self.idx.to_string(),
            "port" => self.port.to_string(),
            "ngpus" => self.ngpus.to_string(),
            "model" => self.model.clone(),
            "cache_dir" => self.cache_dir.display().to_string(),
            "tmpdir" => self.tmpdir.display().to_string(),
            "num_prompts" => self.num_prompts.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Substitute this task's values into a `{name}` style template.
    ///
    /// Substitution is single-pass, so values that themselves contain braces
    /// are inserted verbatim. Unknown placeholders are left untouched.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            match tail.find('}') {
                Some(close) => {
                    let key = &tail[1..close];
                    match self.placeholder(key) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// A named group of tasks sharing launch parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleEntry {
    /// Nodes occupied by each task
    pub nnodes: u32,
    /// Processes per node
    pub ppn: u32,
    pub ngpus_per_process: u32,
    pub relation: Relation,
    pub cmd_template: String,
    #[serde(flatten)]
    pub params: TaskParameters,
}

impl EnsembleEntry {
    /// Task placements under this entry's relation kind
    pub fn placements(&self) -> Vec<Placement> {
        self.relation.expand(&self.params)
    }

    /// The command line the launcher runs for task `i`
    pub fn render_command(&self, i: usize) -> Option<String> {
        self.params.task(i).map(|task| task.render(&self.cmd_template))
    }
}

/// Make a model id usable inside a file or group name.
///
/// Path separators become `--`. Ids whose own dashes could be mistaken for a
/// replaced separator are percent-escaped first, so distinct ids always map
/// to distinct names.
pub fn sanitize_model_id(model: &str) -> String {
    let ambiguous = model.contains("--")
        || model.contains("-/")
        || model.contains("/-")
        || model.contains('%');
    if !ambiguous {
        return model.replace('/', "--");
    }

    let mut out = String::with_capacity(model.len() + 16);
    for c in model.chars() {
        match c {
            '%' => out.push_str("%25"),
            '-' => out.push_str("%2D"),
            '/' => out.push_str("--"),
            c => out.push(c),
        }
    }
    out
}

/// Group label for an ensemble of `ngpus`-GPU instances serving `model`
pub fn ensemble_label(ngpus: NonZeroU32, model: &str) -> String {
    format!("{}gpus_{}", ngpus, sanitize_model_id(model))
}

/// Builds the weak-scaling ensemble: one identical instance per node
#[derive(Debug, Clone)]
pub struct EnsembleBuilder {
    nnodes: NonZeroU32,
    model: String,
    ngpus: NonZeroU32,
    num_prompts: NonZeroU32,
    cache_dir: PathBuf,
    tmpdir: PathBuf,
    base_port: u16,
    cmd_template: String,
}

impl EnsembleBuilder {
    /// Create a builder with the default scratch dir, base port and template
    pub fn new(
        nnodes: NonZeroU32,
        model: impl Into<String>,
        ngpus: NonZeroU32,
        num_prompts: NonZeroU32,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            nnodes,
            model: model.into(),
            ngpus,
            num_prompts,
            cache_dir: cache_dir.into(),
            tmpdir: PathBuf::from(DEFAULT_TMPDIR),
            base_port: DEFAULT_BASE_PORT,
            cmd_template: DEFAULT_CMD_TEMPLATE.to_string(),
        }
    }

    pub fn tmpdir(mut self, tmpdir: impl Into<PathBuf>) -> Self {
        self.tmpdir = tmpdir.into();
        self
    }

    pub fn base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    pub fn cmd_template(mut self, cmd_template: impl Into<String>) -> Self {
        self.cmd_template = cmd_template.into();
        self
    }

    /// Label the built entry is stored under
    pub fn label(&self) -> String {
        ensemble_label(self.ngpus, &self.model)
    }

    /// GPUs consumed by the whole ensemble
    pub fn total_gpus(&self) -> u64 {
        u64::from(self.ngpus.get()) * u64::from(self.nnodes.get())
    }

    /// Materialize the per-task table
    pub fn build(&self) -> WeakscaleResult<EnsembleEntry> {
        let n = self.nnodes.get();
        let last_port = u32::from(self.base_port)
            .checked_add(n - 1)
            .filter(|port| *port <= u32::from(u16::MAX))
            .ok_or_else(|| {
                WeakscaleError::Config(format!(
                    "{} tasks starting at port {} exceed the port range",
                    n, self.base_port
                ))
            })?;

        let count = n as usize;
        let ngpus = self.ngpus.get();
        let params = TaskParameters {
            idx: (1..=n).collect(),
            port: (0..n).map(|i| self.base_port + i as u16).collect(),
            ngpus: vec![ngpus; count],
            model: vec![self.model.clone(); count],
            cache_dir: vec![self.cache_dir.clone(); count],
            tmpdir: vec![self.tmpdir.clone(); count],
            num_prompts: vec![self.num_prompts.get(); count],
        };

        debug!(
            label = %self.label(),
            tasks = count,
            first_port = self.base_port,
            last_port = last_port,
            "Built ensemble task table"
        );

        Ok(EnsembleEntry {
            nnodes: 1,
            ppn: 1,
            ngpus_per_process: ngpus,
            relation: Relation::OneToOne,
            cmd_template: self.cmd_template.clone(),
            params,
        })
    }

    /// Build a configuration holding just this ensemble
    pub fn build_config(&self) -> WeakscaleResult<EnsembleConfig> {
        let mut config = EnsembleConfig::new();
        config.insert(self.label(), self.build()?);
        Ok(config)
    }
}

/// The ensemble configuration artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub ensembles: BTreeMap<String, EnsembleEntry>,
}

impl EnsembleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a group, returning the entry it displaced
    pub fn insert(&mut self, label: String, entry: EnsembleEntry) -> Option<EnsembleEntry> {
        self.ensembles.insert(label, entry)
    }

    pub fn get(&self, label: &str) -> Option<&EnsembleEntry> {
        self.ensembles.get(label)
    }

    /// Check every group's table shape
    pub fn validate(&self) -> WeakscaleResult<()> {
        for (label, entry) in &self.ensembles {
            entry.params.validate(label)?;
        }
        Ok(())
    }

    /// Load and validate an ensemble configuration
    pub fn from_file(path: &Path) -> WeakscaleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WeakscaleError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration, replacing any existing file
    pub fn write_to(&self, path: &Path) -> WeakscaleResult<()> {
        artifact::write_json(path, self)?;
        info!(
            path = %path.display(),
            ensembles = self.ensembles.len(),
            "Wrote ensemble config"
        );
        Ok(())
    }
}
