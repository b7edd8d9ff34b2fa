//! Hardware topology and launcher backend records

use crate::{artifact, WeakscaleError, WeakscaleResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Hardware facts a [`SystemConfig`] is derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    /// System name
    pub name: String,
    /// GPUs per node
    pub gpu_count: u32,
    /// CPUs per node; ids run from 0 to `cpu_count - 1`
    pub cpu_count: u32,
    /// CPU ids unavailable to tasks (NUMA boundaries, host-reserved cores)
    #[serde(default)]
    pub excluded_cpus: BTreeSet<u32>,
}

impl TopologySpec {
    /// Aurora compute node: 12 GPU tiles, 104 CPUs with 0 and 52 held back
    pub fn aurora() -> Self {
        Self {
            name: "aurora".to_string(),
            gpu_count: 12,
            cpu_count: 104,
            excluded_cpus: BTreeSet::from([0, 52]),
        }
    }

    /// Load topology facts from a TOML file
    pub fn from_file(path: &Path) -> WeakscaleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WeakscaleError::Config(format!("Failed to read topology file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| WeakscaleError::Config(format!("Failed to parse topology: {}", e)))
    }

    /// Usable CPU ids in ascending order
    pub fn usable_cpus(&self) -> Vec<u32> {
        (0..self.cpu_count)
            .filter(|cpu| !self.excluded_cpus.contains(cpu))
            .collect()
    }
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::aurora()
    }
}

/// Static description of a node's hardware, consumed by the launcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    pub gpus: Vec<String>,
    pub cpus: Vec<u32>,
    pub ncpus: u32,
}

impl SystemConfig {
    pub fn from_topology(topology: &TopologySpec) -> Self {
        let cpus = topology.usable_cpus();
        Self {
            name: topology.name.clone(),
            gpus: (0..topology.gpu_count).map(|i| i.to_string()).collect(),
            ncpus: cpus.len() as u32,
            cpus,
        }
    }

    /// Write the record, replacing any existing file
    pub fn write_to(&self, path: &Path) -> WeakscaleResult<()> {
        artifact::write_json(path, self)?;
        info!(
            path = %path.display(),
            system = %self.name,
            gpus = self.gpus.len(),
            ncpus = self.ncpus,
            "Wrote system config"
        );
        Ok(())
    }
}

/// Executor used to spawn child launchers on other nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildExecutor {
    Mpi,
    Multiprocessing,
}

/// Executor used to run tasks within a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskExecutor {
    Multiprocessing,
    Mpi,
}

/// Transport between launcher processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommTransport {
    Zmq,
    Multiprocessing,
}

/// Launcher log level, stored as the numeric level Python's `logging` uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> u8 {
        match level {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warning => 30,
            LogLevel::Error => 40,
            LogLevel::Critical => 50,
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            10 => Ok(LogLevel::Debug),
            20 => Ok(LogLevel::Info),
            30 => Ok(LogLevel::Warning),
            40 => Ok(LogLevel::Error),
            50 => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level {}", other)),
        }
    }
}

/// Backend choices for the multi-node launcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub child_executor_name: ChildExecutor,
    pub task_executor_name: TaskExecutor,
    pub comm_name: CommTransport,
    pub worker_logs: bool,
    pub master_logs: bool,
    pub log_level: LogLevel,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            child_executor_name: ChildExecutor::Mpi,
            task_executor_name: TaskExecutor::Multiprocessing,
            comm_name: CommTransport::Zmq,
            worker_logs: true,
            master_logs: true,
            log_level: LogLevel::Info,
        }
    }
}

impl LauncherConfig {
    /// Write the record, replacing any existing file
    pub fn write_to(&self, path: &Path) -> WeakscaleResult<()> {
        artifact::write_json(path, self)?;
        info!(path = %path.display(), "Wrote launcher config");
        Ok(())
    }
}
