//! weakscale configuration generator
//!
//! Writes the ensemble table, system topology and launcher backend records
//! that the multi-node launcher reads to start one server and client per node.

use clap::Parser;
use std::num::NonZeroU32;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weakscale_core::artifact::{ENSEMBLE_CONFIG_FILE, LAUNCHER_CONFIG_FILE, SYSTEM_CONFIG_FILE};
use weakscale_core::{
    EnsembleBuilder, LauncherConfig, SystemConfig, TopologySpec, DEFAULT_BASE_PORT, DEFAULT_MODEL,
    DEFAULT_TMPDIR,
};

/// weakscale-gen - generate a weak-scaling ensemble for inference serving
#[derive(Parser, Debug)]
#[command(name = "weakscale-gen")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  # 8 GPUs per instance on 4 nodes
  weakscale-gen --nnodes 4 --ngpus 8

  # Different model and more prompts
  weakscale-gen --model meta-llama/Llama-3.1-70B-Instruct --ngpus 4 --num-prompts 50")]
struct Args {
    /// Number of nodes in the ensemble, one instance per node
    #[arg(long, default_value = "1")]
    nnodes: NonZeroU32,

    /// Model served by every instance
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Number of GPUs per model instance
    #[arg(long, default_value = "8")]
    ngpus: NonZeroU32,

    /// Number of prompts each client sends
    #[arg(long, default_value = "10")]
    num_prompts: NonZeroU32,

    /// Directory the three config files are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Model cache directory shared by all tasks [default: <cwd>/.cache]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Scratch directory for every task
    #[arg(long, default_value = DEFAULT_TMPDIR)]
    tmpdir: PathBuf,

    /// Port of the first task; task i listens on base + i
    #[arg(long, default_value_t = DEFAULT_BASE_PORT)]
    base_port: u16,

    /// TOML file with the node topology [default: Aurora]
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Build all three records and write them under `args.output_dir`
fn generate(args: &Args) -> anyhow::Result<()> {
    let cache_dir = match &args.cache_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?.join(".cache"),
    };

    let builder = EnsembleBuilder::new(
        args.nnodes,
        args.model.clone(),
        args.ngpus,
        args.num_prompts,
        cache_dir,
    )
    .tmpdir(args.tmpdir.clone())
    .base_port(args.base_port);

    std::fs::create_dir_all(&args.output_dir)?;
    let ensemble_path = args.output_dir.join(ENSEMBLE_CONFIG_FILE);
    builder.build_config()?.write_to(&ensemble_path)?;

    println!("\nGenerated ensemble config for weak scaling test:");
    println!("  Model: {}", args.model);
    println!("  GPUs per instance: {}", args.ngpus);
    println!("  Number of nodes (ensemble size): {}", args.nnodes);
    println!("  Prompts per client: {}", args.num_prompts);
    println!("  Total GPU usage: {}", builder.total_gpus());
    println!("  Config saved to: {}\n", ensemble_path.display());

    let topology = match &args.topology {
        Some(path) => TopologySpec::from_file(path)?,
        None => TopologySpec::aurora(),
    };
    SystemConfig::from_topology(&topology).write_to(&args.output_dir.join(SYSTEM_CONFIG_FILE))?;
    LauncherConfig::default().write_to(&args.output_dir.join(LAUNCHER_CONFIG_FILE))?;

    info!(
        label = %builder.label(),
        output_dir = %args.output_dir.display(),
        "Configuration generated"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    generate(&args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use weakscale_core::EnsembleConfig;

    fn args_for(dir: &Path, extra: &[&str]) -> Args {
        let mut argv = vec![
            "weakscale-gen".to_string(),
            "--output-dir".to_string(),
            dir.display().to_string(),
            "--cache-dir".to_string(),
            "/shared/.cache".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["weakscale-gen"]).unwrap();
        assert_eq!(args.nnodes.get(), 1);
        assert_eq!(args.ngpus.get(), 8);
        assert_eq!(args.num_prompts.get(), 10);
        assert_eq!(args.model, "meta-llama/Llama-3.1-8B-Instruct");
        assert_eq!(args.base_port, 8000);
    }

    #[test]
    fn test_zero_counts_rejected() {
        for flag in ["--nnodes", "--ngpus", "--num-prompts"] {
            assert!(Args::try_parse_from(["weakscale-gen", flag, "0"]).is_err());
        }
    }

    #[test]
    fn test_generate_writes_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(
            dir.path(),
            &["--nnodes", "3", "--ngpus", "2", "--model", "m", "--num-prompts", "5"],
        );
        generate(&args).unwrap();

        let ensembles = EnsembleConfig::from_file(&dir.path().join(ENSEMBLE_CONFIG_FILE)).unwrap();
        let entry = ensembles.get("2gpus_m").unwrap();
        assert_eq!(entry.params.idx, vec![1, 2, 3]);
        assert_eq!(entry.params.port, vec![8000, 8001, 8002]);
        assert!(entry
            .params
            .cache_dir
            .iter()
            .all(|d| d == Path::new("/shared/.cache")));

        let system: SystemConfig = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SYSTEM_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(system.ncpus, 102);

        let launcher: LauncherConfig = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(LAUNCHER_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(launcher, LauncherConfig::default());
    }

    #[test]
    fn test_regeneration_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(dir.path(), &["--nnodes", "4"]);

        generate(&args).unwrap();
        let read_all = || {
            [ENSEMBLE_CONFIG_FILE, SYSTEM_CONFIG_FILE, LAUNCHER_CONFIG_FILE]
                .map(|name| std::fs::read(dir.path().join(name)).unwrap())
        };
        let first = read_all();
        generate(&args).unwrap();
        assert_eq!(first, read_all());
    }

    #[test]
    fn test_regeneration_replaces_previous_ensemble() {
        let dir = tempfile::tempdir().unwrap();
        generate(&args_for(dir.path(), &["--ngpus", "4"])).unwrap();
        generate(&args_for(dir.path(), &["--ngpus", "2"])).unwrap();

        let ensembles = EnsembleConfig::from_file(&dir.path().join(ENSEMBLE_CONFIG_FILE)).unwrap();
        assert_eq!(ensembles.ensembles.len(), 1);
        assert!(ensembles
            .get("2gpus_meta-llama--Llama-3.1-8B-Instruct")
            .is_some());
    }

    #[test]
    fn test_custom_topology() {
        let dir = tempfile::tempdir().unwrap();
        let topology = dir.path().join("topology.toml");
        std::fs::write(
            &topology,
            "name = \"polaris\"\ngpu_count = 4\ncpu_count = 32\nexcluded_cpus = [0, 16]\n",
        )
        .unwrap();
        let out = dir.path().join("out");
        let args = args_for(&out, &["--topology", topology.to_str().unwrap()]);
        generate(&args).unwrap();

        let system: SystemConfig = serde_json::from_str(
            &std::fs::read_to_string(out.join(SYSTEM_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(system.name, "polaris");
        assert_eq!(system.ncpus, 30);
        assert_eq!(system.gpus.len(), 4);
    }
}
