use clap::Parser;
use pixmorph::io::{load_rgba_image, save_rgba_image};
use pixmorph::lowlevel::total_cost;
use pixmorph::{
    remap_owned, BackendConfig, ComputeBackend, ExecutionPath, HostBackend, MorphConfig, Morpher,
    ParallelStrategy, Strategy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "pixmorph CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for pass-level diagnostics.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StrategyConfig {
    Sequential,
    #[default]
    UsedMask,
    PriorityClaim,
}

impl From<StrategyConfig> for Strategy {
    fn from(value: StrategyConfig) -> Self {
        match value {
            StrategyConfig::Sequential => Strategy::Sequential,
            StrategyConfig::UsedMask => Strategy::UsedMask,
            StrategyConfig::PriorityClaim => Strategy::PriorityClaim,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MorphConfigJson {
    strategy: StrategyConfig,
    max_iterations: Option<usize>,
    fallback: bool,
    workgroup_size: u32,
    max_workgroups_per_dispatch: u32,
    threads: Option<usize>,
}

impl Default for MorphConfigJson {
    fn default() -> Self {
        let morph = MorphConfig::default();
        let backend = BackendConfig::default();
        Self {
            strategy: StrategyConfig::default(),
            max_iterations: morph.max_iterations,
            fallback: morph.fallback,
            workgroup_size: backend.workgroup_size,
            max_workgroups_per_dispatch: backend.max_workgroups_per_dispatch,
            threads: backend.threads,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Config {
    source_path: String,
    target_path: String,
    output_path: Option<String>,
    assignment_path: Option<String>,
    width: usize,
    height: usize,
    morph: MorphConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: String::new(),
            target_path: String::new(),
            output_path: None,
            assignment_path: None,
            width: 100,
            height: 100,
            morph: MorphConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    pixels: usize,
    path: &'static str,
    backend: Option<String>,
    passes: usize,
    fell_back: bool,
    total_cost: f64,
    output_path: Option<String>,
    assignment_path: Option<String>,
}

fn path_label(path: ExecutionPath) -> &'static str {
    match path {
        ExecutionPath::Sequential => "sequential",
        ExecutionPath::Parallel(ParallelStrategy::UsedMask) => "used_mask",
        ExecutionPath::Parallel(ParallelStrategy::PriorityClaim) => "priority_claim",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("pixmorph=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.source_path.is_empty() || config.target_path.is_empty() {
        return Err("source_path and target_path must be set in the config".into());
    }
    if config.width == 0 || config.height == 0 {
        return Err("width and height must be at least 1".into());
    }

    let source = load_rgba_image(&config.source_path, config.width, config.height)?;
    let target = load_rgba_image(&config.target_path, config.width, config.height)?;

    let morph_cfg = &config.morph;
    let mut backend = match HostBackend::new(BackendConfig {
        workgroup_size: morph_cfg.workgroup_size,
        max_workgroups_per_dispatch: morph_cfg.max_workgroups_per_dispatch,
        threads: morph_cfg.threads,
    }) {
        Ok(backend) => Some(backend),
        Err(err) if morph_cfg.fallback => {
            tracing::warn!(error = %err, "compute backend unavailable");
            None
        }
        Err(err) => return Err(err.into()),
    };
    let backend_name = backend.as_ref().map(|b| b.name().to_string());

    let morpher = Morpher::new().with_config(MorphConfig {
        strategy: morph_cfg.strategy.into(),
        max_iterations: morph_cfg.max_iterations,
        fallback: morph_cfg.fallback,
    });
    let solution = morpher.assign(
        backend.as_mut().map(|b| b as &mut dyn ComputeBackend),
        source.pixels(),
        target.pixels(),
    )?;

    let cost = total_cost(
        source.pixels(),
        target.pixels(),
        solution.assignment.as_slice(),
    )
    .ok_or("assignment names a pixel outside the loaded images")?;

    if let Some(path) = &config.output_path {
        let morphed = remap_owned(&source, &solution.assignment)?;
        save_rgba_image(path, &morphed)?;
    }
    if let Some(path) = &config.assignment_path {
        fs::write(path, serde_json::to_string(solution.assignment.as_slice())?)?;
    }

    let report = Report {
        pixels: solution.assignment.len(),
        path: path_label(solution.path),
        backend: backend_name,
        passes: solution.passes,
        fell_back: solution.fell_back,
        total_cost: cost,
        output_path: config.output_path,
        assignment_path: config.assignment_path,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
