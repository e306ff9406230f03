//! CLI argument parsing and run dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use pipeline_bench_core::{
    InputSet, OrchestratorBuilder, PipelineTransport, RunConfig, Summary, UtilizationProbe,
};
use pipeline_bench_probes::{ProbeSettings, SystemProbe, DEFAULT_GPU_COMMAND};
use pipeline_bench_report::{export_json, render_summary};
use pipeline_bench_transport::GrpcTransport;

/// Token in the configuration templates replaced with the data repeat count
pub const REPEATS_PLACEHOLDER: &str = "data_repeats_placeholder";

/// pipeline-bench - Load generator for streaming gRPC inference pipelines
#[derive(Parser, Debug)]
#[command(name = "pipeline-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Service host
    pub host: String,

    /// Service port
    pub port: u16,

    /// Pipeline configuration for multi-stream workers
    pub json_file: PathBuf,

    /// Pipeline configuration for single-stream workers
    pub additional_json_file: PathBuf,

    /// Total number of streams across all workers
    pub total_stream_num: u32,

    /// Times the input set is repeated per stream
    pub repeats: u32,

    /// Directory containing the bgr/ input folder
    pub data_path: PathBuf,

    /// Open-run-close cycles per worker
    #[arg(default_value_t = 1)]
    pub pipeline_repeats: u32,

    /// Streams handled by each multi-stream worker
    #[arg(default_value_t = 1)]
    pub cross_stream_num: u32,

    /// Send a load_pipeline handshake first (0 or 1)
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub warmup_flag: u8,

    /// Directory receiving PerformanceData reports
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,

    /// Abort a session iteration after this many seconds
    #[arg(long)]
    pub session_timeout_secs: Option<u64>,

    /// Only count CPU time of processes with this exact name
    #[arg(long)]
    pub cpu_process: Option<String>,

    /// GPU sampling program; "none" disables GPU sampling
    #[arg(long, default_value = DEFAULT_GPU_COMMAND)]
    pub gpu_command: String,

    /// Utilization sampling period in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub probe_interval_ms: u64,

    /// Fail the run when a utilization probe cannot start
    #[arg(long)]
    pub require_probes: bool,

    /// Also write the summary as JSON to this file
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Run configuration assembled from the arguments
    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(self.total_stream_num, self.cross_stream_num)
            .with_repeats(self.repeats)
            .with_pipeline_repeats(self.pipeline_repeats)
            .with_warmup(self.warmup_flag == 1)
            .with_report_dir(&self.report_dir)
            .with_session_timeout(self.session_timeout_secs.map(Duration::from_secs))
            .with_require_probes(self.require_probes)
    }

    /// Probe options assembled from the arguments
    pub fn probe_settings(&self) -> ProbeSettings {
        let command = self.gpu_command.trim();
        let gpu_command = if command.is_empty() || command.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(command.to_string())
        };

        ProbeSettings {
            cpu_process: self.cpu_process.clone(),
            gpu_command,
            interval: Duration::from_millis(self.probe_interval_ms),
        }
    }

    /// Run the benchmark based on CLI arguments
    pub async fn run(&self) -> Result<()> {
        let config = self.run_config();
        config.validate().context("Invalid stream configuration")?;

        let primary = load_template(&self.json_file, self.repeats)?;
        let additional = load_template(&self.additional_json_file, self.repeats)?;

        let inputs = InputSet::discover(&self.data_path).with_context(|| {
            format!("Failed to load inputs from {}", self.data_path.display())
        })?;
        tracing::info!(
            files = inputs.len(),
            data_path = %self.data_path.display(),
            "Inputs discovered"
        );

        let transport = GrpcTransport::connect_lazy(&self.host, self.port)
            .with_context(|| format!("Invalid service address {}:{}", self.host, self.port))?;
        let probe = SystemProbe::new(self.probe_settings());

        print_banner(self, &config);

        let summary = OrchestratorBuilder::new()
            .config(config)
            .transport(Arc::new(transport) as Arc<dyn PipelineTransport>)
            .probe(Arc::new(probe) as Arc<dyn UtilizationProbe>)
            .inputs(inputs)
            .primary_config(primary)
            .additional_config(additional)
            .build()
            .context("Failed to assemble the benchmark")?
            .run()
            .await
            .context("Benchmark run failed")?;

        self.print_results(&summary)
    }

    fn print_results(&self, summary: &Summary) -> Result<()> {
        println!();
        print!("{}", render_summary(summary));

        if let Some(path) = &self.summary_json {
            export_json(summary, path)
                .with_context(|| format!("Failed to export summary to {}", path.display()))?;
            println!("✓ JSON exported to: {}", path.display());
        }

        Ok(())
    }
}

fn print_banner(cli: &Cli, config: &RunConfig) {
    let plan = config.pool_plan();
    println!("\n{}", "=".repeat(70));
    println!("   Pipeline Bench - Streaming Inference Load Generator");
    println!("{}", "=".repeat(70));
    println!();
    println!("Configuration:");
    println!("  Service:          {}:{}", cli.host, cli.port);
    println!("  Total streams:    {}", config.total_stream_num);
    println!(
        "  Workers:          {} x {} streams + {} x 1 stream",
        plan.primary_workers, plan.primary_streams, plan.remainder_workers
    );
    println!("  Data repeats:     {}", config.repeats);
    println!("  Pipeline repeats: {}", config.pipeline_repeats);
    println!(
        "  Warmup:           {}",
        if config.warmup { "enabled" } else { "disabled" }
    );
    println!("  Reports:          {}", config.report_dir.display());
    println!("{}", "=".repeat(70));
}

/// Read a configuration template and substitute the data repeat count
pub fn load_template(path: &Path, repeats: u32) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline configuration {}", path.display()))?;

    if contents.contains(REPEATS_PLACEHOLDER) {
        tracing::info!(file = %path.display(), repeats, "Substituting data repeats");
        return Ok(contents.replace(REPEATS_PLACEHOLDER, &repeats.to_string()));
    }
    Ok(contents)
}
