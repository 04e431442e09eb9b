use anyhow::Context;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline 4DD velocity dealiasing driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Number of consecutive volumes to simulate
    #[arg(long, default_value_t = 3)]
    volumes: usize,
    #[arg(long, default_value_t = 12.0)]
    nyquist: f32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Write the first guess into each volume instead of dealiasing
    #[arg(long, default_value_t = false)]
    emit_first_guess: bool,
    /// Append one JSON line per volume to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.volumes, args.nyquist, args.seed)
    };
    workflow_config.emit_first_guess |= args.emit_first_guess;
    if args.report.is_some() {
        workflow_config.report_path = args.report;
    }

    let runner = Runner::new(workflow_config.clone());
    let result = runner.execute()?;

    for summary in &result.volumes {
        println!(
            "volume {} -> unfolded {}, first guess {}, dealiased {}, removed {}, matched {}/{}, rms {:.3}",
            summary.index,
            summary.unfolded,
            summary.first_guess_source.as_deref().unwrap_or("none"),
            summary.gates_dealiased,
            summary.gates_removed,
            summary.gates_matched,
            summary.gates_valid,
            summary.rms_error
        );
    }
    println!(
        "processed {} volumes: {} dealiased, {} restored, {} errors",
        result.metrics.processed,
        result.metrics.dealiased,
        result.metrics.restored,
        result.metrics.errors
    );

    let report_path = workflow_config
        .report_path
        .unwrap_or_else(|| PathBuf::from("tools/data/dealias_report.jsonl"));
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening report {}", report_path.display()))?;
    for summary in &result.volumes {
        let line = serde_json::to_string(summary).context("serializing volume summary")?;
        writeln!(file, "{}", line)?;
    }

    Ok(())
}
