use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::VisualizationModel;
use log::info;
use nblscore::ResultExporter;
use std::fs::{self, File};
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Narrow-band least-squares workflow driver")]
struct Args {
    /// Synthesize the configured scenario, process it and report the result
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    nbands: Option<usize>,
    #[arg(long)]
    fmin: Option<f64>,
    #[arg(long)]
    fmax: Option<f64>,
    /// Fraction of sensor pairs kept by the trimmed fit
    #[arg(long)]
    alpha: Option<f64>,
    /// Write the result table as JSON
    #[arg(long)]
    json_out: Option<PathBuf>,
    /// Write the result rows as CSV
    #[arg(long)]
    csv_out: Option<PathBuf>,
    /// Keep the HTTP bridge alive for renderers and new scenarios
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
}

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("creating output {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    }
    .with_overrides(args.nbands, args.fmin, args.fmax, args.alpha);
    workflow_config
        .processing
        .validate()
        .context("validating processing options")?;

    let runner = Runner::new(workflow_config.clone());
    let gui_bridge = args
        .serve
        .then(|| GuiBridge::new(Arc::new(runner.clone()), args.bind));

    if args.offline {
        let result = runner
            .execute_scenario(&workflow_config.scenario)
            .context("running offline scenario")?;

        println!(
            "Offline run -> bands {}, estimates {}, coherent {}",
            result.result.bands.len(),
            result.estimate_count(),
            result
                .table
                .rows
                .iter()
                .filter(|row| row.coherence >= workflow_config.coherence_threshold)
                .count()
        );
        for line in &result.skip_summary {
            println!("  {}", line);
        }

        let exporter = ResultExporter::new(&result.result);
        if let Some(path) = args.json_out.as_ref() {
            let json = exporter.to_json().context("serializing result table")?;
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        if let Some(path) = args.csv_out.as_ref() {
            exporter
                .write_csv(create_output(path)?)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }

        if let Some(bridge) = gui_bridge.as_ref() {
            let model = VisualizationModel::from_result(
                &result,
                workflow_config.coherence_threshold,
                workflow_config.scenario.scenario.clone(),
            );
            bridge.publish(&model);
            bridge.publish_status("Offline workflow results ready.");
        }
    }

    if let Some(bridge) = gui_bridge.as_ref() {
        bridge.publish_status(&format!(
            "HTTP bridge running on {} (Ctrl+C to stop)...",
            args.bind
        ));
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
