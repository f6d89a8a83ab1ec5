//! `brepgraph` command-line driver.
//!
//! ```text
//! brepgraph inspect part.step --output graph.json
//! brepgraph segment --model uvnet.json part.step --seg part.seg --report part.json
//! brepgraph classify --model classifier.json part.step
//! brepgraph batch --model uvnet.json --mode seg parts/ --output results/
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use brepgraph::config::PipelineConfig;
use brepgraph::inference::{load_model, Mode, Model};
use brepgraph::labels::{load_labels, LabelTable};
use brepgraph::pipeline::{build_graph, discover_step_files, Pipeline};
use brepgraph::report::{self, BatchReport, ClassificationReport, SegmentationReport};

#[derive(Parser)]
#[command(name = "brepgraph", version, about = "STEP B-rep face graphs and UV-Net style inference")]
struct Cli {
    /// Pipeline configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ModelArgs {
    /// Model manifest (.json) or ONNX file
    #[arg(long)]
    model: PathBuf,

    /// Label file; defaults to `<model stem>.labels.json` next to the model
    #[arg(long)]
    labels: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the face graph of a STEP file and print its size
    Inspect {
        step: PathBuf,
        /// Write the graph as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Label every face of a STEP file
    Segment {
        #[command(flatten)]
        model: ModelArgs,
        step: PathBuf,
        /// Write one label id per face
        #[arg(long)]
        seg: Option<PathBuf>,
        /// Write a JSON report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write plain-text statistics
        #[arg(long)]
        stats: Option<PathBuf>,
    },
    /// Classify the solid of a STEP file
    Classify {
        #[command(flatten)]
        model: ModelArgs,
        step: PathBuf,
        /// Write a JSON report
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Process every STEP file below a directory
    Batch {
        #[command(flatten)]
        model: ModelArgs,
        /// seg or cls
        #[arg(long)]
        mode: Mode,
        dir: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Inspect { step, output } => cmd_inspect(&config, &step, output.as_deref()),
        Command::Segment {
            model,
            step,
            seg,
            report,
            stats,
        } => cmd_segment(config, &model, &step, seg.as_deref(), report.as_deref(), stats.as_deref()),
        Command::Classify { model, step, report } => cmd_classify(config, &model, &step, report.as_deref()),
        Command::Batch {
            model,
            mode,
            dir,
            output,
        } => cmd_batch(config, &model, mode, &dir, &output),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing_subscriber::filter::LevelFilter::WARN,
        1 => tracing_subscriber::filter::LevelFilter::DEBUG,
        _ => tracing_subscriber::filter::LevelFilter::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    if verbose == 0 {
        env_filter = env_filter.add_directive("brepgraph=info".parse().unwrap_or_default());
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_pipeline(config: PipelineConfig, args: &ModelArgs, mode: Mode) -> Result<Pipeline> {
    let model = load_model(&args.model, mode)
        .with_context(|| format!("Failed to load model {}", args.model.display()))?;
    let labels = resolve_labels(args, model.as_ref())?;
    let pipeline = Pipeline::new(config, model, Arc::new(labels), mode)?;
    Ok(pipeline)
}

fn resolve_labels(args: &ModelArgs, model: &dyn Model) -> Result<LabelTable> {
    let path = args.labels.clone().or_else(|| {
        let stem = args.model.file_stem()?.to_string_lossy().into_owned();
        let candidate = args.model.with_file_name(format!("{stem}.labels.json"));
        candidate.is_file().then_some(candidate)
    });
    if let Some(path) = path {
        info!(path = %path.display(), "loading labels");
        return load_labels(&path).with_context(|| format!("Failed to load labels {}", path.display()));
    }
    match model.num_classes() {
        Some(k) => {
            warn!(classes = k, "no label file, using numbered labels");
            Ok(LabelTable::numbered(k))
        }
        None => bail!("model does not declare its classes; pass --labels"),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn cmd_inspect(config: &PipelineConfig, step: &Path, output: Option<&Path>) -> Result<()> {
    let graph = build_graph(config, step)?;
    println!("file:        {}", step.display());
    println!("faces:       {}", graph.num_faces());
    println!("nodes:       {}", graph.num_nodes());
    println!("adjacencies: {}", graph.num_edges());
    println!("excluded:    {}", graph.excluded().len());
    for e in graph.excluded() {
        println!("  {e}");
    }
    if let Some(path) = output {
        report::write_json(path, &graph)?;
        println!("graph written to {}", path.display());
    }
    Ok(())
}

fn cmd_segment(
    config: PipelineConfig,
    args: &ModelArgs,
    step: &Path,
    seg: Option<&Path>,
    report_path: Option<&Path>,
    stats: Option<&Path>,
) -> Result<()> {
    let pipeline = open_pipeline(config, args, Mode::Segmentation)?;
    let result = pipeline.run_file(step)?;
    let Some(seg_result) = result.as_segmentation() else {
        bail!("model returned a classification result");
    };
    let model_name = file_name(&args.model);
    let step_name = file_name(step);

    print!(
        "{}",
        report::statistics_text(&model_name, &step_name, seg_result, pipeline.labels())
    );
    if let Some(path) = seg {
        report::write_seg(path, seg_result)?;
    }
    if let Some(path) = report_path {
        let summary = SegmentationReport::new(&model_name, &step_name, seg_result, pipeline.labels());
        report::write_json(path, &summary)?;
    }
    if let Some(path) = stats {
        std::fs::write(
            path,
            report::statistics_text(&model_name, &step_name, seg_result, pipeline.labels()),
        )
        .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn cmd_classify(config: PipelineConfig, args: &ModelArgs, step: &Path, report_path: Option<&Path>) -> Result<()> {
    let pipeline = open_pipeline(config, args, Mode::Classification)?;
    let result = pipeline.run_file(step)?;
    let Some(cls) = result.as_classification() else {
        bail!("model returned a segmentation result");
    };
    let summary = ClassificationReport::new(&file_name(&args.model), &file_name(step), cls, pipeline.labels());
    println!(
        "{}: {} ({:.1}%)",
        summary.step_file,
        summary.label_name,
        summary.confidence * 100.0
    );
    if let Some(path) = report_path {
        report::write_json(path, &summary)?;
    }
    Ok(())
}

fn cmd_batch(config: PipelineConfig, args: &ModelArgs, mode: Mode, dir: &Path, output: &Path) -> Result<()> {
    let files = discover_step_files(dir).with_context(|| format!("Failed to search {}", dir.display()))?;
    if files.is_empty() {
        bail!("no STEP files found in {}", dir.display());
    }
    std::fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;

    let pipeline = open_pipeline(config, args, mode)?;
    let total = files.len();
    let mut summary = BatchReport::new(output, &file_name(&args.model), pipeline.labels());
    for item in pipeline.run_batch(files) {
        if let Err(e) = &item.outcome {
            eprintln!("{e}");
        }
        summary.record(item);
    }

    let path = summary.write_summary(mode)?;
    let failed = summary.failed();
    println!(
        "{}/{total} files processed, {failed} failed, summary in {}",
        total - failed,
        path.display()
    );
    Ok(())
}
