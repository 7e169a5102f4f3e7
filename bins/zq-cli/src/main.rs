//! # zq — compiled-pipeline runner
//!
//! Reads a compiled operator tree from a JSON file, runs the planner's
//! rewrite passes over it, compiles it against an ndjson source, and pumps
//! it to an ndjson sink until end of stream or Ctrl-C.
//!
//! ```bash
//! zq --ast pipeline.json --input in.ndjson --output out.ndjson
//! RUST_LOG=debug zq --ast pipeline.json --input in.ndjson --output out.ndjson --width 4
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zq_core::Context;
use zq_driver::ast::CompiledOp;
use zq_driver::run::Driver;
use zq_io::{NdjsonReader, NdjsonWriter};
use zq_pipeline::{ProcContext, Stats};
use zq_stream::{Batch, CollectingWarner};

#[derive(Parser, Debug)]
#[command(name = "zq")]
#[command(about = "Runs a compiled pipeline over ndjson input/output")]
struct Args {
    /// Path to the compiled operator tree (JSON).
    #[arg(long)]
    ast: PathBuf,

    /// Path to the ndjson input file.
    #[arg(long)]
    input: PathBuf,

    /// Path to the ndjson output file.
    #[arg(long)]
    output: PathBuf,

    /// Directory for sort/group-by spill files.
    #[arg(long, default_value_os_t = std::env::temp_dir().join("zq-spill"))]
    tmp_dir: PathBuf,

    /// Duplicate the longest stateless prefix across this many branches.
    #[arg(long)]
    width: Option<usize>,

    /// Field the parallel fan-out's merge should preserve order on.
    #[arg(long)]
    order_field: Option<String>,

    /// Whether the merge comparator sorts ascending (the default) or
    /// descending when `--order-field` is set.
    #[arg(long, default_value_t = true)]
    keep_order: bool,

    /// Override `Sort`'s in-memory budget, in bytes, before it spills.
    #[arg(long)]
    sort_mem_budget: Option<usize>,

    /// Override `GroupBy`'s buffered-group count before it degrades to
    /// streaming spill.
    #[arg(long)]
    groupby_limit: Option<usize>,
}

struct NdjsonDriver {
    writer: NdjsonWriter<std::fs::File>,
}

impl Driver for NdjsonDriver {
    fn write(&mut self, _channel_id: u32, batch: Batch) {
        for rec in batch.into_records() {
            if let Err(e) = zq_stream::Writer::write(&mut self.writer, &rec) {
                tracing::error!(error = %e, "failed to write record");
            }
        }
    }

    fn warn(&mut self, msg: String) {
        tracing::warn!(%msg, "pipeline warning");
    }

    fn channel_end(&mut self, channel_id: u32) {
        tracing::debug!(channel_id, "channel ended");
        if let Err(e) = zq_stream::WriteFlusher::flush(&mut self.writer) {
            tracing::error!(error = %e, "failed to flush output");
        }
    }

    fn stats(&mut self, stats: Stats) {
        tracing::info!(
            records_read = stats.records_read,
            records_written = stats.records_written,
            bytes_read = stats.bytes_read,
            "stats"
        );
    }
}

fn load_ast(path: &PathBuf) -> Result<CompiledOp> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing compiled AST from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let ast = load_ast(&args.ast)?;
    let ast = zq_planner::replace_groupby_duration_with_key(ast);
    let ast = match args.width {
        Some(width) => zq_planner::parallelize_flowgraph(ast, width, args.order_field.clone(), args.keep_order),
        None => ast,
    };

    let needed = zq_planner::compute_columns(&ast, zq_planner::Columns::Unknown);
    match needed {
        zq_planner::Columns::Known(cols) => tracing::debug!(?cols, "columns read from source"),
        zq_planner::Columns::Unknown => tracing::debug!("source columns needed: unknown, reading everything"),
    }

    let ctx = Arc::new(Context::new());
    let reader: Box<dyn zq_stream::Reader> = Box::new(NdjsonReader::open(&args.input, ctx.clone())?);
    let writer = NdjsonWriter::create(&args.output)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt, cancelling");
                cancel.cancel();
            }
        });
    }

    let warner = Arc::new(Mutex::new(CollectingWarner::default()));
    let stats = Arc::new(Mutex::new(Stats::default()));
    let pctx = ProcContext::with_sinks(ctx.clone(), cancel, warner.clone(), stats.clone());

    let mut config = zq_driver::CompileConfig::new(args.tmp_dir.clone());
    config.sort_mem_budget = args.sort_mem_budget;
    config.groupby_limit = args.groupby_limit;

    std::fs::create_dir_all(&args.tmp_dir)
        .with_context(|| format!("creating spill directory {}", args.tmp_dir.display()))?;

    let mut root = zq_driver::compile(&ast, reader, ctx, pctx.clone(), &config)?;
    let mut driver = NdjsonDriver { writer };
    zq_driver::run(root.as_mut(), &mut driver, &pctx, warner, stats)?;

    Ok(())
}
