//! memtrace - replay a host-event stream and report memory accesses.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mem_tracer::{Tracer, TracerConfig};
use memtrace_cli::replay::{parse_stream, ReplayHost};

#[derive(Parser)]
#[command(name = "memtrace")]
#[command(about = "Replays an instrumentation event stream and reports every memory access \
                   performed by the target's main executable")]
#[command(version)]
struct Cli {
    /// Host event stream to replay (JSON)
    #[arg(value_name = "EVENTS")]
    events: PathBuf,

    /// Write the report to a file instead of standard error
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not count instructions, basic blocks and threads
    #[arg(long)]
    no_count: bool,

    /// Emit the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable debug-level diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // The sink is fixed before the target starts; a bad output path is
    // a configuration error and nothing is replayed.
    let mut sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?,
        ),
        None => Box::new(io::stderr()),
    };

    let text = std::fs::read_to_string(&cli.events)
        .with_context(|| format!("cannot read event stream {}", cli.events.display()))?;
    let events = parse_stream(&text)?;
    tracing::info!("replaying {} host events", events.len());

    let tracer = Tracer::new(TracerConfig {
        count: !cli.no_count,
    });
    let mut host = ReplayHost::new(&tracer);
    let replayed = host.run(&events);

    // Flush whatever was recorded, even when the stream failed
    // mid-replay; the partial trace is often exactly what is needed to
    // diagnose the failure.
    let report = tracer.finalize();
    if cli.json {
        writeln!(sink, "{}", report.to_json()?)?;
    } else {
        report.render(&mut sink)?;
    }
    sink.flush()?;

    replayed.map_err(Into::into)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}
