use anyhow::Result;
use clap::Parser;
use lockcheck::{Checker, MemorySink, replay_log};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "lockcheck - replay a recorded lock event log and report lock order problems"
)]
struct Cli {
    /// Path to the log file
    log_file: PathBuf,

    /// Print diagnostics as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let sink = Arc::new(MemorySink::new());
    let mut checker = Checker::new(Arc::clone(&sink));
    let summary = replay_log(&cli.log_file, &mut checker)?;

    let diagnostics = sink.take();
    for diagnostic in &diagnostics {
        if cli.json {
            println!("{}", serde_json::to_string(diagnostic)?);
        } else {
            println!("{diagnostic}");
        }
    }

    eprintln!(
        "{} events replayed, {} findings, {} mutexes, {} lock order edges",
        summary.events,
        diagnostics.len(),
        checker.mutex_count(),
        checker.edge_count()
    );
    Ok(())
}
