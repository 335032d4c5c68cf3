// src/main.rs

use bakedag::{cli, logging, run};

fn main() {
    if let Err(err) = run_main() {
        eprintln!("bakedag error: {err:?}");
        std::process::exit(1);
    }
}

// Not `#[tokio::main]`: the worker pool owns its own runtime.
fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args)
}
