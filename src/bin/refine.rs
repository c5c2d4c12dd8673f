use anyhow::Result;
use clap::Parser;

use ctxloop::cmds::refine::{RefineArgs, refine_cmd};
use ctxloop::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(version, about = "Query an LLM for each row while rotating its evidence references", long_about = None)]
struct Args {
    #[command(flatten)]
    refine: RefineArgs,

    /// Debug-level logging on stderr (RUST_LOG takes precedence)
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    refine_cmd(args.refine).await
}
