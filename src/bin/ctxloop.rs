use clap::{Parser, Subcommand};
use ctxloop::cmds::prompt::prompt_cmd;
use ctxloop::cmds::refine::{RefineArgs, refine_cmd};
use ctxloop::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(version, about = "Iteratively refine evidence context for LLM explanations")]
struct CtxloopArgs {
    /// Debug-level logging on stderr (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query the model for every row, rotating one reference per iteration
    Refine(RefineArgs),
    /// Print the first-iteration prompt for one row without calling the model
    Prompt {
        /// Input table (.json array or .jsonl rows)
        input: String,

        /// JSON-lines file with the reference texts (overrides config file)
        #[clap(short = 'a', long)]
        abstracts: Option<String>,

        /// Row to render, counting from 0
        #[clap(short, long, default_value_t = 0)]
        row: usize,

        /// References kept in play per edge (overrides config file)
        #[clap(short)]
        k: Option<usize>,

        /// Path to the config file. Defaults to ~/.ctxloop_config.json
        #[clap(short = 'c', long)]
        config: Option<String>,

        /// Output in JSON format
        #[clap(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CtxloopArgs::parse();
    init_tracing(args.verbose);

    match args.cmd {
        Commands::Refine(refine_args) => {
            refine_cmd(refine_args).await?;
        }
        Commands::Prompt {
            input,
            abstracts,
            row,
            k,
            config,
            json,
        } => {
            prompt_cmd(input, abstracts, row, k, config, json).await?;
        }
    }

    Ok(())
}
