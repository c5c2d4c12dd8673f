use anyhow::Result;
use clap::Args;

#[cfg(feature = "openai")]
use crate::json_mode::RefineOutput;

#[cfg(feature = "openai")]
use crate::config::{ApiMode, RecordErrorPolicy, RefineSettings};
#[cfg(feature = "openai")]
use crate::refine::{
    FileRunLog, ModelReply, Observers, RandomPolicy, RecordOutcome, Refiner, StopReason,
    TracingObserver,
};
#[cfg(feature = "openai")]
use crate::responder::{OpenAIResponder, Responder};
#[cfg(feature = "openai")]
use crate::store::{JsonlAbstractStore, ReferenceStore};
#[cfg(feature = "openai")]
use crate::table::{ResultColumns, Table};
#[cfg(feature = "openai")]
use crate::CtxloopConfig;

#[cfg(not(feature = "openai"))]
use crate::json_mode::ErrorOutput;

/// Command-line options shared by `ctxloop refine` and the `refine` binary.
#[derive(Args, Debug, Clone)]
pub struct RefineArgs {
    /// Input table (.json array or .jsonl rows)
    pub input: String,

    /// Where to write the augmented table (format follows the extension)
    pub output: String,

    /// JSON-lines file with the reference texts (overrides config file)
    #[clap(short = 'a', long)]
    pub abstracts: Option<String>,

    /// Path to the config file. Defaults to ~/.ctxloop_config.json
    #[clap(short = 'c', long)]
    pub config: Option<String>,

    /// OpenAI API key (overrides config file and env var)
    #[clap(long)]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (overrides config file)
    #[clap(long)]
    pub base_url: Option<String>,

    /// Model to query (overrides config file)
    #[clap(short, long)]
    pub model: Option<String>,

    /// API mode to use: 'chat' or 'responses' (overrides config file)
    #[clap(long)]
    pub api_mode: Option<String>,

    /// Maximum model calls per row (overrides config file)
    #[clap(short = 'n', long)]
    pub max_iterations: Option<usize>,

    /// References kept in play per edge (overrides config file)
    #[clap(short)]
    pub k: Option<usize>,

    /// Seed for edge and reference selection
    #[clap(long)]
    pub seed: Option<u64>,

    /// Directory for the run log (overrides config file)
    #[clap(long)]
    pub log_dir: Option<String>,

    /// Stop the whole run at the first row that cannot be processed
    #[clap(long)]
    pub fail_fast: bool,

    /// Print a JSON summary instead of text
    #[clap(short, long)]
    pub json: bool,
}

pub async fn refine_cmd(args: RefineArgs) -> Result<()> {
    #[cfg(feature = "openai")]
    {
        let output = run_refine(&args).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Refined {} rows: {} reached the iteration limit, {} stopped early, {} failed",
                output.rows, output.reached_limit, output.stopped_early, output.failed
            );
            if output.failed_model_calls > 0 {
                println!(
                    "{} of {} model calls failed",
                    output.failed_model_calls, output.model_calls
                );
            }
            println!("Results written to {}", output.output_path);
            if let Some(log_path) = &output.log_path {
                println!("Run log: {log_path}");
            }
        }
    }
    #[cfg(not(feature = "openai"))]
    {
        if args.json {
            let error_output = ErrorOutput {
                error: "openai feature not enabled".to_string(),
                error_type: "FeatureNotEnabled".to_string(),
            };
            eprintln!("{}", serde_json::to_string_pretty(&error_output)?);
        } else {
            eprintln!("Error: refine requires the 'openai' feature");
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(feature = "openai")]
async fn run_refine(args: &RefineArgs) -> Result<RefineOutput> {
    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(CtxloopConfig::default_config_path);
    let refine_config = CtxloopConfig::from_config_file(&config_path)?
        .refine
        .unwrap_or_default();

    // Resolve API key with priority: CLI arg > config file > env var > error
    let api_key = args
        .api_key
        .clone()
        .or(refine_config.api_key)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "OpenAI API key not found. Set via --api-key, config file, or OPENAI_API_KEY env var"
            )
        })?;

    let base_url = args.base_url.clone().or(refine_config.base_url);
    let model_name = args
        .model
        .clone()
        .or(refine_config.model)
        .unwrap_or_else(|| "gpt-4o-mini".to_string());
    let api_mode = match &args.api_mode {
        Some(mode) => mode.parse::<ApiMode>()?,
        None => refine_config.api_mode,
    };

    let settings = RefineSettings::new(
        args.max_iterations
            .or(refine_config.max_iterations)
            .unwrap_or(5),
        args.k.or(refine_config.k).unwrap_or(3),
    )?;
    let seed = args.seed.or(refine_config.seed);
    let on_error = if args.fail_fast {
        RecordErrorPolicy::Abort
    } else {
        refine_config.on_record_error
    };
    let log_dir = args
        .log_dir
        .clone()
        .or(refine_config.log_dir)
        .unwrap_or_else(|| "./logs".to_string());
    let abstracts = args
        .abstracts
        .clone()
        .or(refine_config.abstracts)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Abstract store not set. Pass --abstracts or set refine.abstracts in the config file"
            )
        })?;

    let store = JsonlAbstractStore::open(&abstracts)?;
    let mut table = Table::read(&args.input)?;
    let records = table.records();

    let responder = OpenAIResponder::new(api_key, base_url, model_name, api_mode)
        .with_max_output_tokens(refine_config.max_output_tokens.unwrap_or(2048))
        .with_temperature(refine_config.temperature);
    tracing::info!(
        rows = records.len(),
        abstracts = store.len(),
        model = responder.name(),
        max_iterations = settings.max_iterations,
        k = settings.k,
        "starting refinement"
    );

    let refiner = Refiner::new(&responder, &store, settings)?;
    let mut policy = RandomPolicy::new(seed);

    let mut run_log = FileRunLog::create(&log_dir)?;
    let mut tracing_observer = TracingObserver;
    let outcomes = {
        let mut observers = Observers::new()
            .with(&mut tracing_observer)
            .with(&mut run_log);
        refiner
            .refine_table(records, &mut policy, &mut observers, on_error)
            .await?
    };
    let log_path = run_log.finish()?;

    let output = summarize(args, &outcomes, Some(log_path.to_string_lossy().to_string()));

    table.augment(ResultColumns::from_outcomes(&outcomes)?)?;
    table.write(&args.output)?;

    Ok(output)
}

#[cfg(feature = "openai")]
fn summarize(
    args: &RefineArgs,
    outcomes: &[RecordOutcome],
    log_path: Option<String>,
) -> RefineOutput {
    let mut output = RefineOutput {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        log_path,
        rows: outcomes.len(),
        succeeded: 0,
        failed: 0,
        stopped_early: 0,
        reached_limit: 0,
        model_calls: 0,
        failed_model_calls: 0,
    };

    for outcome in outcomes {
        match outcome {
            Ok(result) => {
                output.succeeded += 1;
                match result.stop {
                    StopReason::StoppedEarly => output.stopped_early += 1,
                    StopReason::ReachedLimit => output.reached_limit += 1,
                }
                output.model_calls += result.iterations.len();
                output.failed_model_calls += result
                    .iterations
                    .iter()
                    .filter(|it| matches!(it.reply, ModelReply::Failed { .. }))
                    .count();
            }
            Err(_) => output.failed += 1,
        }
    }

    output
}

#[cfg(all(test, feature = "openai"))]
mod tests {
    use super::*;
    use crate::refine::{EdgeMap, IterationRecord, RecordResult, RefineError, Rotation};
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        refine: RefineArgs,
    }

    fn iteration(n: usize, reply: ModelReply, rotation: Rotation) -> IterationRecord {
        IterationRecord {
            iteration: n,
            prompt: format!("prompt {n}"),
            reply,
            context: EdgeMap::new(),
            rotation,
        }
    }

    #[test]
    fn test_args_parse() {
        let cli = Cli::parse_from([
            "refine", "in.jsonl", "out.json", "-n", "4", "-k", "2", "--seed", "9", "--fail-fast",
        ]);
        assert_eq!(cli.refine.input, "in.jsonl");
        assert_eq!(cli.refine.output, "out.json");
        assert_eq!(cli.refine.max_iterations, Some(4));
        assert_eq!(cli.refine.k, Some(2));
        assert_eq!(cli.refine.seed, Some(9));
        assert!(cli.refine.fail_fast);
        assert!(!cli.refine.json);
    }

    #[test]
    fn test_summary_counts() {
        let cli = Cli::parse_from(["refine", "in.json", "out.json"]);
        let answered = || ModelReply::Answered {
            text: "ok".to_string(),
            elapsed: Duration::from_millis(10),
        };
        let outcomes: Vec<RecordOutcome> = vec![
            Ok(RecordResult {
                iterations: vec![
                    iteration(1, answered(), Rotation::Swapped {
                        edge: "e".to_string(),
                        dropped: "1".to_string(),
                        added: "2".to_string(),
                    }),
                    iteration(
                        2,
                        ModelReply::Failed {
                            error: "boom".to_string(),
                        },
                        Rotation::MaxIteration,
                    ),
                ],
                stop: StopReason::ReachedLimit,
            }),
            Ok(RecordResult {
                iterations: vec![iteration(1, answered(), Rotation::Exhausted {
                    edge: "e".to_string(),
                    dropped: Some("1".to_string()),
                })],
                stop: StopReason::StoppedEarly,
            }),
            Err(RefineError::NoAbstracts),
        ];

        let output = summarize(&cli.refine, &outcomes, None);

        assert_eq!(output.rows, 3);
        assert_eq!(output.succeeded, 2);
        assert_eq!(output.failed, 1);
        assert_eq!(output.reached_limit, 1);
        assert_eq!(output.stopped_early, 1);
        assert_eq!(output.model_calls, 3);
        assert_eq!(output.failed_model_calls, 1);
    }
}
