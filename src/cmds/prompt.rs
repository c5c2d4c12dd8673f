use anyhow::Result;

use crate::CtxloopConfig;
use crate::json_mode::PromptOutput;
use crate::refine::prompt::build_prompt;
use crate::refine::rotation::WorkingContext;
use crate::store::JsonlAbstractStore;
use crate::table::Table;

/// Print the first-iteration prompt for one row without calling the model.
pub async fn prompt_cmd(
    input: String,
    abstracts: Option<String>,
    row: usize,
    k: Option<usize>,
    config: Option<String>,
    json: bool,
) -> Result<()> {
    let config_path = config.unwrap_or_else(CtxloopConfig::default_config_path);
    let refine_config = CtxloopConfig::from_config_file(&config_path)?
        .refine
        .unwrap_or_default();

    let abstracts = abstracts.or(refine_config.abstracts).ok_or_else(|| {
        anyhow::anyhow!("Abstract store not set. Pass --abstracts or set refine.abstracts in the config file")
    })?;
    let k = k.or(refine_config.k).unwrap_or(3);
    if k == 0 {
        return Err(anyhow::anyhow!("k must be at least 1"));
    }

    let store = JsonlAbstractStore::open(&abstracts)?;
    let table = Table::read(&input)?;
    let record = table.record(row)?;

    let context = WorkingContext::new(&record.final_context_pmids, k).snapshot();
    let prompt = build_prompt(&record.subj_name, &record.obj_name, &context, &store)?;

    if json {
        let output = PromptOutput {
            row,
            source: record.subj_name,
            target: record.obj_name,
            context: serde_json::to_value(&context)?,
            prompt,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{prompt}");
    }

    Ok(())
}
