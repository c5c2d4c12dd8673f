use crate::refine::error::RefineError;
use crate::refine::types::EdgeMap;
use crate::store::ReferenceStore;

/// Instruction placed before the abstracts, with both entity names filled in.
pub fn instruction(source: &str, target: &str) -> String {
    format!(
        "Based on the following scientific abstracts, please describe how an indirect relationship \
         between {source} and {target} might exist. Consider the key findings, underlying mechanisms, \
         and any intermediate entities or processes mentioned in the abstracts. Your explanation \
         should connect these elements to form a coherent narrative that illustrates the possible \
         indirect linkage between {source} and {target}."
    )
}

/// Resolve every reference in `context` (edge order, then subset order) and
/// append the texts to the instruction, separated by blank lines.
///
/// A missing or empty text is fatal, as is a context with no references.
pub fn build_prompt(
    source: &str,
    target: &str,
    context: &EdgeMap<Vec<String>>,
    store: &dyn ReferenceStore,
) -> Result<String, RefineError> {
    let mut abstracts = Vec::new();
    for id in context.values().flatten() {
        match store.lookup(id)? {
            Some(text) if !text.is_empty() => abstracts.push(text),
            Some(_) => return Err(RefineError::EmptyReference(id.clone())),
            None => return Err(RefineError::MissingReference(id.clone())),
        }
    }

    if abstracts.is_empty() {
        return Err(RefineError::NoAbstracts);
    }

    Ok(format!(
        "{}\n\n{}",
        instruction(source, target),
        abstracts.join("\n\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const EXPECTED_INSTRUCTION: &str = "Based on the following scientific abstracts, please describe how an indirect relationship between Aspirin and Stroke might exist. Consider the key findings, underlying mechanisms, and any intermediate entities or processes mentioned in the abstracts. Your explanation should connect these elements to form a coherent narrative that illustrates the possible indirect linkage between Aspirin and Stroke.";

    fn context(entries: &[(&str, Vec<&str>)]) -> EdgeMap<Vec<String>> {
        entries
            .iter()
            .map(|(edge, ids)| (*edge, ids.iter().map(|id| id.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_instruction_text_is_exact() {
        assert_eq!(instruction("Aspirin", "Stroke"), EXPECTED_INSTRUCTION);
    }

    #[test]
    fn test_prompt_layout_follows_edge_then_subset_order() {
        let store: MemoryStore = [("1", "one"), ("2", "two"), ("3", "three")]
            .into_iter()
            .collect();
        let ctx = context(&[("second", vec!["3"]), ("first", vec!["2", "1"])]);

        let prompt = build_prompt("Aspirin", "Stroke", &ctx, &store).unwrap();

        assert_eq!(
            prompt,
            format!("{EXPECTED_INSTRUCTION}\n\nthree\n\ntwo\n\none")
        );
    }

    #[test]
    fn test_entity_names_are_substituted_once() {
        let store: MemoryStore = [("1", "text")].into_iter().collect();
        let ctx = context(&[("e", vec!["1"])]);

        let prompt = build_prompt("{target}", "B", &ctx, &store).unwrap();

        assert!(prompt.contains("between {target} and B might exist"));
    }

    #[test]
    fn test_missing_reference_is_fatal() {
        let store: MemoryStore = [("1", "one")].into_iter().collect();
        let ctx = context(&[("e", vec!["1", "9"])]);

        let err = build_prompt("a", "b", &ctx, &store).unwrap_err();
        assert!(matches!(err, RefineError::MissingReference(ref id) if id == "9"));
        assert!(err.is_record_fatal());
    }

    #[test]
    fn test_empty_reference_is_fatal() {
        let store: MemoryStore = [("1", "")].into_iter().collect();
        let ctx = context(&[("e", vec!["1"])]);

        assert!(matches!(
            build_prompt("a", "b", &ctx, &store),
            Err(RefineError::EmptyReference(_))
        ));
    }

    #[test]
    fn test_context_without_references_is_fatal() {
        let store = MemoryStore::new();
        let ctx = context(&[("e", vec![])]);

        assert!(matches!(
            build_prompt("a", "b", &ctx, &store),
            Err(RefineError::NoAbstracts)
        ));
    }
}
