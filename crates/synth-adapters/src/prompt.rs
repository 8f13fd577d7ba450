//! Prompt construction for the LLM-backed steps.

use synth_domain::pipeline::CHUNK_PLACEHOLDER;

/// Fills a generation template with a node value.
pub fn render_template(template: &str, chunk: &str) -> String {
    template.replace(CHUNK_PLACEHOLDER, chunk)
}

/// Binary judge prompt: two worked examples, then the criterion and the
/// candidate. The answer is expected as `{"answer": "YES"|"NO"}`.
pub fn judge_prompt(candidate: &str, criterion: &str) -> String {
    format!("You are an expert judge tasked with evaluating synthetic text data.\n\
             You are evaluating synthetic data against a given criterion.\n\
             You must answer by YES or NO, as a JSON object {{\"answer\": \"YES\"}} or {{\"answer\": \"NO\"}}.\n\
             Output YES when the criterion is fulfilled.\n\
             Output NO when the criterion is NOT fulfilled.\n\
             ------\n\
             criterion: Is the candidate written in english?\n\
             candidate: Great Britain is a bit pretentious to call itself \"Great\".\n\
             {{\"answer\": \"YES\"}}\n\
             ------\n\
             criterion: Does the text contain more than 10 words?\n\
             candidate: The cat sleeps.\n\
             {{\"answer\": \"NO\"}}\n\
             ------\n\
             criterion: {criterion}\n\
             candidate: {candidate}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_replaces_every_placeholder() {
        assert_eq!(render_template("Q: {chunk} / {chunk}", "x"), "Q: x / x");
    }

    #[test]
    fn judge_prompt_ends_with_candidate() {
        let p = judge_prompt("the text", "is it short?");
        assert!(p.ends_with("criterion: is it short?\ncandidate: the text\n"));
        assert!(p.contains("{\"answer\": \"NO\"}"));
    }
}
