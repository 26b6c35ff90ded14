//! # Factuality Grading Prompts
//!
//! Templates for the model-graded comparison of an extracted value against
//! the reference value. `{question}`, `{expert}` and `{submission}` are
//! replaced before the request is sent.

pub const FACTUALITY_SYSTEM_PROMPT: &str = "You grade the factual content of a submitted answer against an expert answer to the same question. \
Ignore differences in style, grammar, punctuation and letter case. \
Answer with a JSON object holding a 'choice' letter and a one-sentence 'reason'.";

pub const FACTUALITY_USER_TEMPLATE: &str = "[Question]: {question}\n\
[Expert]: {expert}\n\
[Submission]: {submission}\n\n\
Pick exactly one option:\n\
(A) The submitted answer is a subset of the expert answer and is fully consistent with it.\n\
(B) The submitted answer is a superset of the expert answer and is fully consistent with it.\n\
(C) The submitted answer contains all the same details as the expert answer.\n\
(D) There is a disagreement between the submitted answer and the expert answer.\n\
(E) The answers differ, but these differences do not matter from the perspective of factuality.";

/// Builds the grading question for one extracted value.
pub fn build_factuality_prompt(question: &str, expert: &str, submission: &str) -> String {
    FACTUALITY_USER_TEMPLATE
        .replace("{question}", question)
        .replace("{expert}", expert)
        .replace("{submission}", submission)
}
