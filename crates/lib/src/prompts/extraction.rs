//! # Field Extraction Prompts
//!
//! System prompts and question templates for the extraction agent. The
//! templates use `{field}` and `{locator}` placeholders.

/// The system prompt for reading a single field from a receipt image.
pub const RECEIPT_EXTRACTION_SYSTEM_PROMPT: &str = "Use 'fetch_content' to process the receipt image. \
Use 'lookup_field' if you need the name of the requested field. \
Extract the requested field from the OCR-processed text of the image. \
Copy values as they appear in the text. For example, if the field is 'total' and the receipt reads '100.00', the value is '100.00'. \
If the field is not present, return null for it. \
Do not decorate the output with any explanation or markdown.";

/// The system prompt for reading fields from a contract PDF.
pub const CONTRACT_EXTRACTION_SYSTEM_PROMPT: &str = "Use the 'fetch_content' tool to extract the text of the PDF document. \
Use 'lookup_field' if you need the name of the requested field. \
Return the requested information from the extracted text content of the PDF. \
If any field cannot be identified, return it as null. \
Do not include explanations or markdown, only return the structured output.";

pub const RECEIPT_QUESTION_TEMPLATE: &str = "What is the {field} in receipt index {locator}?";

pub const CONTRACT_QUESTION_TEMPLATE: &str = "What is the {field} in the contract?";

/// Appended to every extraction system prompt. `{fields}` is replaced with
/// the schema description.
pub const STRUCTURED_OUTPUT_INSTRUCTION: &str = "Your final answer MUST be a single JSON object with exactly these keys, \
each holding a string or null:\n{fields}\n\
Fill the requested field from the document. Fill any other field you can read from the same text, \
or set it to null. Output only the JSON object.";

/// Sent back to the model when its previous answer could not be used.
/// `{reason}` is replaced with the failure description.
pub const RETRY_FEEDBACK_TEMPLATE: &str = "The previous output was invalid because {reason}. \
Fix the problem and answer again with only the JSON object.";

/// Builds the full extraction system prompt for a document type.
pub fn build_extraction_system_prompt(base: &str, schema_description: &str) -> String {
    format!(
        "{base}\n\n{}",
        STRUCTURED_OUTPUT_INSTRUCTION.replace("{fields}", schema_description)
    )
}

/// Builds the retry feedback message for a failure reason.
pub fn build_retry_feedback(reason: &str) -> String {
    RETRY_FEEDBACK_TEMPLATE.replace("{reason}", reason)
}
