//! Prompt templates for the vision model.

/// Classifies a screenshot of an application form. Asks for strict JSON so
/// the response parses without heuristics; the sentinel-line fallback in
/// `interpret_verdict` covers models that ignore the format anyway.
pub fn classify_prompt(expected_fields: &[String], dom_digest: &str) -> String {
    let fields = if expected_fields.is_empty() {
        "none".to_string()
    } else {
        expected_fields.join(", ")
    };

    format!(
        "You are inspecting a screenshot of a job application web page.\n\n\
         The form elements extracted from the page are:\n{dom_digest}\n\n\
         The fields the agent still intends to fill are: {fields}.\n\n\
         First check for CAPTCHA challenges: an 'I am not a robot' checkbox, a reCAPTCHA \
         widget, or an image selection puzzle. Report CAPTCHA ONLY if you are absolutely \
         certain one is visible.\n\n\
         Reply with ONLY a JSON object, no other text:\n\
         {{\n\
           \"status\": \"READY\" | \"MISSING_FIELDS\" | \"CAPTCHA\" | \"UNKNOWN\",\n\
           \"confidence\": 0.0 to 1.0,\n\
           \"missing\": [\"names of intended fields absent from the page\"],\n\
           \"note\": \"one short sentence about what you see\"\n\
         }}\n\n\
         READY means every intended field is present and interactable. \
         MISSING_FIELDS means the page loaded but some intended fields are absent. \
         UNKNOWN means this does not look like an application form at all."
    )
}

/// Asks whether the page confirms a submitted application. Strict sentinel
/// output survives chatty vision models better than free text.
pub fn confirm_prompt() -> String {
    "You are inspecting a screenshot of a web page shown right after a job application \
     form was submitted. Does the page confirm the application was received? Look for \
     a thank-you message, a confirmation number, or similar.\n\n\
     Reply with exactly 'SUBMITTED: YES' or 'SUBMITTED: NO' and nothing else."
        .to_string()
}
