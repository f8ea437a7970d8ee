//! Prompt templates for the text model.

/// Rewrites the applicant's resume against one job posting. The model sees
/// the posting first so the rewrite anchors on its vocabulary.
pub fn tailor_prompt(job_text: &str, base_resume: &str) -> String {
    format!(
        "You are an expert ATS optimization AI. Rewrite the following resume to highlight \
         the skills relevant to the job description provided.\n\n\
         Job Description:\n{job_text}\n\n\
         Original User Resume:\n{base_resume}\n\n\
         Return ONLY the rewritten professional experience bullet points. \
         Do not invent employers, titles, dates, or credentials that are not in the original resume."
    )
}
