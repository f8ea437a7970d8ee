//! Deterministic keyword coverage scoring.
//!
//! Runs after every rewrite as a sanity check on the model's output: how many
//! of the posting's salient terms actually appear in the tailored resume. No
//! model call involved, so the score is reproducible and cheap.

use serde::Serialize;

/// Posting terms considered beyond this rank are noise.
const TOP_KEYWORDS: usize = 20;

/// Function words and posting boilerplate that carry no signal.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "all", "also", "and", "any", "are", "been", "before", "being",
    "best", "both", "but", "can", "could", "did", "does", "each", "etc", "for", "from", "had",
    "has", "have", "her", "here", "him", "his", "how", "include", "including", "into", "its",
    "may", "might", "more", "most", "must", "not", "other", "our", "out", "over", "per", "should",
    "some", "such", "than", "that", "the", "their", "them", "then", "these", "they", "this",
    "those", "through", "under", "was", "well", "were", "what", "when", "where", "which", "while",
    "who", "will", "with", "within", "would", "you", "your",
];

#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// 0 to 100: share of top posting keywords present in the rewrite.
    pub score: u32,
    pub matched: Vec<String>,
    pub missed: Vec<String>,
    pub summary: String,
}

/// Scores a tailored resume against the posting it was written for.
pub fn report(job_text: &str, resume_content: &str) -> CoverageReport {
    let keywords = top_keywords(job_text);
    if keywords.is_empty() {
        return CoverageReport {
            score: 0,
            matched: Vec::new(),
            missed: Vec::new(),
            summary: "The posting yielded no usable keywords to score against.".to_string(),
        };
    }

    let resume_tokens: std::collections::HashSet<String> =
        tokenize(resume_content).into_iter().collect();

    let mut matched = Vec::new();
    let mut missed = Vec::new();
    for keyword in keywords {
        if resume_tokens.contains(&keyword) {
            matched.push(keyword);
        } else {
            missed.push(keyword);
        }
    }

    let total = matched.len() + missed.len();
    let score = ((matched.len() * 100) as f64 / total as f64).round() as u32;
    let summary = summarize(score, &missed);

    CoverageReport {
        score,
        matched,
        missed,
        summary,
    }
}

/// The posting's most frequent non-stopword terms, most frequent first.
/// Ties break on first appearance so the ranking is stable.
fn top_keywords(job_text: &str) -> Vec<String> {
    let tokens = tokenize(job_text);

    let mut counts: Vec<(String, usize, usize)> = Vec::new();
    for (position, token) in tokens.into_iter().enumerate() {
        match counts.iter_mut().find(|(existing, _, _)| *existing == token) {
            Some((_, count, _)) => *count += 1,
            None => counts.push((token, 1, position)),
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    counts
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(token, _, _)| token)
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.len() > 2 && !STOPWORDS.contains(&token.as_str()))
        .collect()
}

fn summarize(score: u32, missed: &[String]) -> String {
    if score >= 80 {
        "Strong keyword coverage; the rewrite tracks the posting closely.".to_string()
    } else if score >= 50 {
        let top_missed: Vec<&str> = missed.iter().take(3).map(String::as_str).collect();
        format!(
            "Partial coverage; consider working in: {}.",
            top_missed.join(", ")
        )
    } else {
        "Weak coverage; the rewrite misses most of the posting's keywords.".to_string()
    }
}
