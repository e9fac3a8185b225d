//! Text shaping helpers shared by the article pipeline.

/// Builds the embedder input from a title and body: `title + "\n\n" +
/// text[:2000]`, trimmed. Empty result signals the caller should skip
/// embedding altogether.
#[must_use]
pub(crate) fn embedding_input(title: Option<&str>, text: &str) -> String {
    let truncated: String = text.chars().take(2000).collect();
    let body = truncated.trim();

    let combined = match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) if body.is_empty() => title.to_string(),
        Some(title) => format!("{title}\n\n{body}"),
        None => body.to_string(),
    };

    combined.trim().to_string()
}
