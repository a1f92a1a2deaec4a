//! Prompt construction for answer generation

use crate::storage::{ResultSource, SearchResult};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for a company's internal inquiry system. You help answer questions from team members by referencing past discussions and documentation.

Your role is to:
- Provide accurate, helpful responses based on available context
- Reference specific past discussions or documentation when relevant
- Be concise but comprehensive
- Suggest follow-up actions when appropriate
- Maintain a professional but friendly tone

If you don't have enough information to provide a complete answer, acknowledge this and suggest where the person might find more information or who they should contact.";

/// Build the user prompt from the inquiry text and its ranked evidence
pub fn build_user_prompt(inquiry_text: &str, results: &[SearchResult]) -> String {
    format!(
        "Based on the following context and inquiry, please provide a helpful and accurate response.

Inquiry: {inquiry}

Context:
{context}

Please provide a comprehensive answer that:
1. Directly addresses the inquiry
2. References relevant information from the context
3. Is clear and actionable
4. Includes links to documentation when available
5. Suggests next steps if appropriate

Keep the response concise but thorough.",
        inquiry = inquiry_text,
        context = build_context(inquiry_text, results),
    )
}

/// Evidence grouped by source: past discussions first, then documentation
fn build_context(inquiry_text: &str, results: &[SearchResult]) -> String {
    let mut lines = vec![format!("Original inquiry: {}", inquiry_text), String::new()];

    if results.is_empty() {
        lines.push("No relevant historical information found.".to_string());
        return lines.join("\n");
    }

    let discussions: Vec<&SearchResult> = results
        .iter()
        .filter(|r| r.source == ResultSource::Chat)
        .collect();
    let documents: Vec<&SearchResult> = results
        .iter()
        .filter(|r| r.source == ResultSource::Docs)
        .collect();

    if !discussions.is_empty() {
        lines.push("Similar past Slack discussions:".to_string());
        for (i, r) in discussions.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, r.content));
            if !r.author.is_empty() {
                lines.push(format!("   (by {})", r.author));
            }
            lines.push(String::new());
        }
    }

    if !documents.is_empty() {
        lines.push("Relevant documentation:".to_string());
        for (i, r) in documents.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, r.title));
            if !r.content.is_empty() {
                lines.push(format!("   {}", r.content));
            }
            if !r.url.is_empty() {
                lines.push(format!("   Link: {}", r.url));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}
