//! Prompt construction and reply parsing shared by all backends.

use std::collections::{HashMap, HashSet};
use switchyard_types::ToolDescriptor;

/// Build the selection prompt for `query` over `candidates`.
pub fn build_prompt(query: &str, candidates: &[ToolDescriptor], max_tools: usize) -> String {
    let tools_json = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You choose tools for a task. From the available tools below, pick the ones \
that best help with the user's query.\n\
\n\
Rules:\n\
- Pick at most {max_tools} tools.\n\
- Order them from most to least relevant.\n\
- Prefer tools that solve the query directly, then tools that supply supporting information.\n\
- Fewer good tools beat many weak ones.\n\
\n\
User query: {query}\n\
\n\
Available tools:\n\
{tools_json}\n\
\n\
Answer with a JSON array of tool names and nothing else, e.g. [\"best_tool\", \"second_tool\"]."
    )
}

/// Parse a model reply into a list of tool names.
///
/// Accepts a bare JSON array or one wrapped in a Markdown code fence.
pub fn parse_ranked_names(reply: &str) -> Result<Vec<String>, serde_json::Error> {
    serde_json::from_str(strip_code_fence(reply))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an info string such as "json"
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Map ranked names back to candidates.
///
/// Keeps at most `max_tools` names, drops names that are not candidates and
/// repeated names, and preserves the ranked order.
pub fn select_by_names(
    names: &[String],
    candidates: &[ToolDescriptor],
    max_tools: usize,
) -> Vec<ToolDescriptor> {
    let by_name: HashMap<&str, &ToolDescriptor> =
        candidates.iter().map(|t| (t.name.as_str(), t)).collect();
    let mut seen = HashSet::new();

    names
        .iter()
        .take(max_tools)
        .filter(|name| seen.insert(name.as_str()))
        .filter_map(|name| by_name.get(name.as_str()).map(|t| (*t).clone()))
        .collect()
}
