//! Tool documentation appended to agent instructions

use std::collections::BTreeMap;

use crate::tools::ToolEntry;

use super::agent::exposed_tool_names;

/// Full tool context: tools grouped by domain plus usage guidelines
pub fn generate_tool_context(tools: &[ToolEntry]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let names = exposed_tool_names(tools);
    let mut by_domain: BTreeMap<&str, Vec<(&str, &ToolEntry)>> = BTreeMap::new();
    for (entry, name) in tools.iter().zip(&names) {
        by_domain
            .entry(entry.metadata.domain.as_str())
            .or_default()
            .push((name.as_str(), entry));
    }

    let mut lines = vec![
        "## AVAILABLE TOOLS\n".to_string(),
        "You have access to the following tools:\n".to_string(),
    ];
    for (domain, entries) in by_domain {
        lines.push(format!("\n### {} TOOLS", domain.to_uppercase()));
        for (name, entry) in entries {
            lines.push(format!("- **{}**: {}", name, entry.metadata.description));
        }
    }

    lines.push("\n## USAGE GUIDELINES\n".to_string());
    lines.push("- Use the appropriate tool based on the user's question".to_string());
    lines.push(
        "- When asked about your capabilities or tools, mention ALL tools listed above from all domains".to_string(),
    );
    lines.push("- Always provide clear, well-formatted responses".to_string());
    lines.push("- If unsure which tool to use, ask the user for clarification".to_string());

    lines.join("\n")
}

/// One line per tool
pub fn generate_compact_context(tools: &[ToolEntry]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = tools
        .iter()
        .zip(exposed_tool_names(tools))
        .map(|(e, name)| format!("- {}: {}", name, e.metadata.description))
        .collect();
    format!("## Available Tools\n{}", lines.join("\n"))
}

/// Append generated tool context to `instructions`
pub fn inject_tool_context(instructions: &str, tools: &[ToolEntry], compact: bool) -> String {
    let context = if compact {
        generate_compact_context(tools)
    } else {
        generate_tool_context(tools)
    };

    if context.is_empty() {
        return instructions.to_string();
    }

    format!("{}\n\n{}\n\n{}", instructions, "=".repeat(80), context)
}
