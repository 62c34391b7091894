use std::fmt::Write as _;

use vendy_core::domain::tenant::Tenant;

use crate::llm::TranscriptEntry;
use crate::tools::ToolSpec;

/// Renders the full planner prompt for one decision: the selling persona,
/// the ground rules, the available tools, and everything that happened in
/// the turn so far.
pub fn render_prompt(tenant: &Tenant, specs: &[ToolSpec], transcript: &[TranscriptEntry]) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are the sales assistant for {name}, a {business}. {personality}",
        name = tenant.name,
        business = tenant.business_type,
        personality = tenant.personality,
    );
    out.push('\n');
    out.push_str(RULES);
    out.push('\n');

    out.push_str("Available tools:\n");
    for spec in specs {
        let _ = writeln!(out, "- {}: {}", spec.name, spec.description);
        let _ = writeln!(out, "  parameters: {}", spec.parameters);
    }
    out.push('\n');

    out.push_str("Conversation so far:\n");
    for entry in transcript {
        match entry {
            TranscriptEntry::Customer(text) => {
                let _ = writeln!(out, "customer: {text}");
            }
            TranscriptEntry::ToolCall { name, arguments } => {
                let _ = writeln!(out, "tool call: {name} {arguments}");
            }
            TranscriptEntry::ToolResult { name, payload } => {
                let _ = writeln!(out, "tool result ({name}): {payload}");
            }
        }
    }

    out
}

const RULES: &str = "\
Rules:
- Only offer products the catalog reports as available. Never invent a product or a price.
- If a search reports price_not_found, tell the customer you are checking on the price.
- If a search reports out_of_stock, say so and suggest an alternative from the catalog.
- If a search escalated, tell the customer you are checking with the shop and will get back to them.
- Quantities only change through the cart tools. Confirm the cart back to the customer after changing it.
- Answer in the customer's language.
";
