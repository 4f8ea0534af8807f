//! Fixture content used by the scenario suites.

use elefante_core::AgentEnrichment;

/// The literal contents from the acceptance scenarios
pub const ABSOLUTE_PATHS: &str = "Always use absolute paths in Elefante.";
pub const ABSOLUTE_PATHS_V1: &str = "Always use absolute paths.";
pub const ABSOLUTE_PATHS_V2: &str =
    "Always use absolute paths; never `python` bare, use `sys.executable`.";
pub const RELATIVE_PATHS_PRO: &str = "Always use relative paths.";
pub const RELATIVE_PATHS_CON: &str = "Never use relative paths.";
pub const DASHBOARD_PORT: &str = "Docker container for dashboard runs on port 8000";
pub const MCP_STDIO: &str = "MCP server runs on stdio";

/// Enrichment with a pinned canonical key
pub fn keyed(canonical_key: &str) -> AgentEnrichment {
    AgentEnrichment {
        canonical_key: Some(canonical_key.to_string()),
        ..Default::default()
    }
}

/// Enrichment with a pinned importance
pub fn important(importance: u8) -> AgentEnrichment {
    AgentEnrichment {
        importance: Some(importance),
        ..Default::default()
    }
}
