//! cache_generations tool implementation.
//!
//! Lists store generations and whether they belong to the running version.

use larder_core::{CacheDb, CacheVersion, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One generation as reported by cache_generations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationView {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
    /// Whether the generation carries the running version prefix.
    pub live: bool,
}

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    pub version: String,
    pub generations: Vec<GenerationView>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(cache: &CacheDb, version: &CacheVersion) -> Result<CallToolResult, McpError> {
    let generations = cache
        .generation_stats()
        .await?
        .into_iter()
        .map(|stat| GenerationView {
            live: version.owns(&stat.name),
            name: stat.name,
            entries: stat.entries,
            created_at: stat.created_at,
        })
        .collect();

    let output = CacheGenerationsOutput { version: version.token().to_string(), generations };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
