//! Database MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use osc_shared_types::Result;
use provisioner::DatabaseKind;

use super::ToolCall;
use crate::validation::Violations;

/// Input for creating a database
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateDatabaseInput {
    /// Name of the database
    pub name: String,
    /// Type of database [SQL, NoSQL, MemoryDb]
    #[serde(rename = "type")]
    pub database_type: String,
}

impl CreateDatabaseInput {
    pub fn validate(self) -> Result<ToolCall> {
        let mut v = Violations::new();
        let name = v.name("name", &self.name);
        let kind = v.absorb(self.database_type.parse::<DatabaseKind>());
        v.finish(|| {
            Some(ToolCall::CreateDatabase {
                name: name?,
                kind: kind?,
            })
        })
    }
}

/// Output from creating a database
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub database_type: String,
    /// Connection URL, including credentials where the database requires them
    pub connection_url: String,
}
