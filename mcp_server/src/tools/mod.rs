//! MCP tools for Open Source Cloud provisioning.
//!
//! Tools are executable functions that AI agents can invoke. Each tool has an
//! input schema, and its arguments are validated into a [`ToolCall`] before
//! the server dispatches it.

pub mod database;
pub mod pipeline;
pub mod storage;
pub mod vod;

pub use database::*;
pub use pipeline::*;
pub use storage::*;
pub use vod::*;

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use osc_shared_types::{InstanceName, OscError, Result, INSTANCE_NAME_PATTERN};
use provisioner::{DatabaseKind, OutputSpec};

use crate::validation::Violations;

/// Every tool the server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CreateDatabase,
    CreateBucket,
    CreateVodPipeline,
    RemoveVodPipeline,
    GetVodPipeline,
    CreateVod,
    UploadFile,
    ListFiles,
    CreateBucketOnInstance,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::CreateDatabase,
        ToolName::CreateBucket,
        ToolName::CreateVodPipeline,
        ToolName::RemoveVodPipeline,
        ToolName::GetVodPipeline,
        ToolName::CreateVod,
        ToolName::UploadFile,
        ToolName::ListFiles,
        ToolName::CreateBucketOnInstance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::CreateDatabase => "create_database",
            ToolName::CreateBucket => "create_bucket",
            ToolName::CreateVodPipeline => "create_vod_pipeline",
            ToolName::RemoveVodPipeline => "remove_vod_pipeline",
            ToolName::GetVodPipeline => "get_vod_pipeline",
            ToolName::CreateVod => "create_vod",
            ToolName::UploadFile => "upload_file",
            ToolName::ListFiles => "list_files",
            ToolName::CreateBucketOnInstance => "create_bucket_on_instance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::CreateDatabase => {
                "Create a new database instance in Eyevinn Open Source Cloud and return its connection URL"
            }
            ToolName::CreateBucket => {
                "Create an S3 compatible bucket in Eyevinn Open Source Cloud"
            }
            ToolName::CreateVodPipeline => {
                "Create a VOD pipeline (storage, transcoder, queue, callback listener and packager) in Eyevinn Open Source Cloud"
            }
            ToolName::RemoveVodPipeline => {
                "Remove a VOD pipeline in Eyevinn Open Source Cloud, optionally including its storage"
            }
            ToolName::GetVodPipeline => "Describe an existing VOD pipeline",
            ToolName::CreateVod => {
                "Create a VOD package using a VOD pipeline in Eyevinn Open Source Cloud"
            }
            ToolName::UploadFile => "Upload a local file to a bucket on a storage instance",
            ToolName::ListFiles => "List the files in a bucket on a storage instance",
            ToolName::CreateBucketOnInstance => {
                "Create a bucket on an existing storage instance"
            }
        }
    }

    /// JSON schema of the tool's arguments, including the constraints that
    /// plain Rust types cannot express (name pattern, enum values, URLs).
    pub fn input_schema(self) -> Value {
        use Constraint::*;

        let (mut schema, constraints): (Value, &[(&str, Constraint)]) = match self {
            ToolName::CreateDatabase => (
                schema_of::<CreateDatabaseInput>(),
                &[("name", Name), ("type", OneOf(&DatabaseKind::NAMES))],
            ),
            ToolName::CreateBucket => (schema_of::<CreateBucketInput>(), &[("name", Name)]),
            ToolName::CreateVodPipeline => (
                schema_of::<CreateVodPipelineInput>(),
                &[("name", Name), ("output.bucket", Name)],
            ),
            ToolName::RemoveVodPipeline => {
                (schema_of::<RemoveVodPipelineInput>(), &[("name", Name)])
            }
            ToolName::GetVodPipeline => (schema_of::<GetVodPipelineInput>(), &[("name", Name)]),
            ToolName::CreateVod => (
                schema_of::<CreateVodInput>(),
                &[("pipeline", Name), ("source", Url)],
            ),
            ToolName::UploadFile => (
                schema_of::<UploadFileInput>(),
                &[
                    ("instanceName", Name),
                    ("bucket", Name),
                    ("objectKey", NonEmpty),
                    ("filePath", NonEmpty),
                ],
            ),
            ToolName::ListFiles => (
                schema_of::<ListFilesInput>(),
                &[("instanceName", Name), ("bucket", Name)],
            ),
            ToolName::CreateBucketOnInstance => (
                schema_of::<CreateBucketOnInstanceInput>(),
                &[("instanceName", Name), ("bucketName", Name)],
            ),
        };
        for (path, constraint) in constraints {
            constrain(&mut schema, path, *constraint);
        }
        schema
    }
}

/// Schema keywords added to a field on top of its Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Instance, bucket or pipeline name.
    Name,
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
    /// Absolute URL.
    Url,
    /// Non-empty string.
    NonEmpty,
}

impl Constraint {
    fn keywords(self) -> Vec<(&'static str, Value)> {
        match self {
            Constraint::Name => vec![("pattern", Value::from(INSTANCE_NAME_PATTERN))],
            Constraint::OneOf(options) => vec![("enum", Value::from(options.to_vec()))],
            Constraint::Url => vec![("format", Value::from("uri"))],
            Constraint::NonEmpty => vec![("minLength", Value::from(1))],
        }
    }
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CreateDatabase {
        name: InstanceName,
        kind: DatabaseKind,
    },
    CreateBucket {
        name: InstanceName,
    },
    CreateVodPipeline {
        name: InstanceName,
        output: OutputSpec,
    },
    RemoveVodPipeline {
        name: InstanceName,
        remove_storage: bool,
    },
    GetVodPipeline {
        name: InstanceName,
    },
    CreateVod {
        pipeline: InstanceName,
        source: String,
    },
    UploadFile {
        instance: InstanceName,
        bucket: InstanceName,
        object_key: String,
        file_path: PathBuf,
    },
    ListFiles {
        instance: InstanceName,
        bucket: InstanceName,
    },
    CreateBucketOnInstance {
        instance: InstanceName,
        bucket: InstanceName,
    },
}

impl ToolCall {
    /// Deserialize and validate `arguments` for `tool`.
    pub fn parse(tool: ToolName, arguments: Value) -> Result<Self> {
        match tool {
            ToolName::CreateDatabase => {
                parse_input::<CreateDatabaseInput>(tool, arguments)?.validate()
            }
            ToolName::CreateBucket => parse_input::<CreateBucketInput>(tool, arguments)?.validate(),
            ToolName::CreateVodPipeline => {
                parse_input::<CreateVodPipelineInput>(tool, arguments)?.validate()
            }
            ToolName::RemoveVodPipeline => {
                parse_input::<RemoveVodPipelineInput>(tool, arguments)?.validate()
            }
            ToolName::GetVodPipeline => {
                parse_input::<GetVodPipelineInput>(tool, arguments)?.validate()
            }
            ToolName::CreateVod => parse_input::<CreateVodInput>(tool, arguments)?.validate(),
            ToolName::UploadFile => parse_input::<UploadFileInput>(tool, arguments)?.validate(),
            ToolName::ListFiles => parse_input::<ListFilesInput>(tool, arguments)?.validate(),
            ToolName::CreateBucketOnInstance => {
                parse_input::<CreateBucketOnInstanceInput>(tool, arguments)?.validate()
            }
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::CreateDatabase { .. } => ToolName::CreateDatabase,
            ToolCall::CreateBucket { .. } => ToolName::CreateBucket,
            ToolCall::CreateVodPipeline { .. } => ToolName::CreateVodPipeline,
            ToolCall::RemoveVodPipeline { .. } => ToolName::RemoveVodPipeline,
            ToolCall::GetVodPipeline { .. } => ToolName::GetVodPipeline,
            ToolCall::CreateVod { .. } => ToolName::CreateVod,
            ToolCall::UploadFile { .. } => ToolName::UploadFile,
            ToolCall::ListFiles { .. } => ToolName::ListFiles,
            ToolCall::CreateBucketOnInstance { .. } => ToolName::CreateBucketOnInstance,
        }
    }
}

/// Check `arguments` against the tool's schema, then deserialize them.
///
/// Missing arguments are treated as an empty object so that every required
/// field is reported.
fn parse_input<T: DeserializeOwned>(tool: ToolName, arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let mut violations = Violations::new();
    violations.schema(&tool.input_schema(), &arguments);
    if !violations.is_empty() {
        return violations.finish(|| None);
    }

    serde_json::from_value(arguments)
        .map_err(|e| OscError::Validation(format!("arguments: {}", e)))
}

/// Tool definitions for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolDefinitions {
    /// Available tools
    pub tools: Vec<ToolInfo>,
}

/// Information about a single tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolInfo {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Input schema (JSON Schema)
    pub input_schema: Value,
}

impl ToolDefinitions {
    /// Get all available tool definitions.
    pub fn all() -> Self {
        Self {
            tools: ToolName::ALL
                .into_iter()
                .map(|tool| ToolInfo {
                    name: tool.as_str().to_string(),
                    description: tool.description().to_string(),
                    input_schema: tool.input_schema(),
                })
                .collect(),
        }
    }
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

/// Add a constraint's keywords to the property at a dotted `path`, following
/// `$ref`s into nested definitions.
pub fn constrain(schema: &mut Value, path: &str, constraint: Constraint) {
    let Some(pointer) = property_pointer(schema, path) else {
        return;
    };
    if let Some(Value::Object(property)) = schema.pointer_mut(&pointer) {
        for (keyword, value) in constraint.keywords() {
            property.insert(keyword.to_string(), value);
        }
    }
}

/// JSON pointer of the property at a dotted `path`.
pub fn property_pointer(schema: &Value, path: &str) -> Option<String> {
    let mut pointer = String::new();
    for (depth, segment) in path.split('.').enumerate() {
        if depth > 0 {
            pointer = object_pointer(schema, &pointer)?;
        }
        pointer = format!("{}/properties/{}", pointer, segment);
    }
    schema.pointer(&pointer).map(|_| pointer)
}

fn object_pointer(root: &Value, pointer: &str) -> Option<String> {
    let node = root.pointer(pointer)?;
    if node.get("properties").is_some() {
        return Some(pointer.to_string());
    }
    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        return reference.strip_prefix('#').map(str::to_string);
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = node.get(key) {
            for index in 0..variants.len() {
                let variant = format!("{}/{}/{}", pointer, key, index);
                if let Some(found) = object_pointer(root, &variant) {
                    return Some(found);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::from_name("create_db"), None);
    }

    #[test]
    fn test_definitions_cover_every_tool() {
        let defs = ToolDefinitions::all();
        assert_eq!(defs.tools.len(), ToolName::ALL.len());
        assert!(defs.tools.iter().all(|t| !t.description.is_empty()));
    }

    #[test]
    fn test_name_pattern_in_schema() {
        let schema = ToolName::CreateDatabase.input_schema();
        assert_eq!(schema["properties"]["name"]["pattern"], INSTANCE_NAME_PATTERN);
        assert!(schema["properties"]["type"]["pattern"].is_null());
    }

    #[test]
    fn test_nested_name_pattern_in_schema() {
        let schema = ToolName::CreateVodPipeline.input_schema();
        let pointer = property_pointer(&schema, "output.bucket").unwrap();
        assert_eq!(
            schema.pointer(&pointer).unwrap()["pattern"],
            INSTANCE_NAME_PATTERN
        );
    }

    #[test]
    fn test_parse_create_database() {
        let call = ToolCall::parse(
            ToolName::CreateDatabase,
            json!({"name": "mydb1", "type": "MemoryDb"}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::CreateDatabase {
                name: InstanceName::parse("mydb1").unwrap(),
                kind: DatabaseKind::MemoryDb,
            }
        );
        assert_eq!(call.tool(), ToolName::CreateDatabase);
    }

    #[test]
    fn test_parse_reports_every_bad_field() {
        let err = ToolCall::parse(
            ToolName::CreateDatabase,
            json!({"name": "My-DB", "type": "Graph"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("name: Invalid name"), "{}", message);
        assert!(message.contains("type: Invalid enum value"), "{}", message);
    }

    #[test]
    fn test_parse_reports_every_missing_field() {
        let err = ToolCall::parse(ToolName::CreateBucketOnInstance, json!({})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("instanceName: Required"), "{}", message);
        assert!(message.contains("bucketName: Required"), "{}", message);
    }

    #[test]
    fn test_parse_reports_mistyped_field_alongside_bad_name() {
        let err = ToolCall::parse(
            ToolName::CreateDatabase,
            json!({"name": "My-DB", "type": 5}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("name: Invalid name"), "{}", message);
        assert!(message.contains("type: "), "{}", message);
        assert!(!message.contains("arguments:"), "{}", message);
    }

    #[test]
    fn test_parse_create_vod_reports_name_and_url() {
        let err = ToolCall::parse(
            ToolName::CreateVod,
            json!({"pipeline": "Promo_Pipe", "source": "videos/in.mp4"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("pipeline: Invalid name"), "{}", message);
        assert!(message.contains("source: Invalid url"), "{}", message);
    }

    #[test]
    fn test_parse_nested_bucket_name() {
        let err = ToolCall::parse(
            ToolName::CreateVodPipeline,
            json!({"name": "promo", "output": {"bucket": "Out_Bucket"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("output.bucket: Invalid name"), "{}", err);
    }

    #[test]
    fn test_missing_arguments() {
        let err = ToolCall::parse(ToolName::CreateBucket, Value::Null).unwrap_err();
        assert!(matches!(err, OscError::Validation(_)));
        assert!(err.to_string().contains("name"));
    }
}
