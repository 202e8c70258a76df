//! OpenAI-style function definitions for the tools this crate exposes.

use anyhow::{Error, Result};
use async_trait::async_trait;
use erased_serde;
use serde::Serialize;

#[derive(Serialize)]
pub struct Property {
    pub r#type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<serde_json::Value>>,
}

impl Property {
    pub fn string(description: &str) -> Self {
        Self {
            r#type: String::from("string"),
            description: description.to_string(),
            r#enum: None,
        }
    }
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// `serde::Serialize` is not object safe, so tools are serialized
// through `erased_serde` to allow a heterogeneous `Vec` of boxed tools
// to be written out as one JSON manifest.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    async fn call(&self, args: &str) -> Result<String, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;
