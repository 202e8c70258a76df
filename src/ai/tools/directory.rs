use crate::directory::{self, DirectoryError};
use crate::format;
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::session::SessionError;
use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json;

use super::MailboxAccess;

#[derive(Serialize)]
pub struct DirectorySearchProps {
    pub name: Property,
}

#[derive(Deserialize)]
pub struct DirectorySearchArgs {
    pub name: String,
}

/// Directory lookup by name or address. Published under two names,
/// `search_outlook` and `search_contact`, with the same behavior.
#[derive(Serialize)]
pub struct DirectorySearchTool {
    pub r#type: ToolType,
    pub function: Function<DirectorySearchProps>,
    #[serde(skip)]
    access: MailboxAccess,
}

#[async_trait]
impl ToolCall for DirectorySearchTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: DirectorySearchArgs = serde_json::from_str(args)?;
        let query = fn_args.name;

        let outcome = self
            .access
            .run(move |session| directory::resolve(session, &query))
            .await;

        let out = match outcome {
            Ok(Ok(user)) => format::user_info(&user),
            Ok(Err(e)) => format::directory_failure(&e),
            Err(SessionError::Unavailable(e)) => {
                tracing::error!("Directory unavailable: {}", e);
                format::directory_failure(&DirectoryError::Unavailable(e))
            }
            Err(e) => {
                tracing::error!("Error during directory search: {}", e);
                format::session_failure("Error searching the directory", &e)
            }
        };
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl DirectorySearchTool {
    pub fn new(access: MailboxAccess, name: &str, description: &str) -> Self {
        let function = Function {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: DirectorySearchProps {
                    name: Property::string("Name or email address to search for."),
                },
                required: vec![String::from("name")],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            access,
        }
    }

    pub fn outlook(access: MailboxAccess) -> Self {
        Self::new(
            access,
            "search_outlook",
            "Search for a user in the organization directory and return their information.",
        )
    }

    pub fn contact(access: MailboxAccess) -> Self {
        Self::new(
            access,
            "search_contact",
            "Search for a contact by name and return their directory information.",
        )
    }
}
