use crate::core::time::parse_day;
use crate::format;
use crate::mail::{self, MailError};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::store::OutgoingMessage;
use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json;

use super::MailboxAccess;

const INVALID_DAY: &str = "Invalid date format. Please use YYYY-MM-DD.";

#[derive(Serialize)]
pub struct EmailSearchProps {
    pub date: Property,
    pub keyword: Property,
}

#[derive(Deserialize)]
pub struct EmailSearchArgs {
    pub date: String,
    pub keyword: String,
}

#[derive(Serialize)]
pub struct EmailSearchTool {
    pub r#type: ToolType,
    pub function: Function<EmailSearchProps>,
    #[serde(skip)]
    access: MailboxAccess,
}

#[async_trait]
impl ToolCall for EmailSearchTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: EmailSearchArgs = serde_json::from_str(args)?;

        let Ok(target_date) = parse_day(&fn_args.date) else {
            return Ok(INVALID_DAY.to_string());
        };

        let keyword = fn_args.keyword.clone();
        let outcome = self
            .access
            .run(move |session| mail::search(session, target_date, &keyword))
            .await;

        let out = match outcome {
            Ok(Ok(entries)) => format::mail_search(&entries, target_date, &fn_args.keyword),
            Ok(Err(e)) => {
                tracing::error!("Error during email search: {}", e);
                format!("Error occurred during email search: {e}")
            }
            Err(e) => {
                tracing::error!("Error during email search: {}", e);
                format::session_failure("Error occurred during email search", &e)
            }
        };
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl EmailSearchTool {
    pub fn new(access: MailboxAccess) -> Self {
        let function = Function {
            name: String::from("search_email"),
            description: String::from(
                "Find emails received on a given date (YYYY-MM-DD) whose subject or body contains a keyword.",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: EmailSearchProps {
                    date: Property::string("Day the email was received, as YYYY-MM-DD."),
                    keyword: Property::string(
                        "Text to look for in the subject or body. Case is ignored.",
                    ),
                },
                required: vec![String::from("date"), String::from("keyword")],
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
}

#[derive(Serialize)]
pub struct SendEmailProps {
    pub to: Property,
    pub cc: Property,
    pub subject: Property,
    pub body: Property,
}

#[derive(Deserialize)]
pub struct SendEmailArgs {
    pub to: String,
    #[serde(default)]
    pub cc: String,
    pub subject: String,
    pub body: String,
}

#[derive(Serialize)]
pub struct SendEmailTool {
    pub r#type: ToolType,
    pub function: Function<SendEmailProps>,
    #[serde(skip)]
    access: MailboxAccess,
    #[serde(skip)]
    confirm_before_send: bool,
}

#[async_trait]
impl ToolCall for SendEmailTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: SendEmailArgs = serde_json::from_str(args)?;
        let message = OutgoingMessage {
            to: fn_args.to,
            cc: fn_args.cc,
            subject: fn_args.subject,
            body: fn_args.body,
        };
        let confirm = self.confirm_before_send;

        let outcome = self
            .access
            .run(move |session| mail::send(session, &message, confirm))
            .await;

        let out = match outcome {
            Ok(Ok(())) => String::from("Email sent successfully."),
            Ok(Err(MailError::Cancelled)) => {
                String::from("Email was not sent: cancelled at confirmation.")
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to send email: {}", e);
                format!("Failed to send email: {e}")
            }
            Err(e) => {
                tracing::error!("Failed to send email: {}", e);
                format::session_failure("Failed to send email", &e)
            }
        };
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl SendEmailTool {
    pub fn new(access: MailboxAccess, confirm_before_send: bool) -> Self {
        let description = if confirm_before_send {
            "Send an email. The message is shown to the user for confirmation before it is sent."
        } else {
            "Send an email with the specified details."
        };
        let function = Function {
            name: String::from("send_email"),
            description: String::from(description),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: SendEmailProps {
                    to: Property::string("Recipients, separated by semicolons."),
                    cc: Property::string("Carbon-copy recipients, separated by semicolons."),
                    subject: Property::string("Subject line."),
                    body: Property::string("Plain-text body."),
                },
                required: vec![
                    String::from("to"),
                    String::from("cc"),
                    String::from("subject"),
                    String::from("body"),
                ],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            access,
            confirm_before_send,
        }
    }
}
