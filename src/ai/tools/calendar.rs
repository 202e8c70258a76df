use crate::calendar;
use crate::core::time::parse_flexible;
use crate::format;
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::store::{BusyStatus, NewAppointment};
use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{self, json};

use super::MailboxAccess;

const INVALID_DATE: &str = "Invalid date format. Please provide dates in YYYY-MM-DD format";
const INVALID_DATETIME: &str =
    "Invalid date/time format. Please provide dates in YYYY-MM-DD HH:MM format";
const MISSING_TIMES: &str = "I need both start time and end time. Please provide them.";

#[derive(Serialize)]
pub struct CalendarProps {
    pub start_date: Property,
    pub end_date: Property,
}

#[derive(Deserialize)]
pub struct CalendarArgs {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Serialize)]
pub struct CalendarTool {
    pub r#type: ToolType,
    pub function: Function<CalendarProps>,
    #[serde(skip)]
    access: MailboxAccess,
}

#[async_trait]
impl ToolCall for CalendarTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: CalendarArgs = serde_json::from_str(args)?;

        let (start, end) = match (
            parse_flexible(&fn_args.start_date),
            parse_flexible(&fn_args.end_date),
        ) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Rejected calendar range: {}", e);
                return Ok(INVALID_DATE.to_string());
            }
        };
        // The end date counts as a whole day
        let Some(end) = end.checked_add_signed(Duration::days(1)) else {
            tracing::warn!("Calendar range end overflows: {}", fn_args.end_date);
            return Ok(INVALID_DATE.to_string());
        };

        let outcome = self
            .access
            .run(move |session| calendar::list(session, start, end))
            .await;

        let out = match outcome {
            Ok(Ok(entries)) => format::calendar(&entries),
            Ok(Err(e)) => {
                tracing::error!("{}", e);
                format!("Error retrieving calendar: {e}")
            }
            Err(e) => {
                tracing::error!("{}", e);
                format::session_failure("Error retrieving calendar", &e)
            }
        };
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CalendarTool {
    pub fn new(access: MailboxAccess) -> Self {
        let function = Function {
            name: String::from("get_calendar"),
            description: String::from("Get calendar items for the specified date range."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: CalendarProps {
                    start_date: Property::string("First day of the range (YYYY-MM-DD)."),
                    end_date: Property::string(
                        "Last day of the range (YYYY-MM-DD). The whole day is included.",
                    ),
                },
                required: vec![String::from("start_date"), String::from("end_date")],
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
pub struct AddAppointmentProps {
    pub subject: Property,
    pub start_time: Property,
    pub end_time: Property,
    pub location: Property,
    pub description: Property,
    pub categories: Property,
    pub busy_status: Property,
}

#[derive(Deserialize)]
pub struct AddAppointmentArgs {
    pub subject: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub busy_status: Option<i64>,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Serialize)]
pub struct AddAppointmentTool {
    pub r#type: ToolType,
    pub function: Function<AddAppointmentProps>,
    #[serde(skip)]
    access: MailboxAccess,
    #[serde(skip)]
    tz_offset: Option<Duration>,
}

#[async_trait]
impl ToolCall for AddAppointmentTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let fn_args: AddAppointmentArgs = serde_json::from_str(args)?;

        let (Some(start_time), Some(end_time)) =
            (given(&fn_args.start_time), given(&fn_args.end_time))
        else {
            return Ok(MISSING_TIMES.to_string());
        };

        let (start, end) = match (parse_flexible(start_time), parse_flexible(end_time)) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Rejected appointment time: {}", e);
                return Ok(INVALID_DATETIME.to_string());
            }
        };
        let (Some(start), Some(end)) = (self.shift(start), self.shift(end)) else {
            tracing::warn!("Appointment time out of range after timezone correction");
            return Ok(INVALID_DATETIME.to_string());
        };

        let busy_status = match BusyStatus::try_from(fn_args.busy_status.unwrap_or(1)) {
            Ok(status) => status,
            Err(code) => {
                return Ok(format!(
                    "Invalid busy status {code}. Use 0 (Free), 1 (Busy), 2 (Tentative) or 3 (Out of Office)."
                ));
            }
        };

        let subject = fn_args.subject;
        let entry = NewAppointment {
            subject: subject.clone(),
            start,
            end,
            location: fn_args.location.unwrap_or_default(),
            body: fn_args.description.unwrap_or_default(),
            categories: fn_args.categories.unwrap_or_default(),
            busy_status,
        };

        let outcome = self
            .access
            .run(move |session| calendar::create(session, &entry))
            .await;

        let out = match outcome {
            Ok(true) => format!("Successfully added appointment: {subject}"),
            Ok(false) => String::from("Failed to add appointment"),
            Err(e) => {
                tracing::error!("{}", e);
                format::session_failure("Failed to add appointment", &e)
            }
        };
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl AddAppointmentTool {
    /// `None` when the time, or the configured offset itself, cannot
    /// be represented.
    fn shift(&self, time: NaiveDateTime) -> Option<NaiveDateTime> {
        time.checked_add_signed(self.tz_offset?)
    }

    pub fn new(access: MailboxAccess, tz_offset_hours: i64) -> Self {
        let function = Function {
            name: String::from("add_appointment"),
            description: String::from("Add a new appointment to the calendar."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: AddAppointmentProps {
                    subject: Property::string("Title of the appointment."),
                    start_time: Property::string("Start time (YYYY-MM-DD HH:MM)."),
                    end_time: Property::string("End time (YYYY-MM-DD HH:MM)."),
                    location: Property::string("Where the appointment takes place."),
                    description: Property::string("Body text of the appointment."),
                    categories: Property::string(
                        "Comma-separated categories. Categorized appointments are sent as invitations.",
                    ),
                    busy_status: Property {
                        r#type: String::from("integer"),
                        description: String::from(
                            "0 = Free, 1 = Busy (default), 2 = Tentative, 3 = Out of Office.",
                        ),
                        r#enum: Some(vec![json!(0), json!(1), json!(2), json!(3)]),
                    },
                },
                required: vec![String::from("subject")],
                additional_properties: false,
            },
            strict: false,
        };

        Self {
            r#type: ToolType::Function,
            function,
            access,
            tz_offset: Duration::try_hours(tz_offset_hours),
        }
    }
}
