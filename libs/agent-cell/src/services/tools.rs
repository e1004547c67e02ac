use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};

use notification_cell::NotificationDispatcher;
use scheduling_cell::models::{BookAppointmentRequest, TimeOfDay};
use scheduling_cell::services::{AvailabilityService, BookingService, StatsService};
use shared_models::error::AppError;

/// Tool names are part of the wire contract (they appear in `tool_calls`).
pub mod names {
    pub const GET_DOCTOR_AVAILABILITY: &str = "get_doctor_availability";
    pub const CREATE_APPOINTMENT: &str = "create_appointment";
    pub const GET_DOCTOR_STATS: &str = "get_doctor_stats";
    pub const GET_DOCTOR_SUMMARY_REPORT: &str = "get_doctor_summary_report";
}

/// A named, schema-described operation the agent may invoke. Executors fail
/// with typed errors; the loop decides how a failure reads to the user.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, AppError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, AppError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown tool '{}'", name)))?;
        tool.execute(args).await
    }

    /// OpenAI-style function declarations for LLM-backed planning.
    pub fn schemas(&self) -> Vec<Value> {
        let mut declarations: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect();
        declarations.sort_by_key(|d| d["function"]["name"].as_str().unwrap_or("").to_string());
        declarations
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, AppError> {
    serde_json::from_value(args).map_err(|e| AppError::ValidationError(e.to_string()))
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError(format!("{} must be YYYY-MM-DD, got '{}'", field, raw)))
}

pub fn parse_datetime(raw: &str, field: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map_err(|_| {
            AppError::ValidationError(format!(
                "{} must be an ISO datetime like 2025-12-02T09:00:00, got '{}'",
                field, raw
            ))
        })
}

// ---------------------------------------------------------------------------
// get_doctor_availability
// ---------------------------------------------------------------------------

pub struct AvailabilityTool {
    availability: Arc<AvailabilityService>,
}

impl AvailabilityTool {
    pub fn new(availability: Arc<AvailabilityService>) -> Self {
        Self { availability }
    }
}

#[derive(Deserialize)]
struct AvailabilityArgs {
    doctor_name: String,
    start_date: String,
    end_date: Option<String>,
    time_of_day: Option<String>,
}

#[async_trait]
impl Tool for AvailabilityTool {
    fn name(&self) -> &'static str {
        names::GET_DOCTOR_AVAILABILITY
    }

    fn description(&self) -> &'static str {
        "Return available appointment slots for a doctor between dates."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": { "type": "string" },
                "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                "end_date": { "type": "string", "description": "YYYY-MM-DD (optional)" },
                "time_of_day": { "type": "string", "enum": ["morning", "afternoon", "evening"] },
            },
            "required": ["doctor_name", "start_date"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, AppError> {
        let args: AvailabilityArgs = parse_args(args)?;
        let start_date = parse_date(&args.start_date, "start_date")?;
        let end_date = args
            .end_date
            .as_deref()
            .map(|raw| parse_date(raw, "end_date"))
            .transpose()?;
        let time_of_day = args.time_of_day.as_deref().and_then(TimeOfDay::parse);

        let (doctor, slots) = self
            .availability
            .free_slots(&args.doctor_name, start_date, end_date, time_of_day)
            .await?;

        Ok(json!({
            "ok": true,
            "doctor": doctor.name,
            "doctor_id": doctor.id,
            "available_slots": slots,
        }))
    }
}

// ---------------------------------------------------------------------------
// create_appointment
// ---------------------------------------------------------------------------

pub struct CreateAppointmentTool {
    booking: Arc<BookingService>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl CreateAppointmentTool {
    pub fn new(booking: Arc<BookingService>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            booking,
            dispatcher,
        }
    }
}

#[derive(Deserialize)]
struct CreateAppointmentArgs {
    doctor_name: String,
    patient_name: String,
    patient_email: String,
    start_iso: String,
    end_iso: String,
    reason: Option<String>,
}

#[async_trait]
impl Tool for CreateAppointmentTool {
    fn name(&self) -> &'static str {
        names::CREATE_APPOINTMENT
    }

    fn description(&self) -> &'static str {
        "Book an appointment and send the patient a confirmation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": { "type": "string" },
                "patient_name": { "type": "string" },
                "patient_email": { "type": "string" },
                "start_iso": { "type": "string", "description": "ISO datetime" },
                "end_iso": { "type": "string", "description": "ISO datetime" },
                "reason": { "type": "string" },
            },
            "required": ["doctor_name", "patient_name", "patient_email", "start_iso", "end_iso"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, AppError> {
        let args: CreateAppointmentArgs = parse_args(args)?;
        let start = parse_datetime(&args.start_iso, "start_iso")?;
        let end = parse_datetime(&args.end_iso, "end_iso")?;

        let (doctor, appointment) = self
            .booking
            .book(BookAppointmentRequest {
                doctor_name: args.doctor_name,
                patient_name: args.patient_name,
                patient_email: args.patient_email,
                start,
                end,
                reason: args.reason,
            })
            .await?;

        let outcome = self
            .dispatcher
            .booking_confirmation(
                &appointment.patient_email,
                &appointment.patient_name,
                &doctor.name,
                &appointment.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                &appointment.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            )
            .await;

        Ok(json!({
            "ok": true,
            "appointment_id": appointment.id,
            "doctor": doctor.name,
            "start_iso": appointment.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "end_iso": appointment.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "notification_sent": outcome.sent,
        }))
    }
}

// ---------------------------------------------------------------------------
// get_doctor_stats
// ---------------------------------------------------------------------------

pub struct DoctorStatsTool {
    stats: Arc<StatsService>,
}

impl DoctorStatsTool {
    pub fn new(stats: Arc<StatsService>) -> Self {
        Self { stats }
    }
}

#[derive(Deserialize)]
struct StatsArgs {
    doctor_name: String,
    ref_date: Option<String>,
}

#[async_trait]
impl Tool for DoctorStatsTool {
    fn name(&self) -> &'static str {
        names::GET_DOCTOR_STATS
    }

    fn description(&self) -> &'static str {
        "Get simple appointment counts for a doctor around a reference date."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": { "type": "string" },
                "ref_date": { "type": "string", "description": "YYYY-MM-DD (optional, defaults to today)" },
            },
            "required": ["doctor_name"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, AppError> {
        let args: StatsArgs = parse_args(args)?;
        let ref_date = args
            .ref_date
            .as_deref()
            .map(|raw| parse_date(raw, "ref_date"))
            .transpose()?;

        let stats = self.stats.stats(&args.doctor_name, ref_date).await?;

        Ok(json!({
            "ok": true,
            "doctor": stats.doctor,
            "ref_date": stats.ref_date,
            "patients_yesterday": stats.patients_yesterday,
            "patients_today": stats.patients_today,
            "patients_tomorrow": stats.patients_tomorrow,
            "fever_cases": stats.fever_cases,
        }))
    }
}

// ---------------------------------------------------------------------------
// get_doctor_summary_report
// ---------------------------------------------------------------------------

pub struct SummaryReportTool {
    stats: Arc<StatsService>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl SummaryReportTool {
    pub fn new(stats: Arc<StatsService>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { stats, dispatcher }
    }
}

#[derive(Deserialize)]
struct SummaryArgs {
    doctor_name: String,
    ref_date: Option<String>,
    send_notification: Option<bool>,
}

#[async_trait]
impl Tool for SummaryReportTool {
    fn name(&self) -> &'static str {
        names::GET_DOCTOR_SUMMARY_REPORT
    }

    fn description(&self) -> &'static str {
        "Return a summary report of patient counts and visit reasons, optionally delivered to the doctor's notification channel."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "doctor_name": { "type": "string" },
                "ref_date": { "type": "string", "description": "YYYY-MM-DD (optional, defaults to today)" },
                "send_notification": { "type": "boolean" },
            },
            "required": ["doctor_name"],
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, AppError> {
        let args: SummaryArgs = parse_args(args)?;
        let ref_date = args
            .ref_date
            .as_deref()
            .map(|raw| parse_date(raw, "ref_date"))
            .transpose()?;

        let (doctor, report) = self
            .stats
            .summary_report(&args.doctor_name, ref_date)
            .await?;

        let notification_sent = if args.send_notification.unwrap_or(true) {
            self.dispatcher
                .summary_delivery(
                    doctor.notify_webhook.as_deref(),
                    &doctor.name,
                    &report.summary_text,
                )
                .await
                .sent
        } else {
            false
        };

        Ok(json!({
            "ok": true,
            "summary_text": report.summary_text,
            "raw_stats": {
                "doctor": report.doctor,
                "ref_date": report.ref_date,
                "patients_yesterday": report.patients_yesterday,
                "patients_today": report.patients_today,
                "patients_tomorrow": report.patients_tomorrow,
                "reasons_breakdown": report.reasons_breakdown,
            },
            "notification_sent": notification_sent,
        }))
    }
}

/// The fixed registry this backend ships with.
pub fn build_registry(
    availability: Arc<AvailabilityService>,
    booking: Arc<BookingService>,
    stats: Arc<StatsService>,
    dispatcher: Arc<NotificationDispatcher>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AvailabilityTool::new(availability));
    registry.register(CreateAppointmentTool::new(booking, dispatcher.clone()));
    registry.register(DoctorStatsTool::new(stats.clone()));
    registry.register(SummaryReportTool::new(stats, dispatcher));
    registry
}
