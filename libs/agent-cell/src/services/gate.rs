use std::sync::Arc;

use serde_json::Value;

use scheduling_cell::services::DoctorDirectory;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use super::tools::names;

/// Per-tool authorization. Anonymous callers are treated as patients; doctor
/// tokens are bound to one directory entry and may only touch that entry's
/// data.
pub struct RoleGate {
    directory: Arc<DoctorDirectory>,
}

impl RoleGate {
    pub fn new(directory: Arc<DoctorDirectory>) -> Self {
        Self { directory }
    }

    /// Check that `user` may invoke `tool` with `args`, and normalize the
    /// arguments: doctor-scoped tools get the bound doctor name filled in
    /// when the planner left it out.
    pub async fn authorize(
        &self,
        user: Option<&AuthUser>,
        tool: &str,
        mut args: Value,
    ) -> Result<Value, AppError> {
        match tool {
            names::GET_DOCTOR_AVAILABILITY => Ok(args),
            names::CREATE_APPOINTMENT => {
                if user.map(|u| u.is_doctor()).unwrap_or(false) {
                    return Err(AppError::Forbidden(
                        "Doctors cannot book appointments through the assistant".to_string(),
                    ));
                }
                Ok(args)
            }
            names::GET_DOCTOR_STATS | names::GET_DOCTOR_SUMMARY_REPORT => {
                let user = user.filter(|u| u.is_doctor()).ok_or_else(|| {
                    AppError::Forbidden(
                        "Stats and reports are available to doctors only".to_string(),
                    )
                })?;
                let bound = user.doctor_name.as_deref().ok_or_else(|| {
                    AppError::Forbidden("Doctor token is not bound to a doctor".to_string())
                })?;

                match args.get("doctor_name").and_then(Value::as_str) {
                    None | Some("") => {
                        args["doctor_name"] = Value::String(bound.to_string());
                    }
                    Some(requested) => {
                        let target = self.directory.find(requested)?;
                        if !target.name.eq_ignore_ascii_case(bound) {
                            return Err(AppError::Forbidden(format!(
                                "You can only view data for {}",
                                bound
                            )));
                        }
                    }
                }
                Ok(args)
            }
            // Unknown names fall through; the registry rejects them.
            _ => Ok(args),
        }
    }
}
