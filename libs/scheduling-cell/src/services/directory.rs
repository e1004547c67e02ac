use std::sync::RwLock;

use uuid::Uuid;

use crate::models::{Doctor, SchedulingError};

/// In-memory doctor reference data. Read-mostly; never mutated by chat turns.
pub struct DoctorDirectory {
    doctors: RwLock<Vec<Doctor>>,
}

const SEED_DOCTORS: &[&str] = &[
    "Dr. Ahuja",
    "Dr. Mehta",
    "Dr. Sharma",
    "Dr. Roy",
    "Dr. Joy",
    "Dr. Joshi",
];

impl DoctorDirectory {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors),
        }
    }

    pub fn seeded() -> Self {
        Self::new(
            SEED_DOCTORS
                .iter()
                .map(|name| Doctor::new(name, "General Physician"))
                .collect(),
        )
    }

    /// Case-insensitive substring match, so "Sharma" finds "Dr. Sharma".
    /// Unknown names are a hard error, never a fallback to a default doctor.
    pub fn find(&self, name: &str) -> Result<Doctor, SchedulingError> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Err(SchedulingError::UnknownDoctor(name.to_string()));
        }

        self.doctors
            .read()
            .expect("doctor directory lock poisoned")
            .iter()
            .find(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
            .ok_or_else(|| SchedulingError::UnknownDoctor(name.trim().to_string()))
    }

    pub fn get(&self, id: Uuid) -> Option<Doctor> {
        self.doctors
            .read()
            .expect("doctor directory lock poisoned")
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Doctor> {
        self.doctors
            .read()
            .expect("doctor directory lock poisoned")
            .clone()
    }

    pub fn bind_webhook(&self, name: &str, url: &str) -> Result<(), SchedulingError> {
        let needle = name.trim().to_lowercase();
        let mut doctors = self.doctors.write().expect("doctor directory lock poisoned");
        let doctor = doctors
            .iter_mut()
            .find(|d| d.name.to_lowercase().contains(&needle))
            .ok_or_else(|| SchedulingError::UnknownDoctor(name.to_string()))?;
        doctor.notify_webhook = Some(url.to_string());
        Ok(())
    }
}
