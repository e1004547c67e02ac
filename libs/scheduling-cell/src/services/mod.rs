pub mod availability;
pub mod booking;
pub mod directory;
pub mod stats;

pub use availability::AvailabilityService;
pub use booking::{BookingService, ScheduleStore};
pub use directory::DoctorDirectory;
pub use stats::StatsService;
