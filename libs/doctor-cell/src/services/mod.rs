pub mod availability;
pub mod schedule;

pub use availability::{
    validate_windows, AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore,
};
pub use schedule::ScheduleService;
