pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod store;

pub use booking::BookingCoordinator;
pub use lifecycle::AppointmentLifecycleService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
