pub mod handlers;
pub mod router;
pub mod services;

pub use services::directory::{
    DirectoryError, InMemoryUserDirectory, SupabaseUserDirectory, UserDirectory,
};
pub use router::{auth_routes, AuthState};
