pub mod error;
pub mod identity;
pub mod routes;
pub mod state;
pub mod workflow;

pub use identity::{Identity, IDENTITY_HEADER};
pub use routes::router;
pub use state::AppState;
