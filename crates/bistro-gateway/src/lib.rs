pub mod router;
pub mod server;
pub mod state;

mod admin;
mod response;
mod routes;
mod shutdown;

pub use router::build_router;
pub use server::GatewayServer;
pub use state::{AppState, SharedState};
