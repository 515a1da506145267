//! Typed access to a TaskFlow server plus the client-side state that
//! realtime events keep current.

pub mod api;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod kanban;
pub mod sse;
pub mod store;

pub use api::{Me, TaskflowClient};
pub use error::ClientError;
/// Same policy table the server enforces, for hiding controls the caller
/// cannot use.
pub use protocol::{Action, Resource, authorize};
pub use store::{Applied, LiveStore, Viewer};
