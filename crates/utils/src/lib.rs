pub mod assets;
pub mod event_hub;
pub mod jwt;
pub mod response;
pub mod serde_helpers;
pub mod text;
