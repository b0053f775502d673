pub mod client;
pub mod session;

pub use client::{HttpPortalClient, LoginStep, PortalClient, PortalError};
pub use session::PortalSession;
