pub mod cache;
pub mod client;
pub mod progress;
pub mod session;

pub use client::GradClient;
pub use session::{Session, SessionStore};
