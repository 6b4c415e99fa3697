//! Session-stored models for the admin.

pub mod flash;
pub mod session;

pub use flash::{Flash, FlashLevel};
pub use session::{CurrentAdmin, LastResponse, keys as session_keys};
