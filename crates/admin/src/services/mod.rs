//! Business logic shared by the admin pages and the CLI.
//!
//! # Services
//!
//! - [`images`] - Profile image upload, replacement, and cleanup
//! - [`backup`] - JSON export and restore of personas and phishing cases
//! - [`listing`] - Search, pagination, and grouping for list pages

pub mod backup;
pub mod images;
pub mod listing;

pub use backup::{BackupError, RestoreReport};
pub use images::{ImageChange, PreparedImage, UploadedFile};
pub use listing::{CaseGroup, MessageOrder, Page};
