//! Core types for Mung.
//!
//! This module provides type-safe wrappers and the backend's JSON entities.

pub mod conversation;
pub mod email;
pub mod id;
pub mod persona;
pub mod phishing;
pub mod storage;
pub mod user;

pub use conversation::{
    Conversation, ConversationUser, CreatedConversation, Message, SendMessageResponse, SenderType,
    format_kst,
};
pub use email::{Email, EmailError};
pub use id::*;
pub use persona::{Persona, PersonaInput, parse_conversation_starters};
pub use phishing::{ImageAnalysis, PhishingCase, PhishingCaseInput, PhishingCategory, RiskLevel};
pub use storage::{PresignedDownload, PresignedUpload};
pub use user::{User, UserUpdate};
