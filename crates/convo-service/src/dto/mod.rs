//! Data transfer objects for engine requests and results
//!
//! This module provides:
//! - Request DTOs with validation for engine inputs
//! - View DTOs returned by the loaders
//! - Mappers for converting domain entities to views

pub mod mappers;
pub mod requests;
pub mod views;

pub use requests::{
    CreateGroupRequest, ReactionRequest, SendMessageRequest, UpdateConversationRequest,
    UploadRequest,
};

pub use views::{
    ConversationView, MemberView, MessageSummary, MessageView, ProfileView, TypingView,
    UploadResult,
};
