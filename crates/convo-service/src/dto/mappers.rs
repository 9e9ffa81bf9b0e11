//! Entity to view mappers

use convo_core::entities::{Membership, Message, Profile};

use super::views::{MemberView, MessageSummary, ProfileView};

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name.clone(),
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
            username: profile.username,
            avatar_url: profile.avatar_url,
        }
    }
}

impl From<&Message> for MessageSummary {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type,
            created_at: message.created_at,
        }
    }
}

impl MemberView {
    pub fn new(membership: &Membership, profile: Option<&Profile>) -> Self {
        Self {
            user_id: membership.user_id,
            role: membership.role,
            joined_at: membership.joined_at,
            last_read_at: membership.last_read_at,
            is_muted: membership.is_muted,
            is_pinned: membership.is_pinned,
            profile: profile.map(ProfileView::from),
        }
    }
}
