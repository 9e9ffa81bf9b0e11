//! Membership model -> entity mapper

use convo_core::entities::{MemberRole, Membership};
use convo_core::value_objects::Snowflake;

use crate::models::MembershipModel;

impl From<MembershipModel> for Membership {
    fn from(model: MembershipModel) -> Self {
        Membership {
            conversation_id: Snowflake::new(model.conversation_id),
            user_id: Snowflake::new(model.user_id),
            role: MemberRole::from_db(&model.role),
            joined_at: model.joined_at,
            last_read_at: model.last_read_at,
            is_muted: model.is_muted,
            is_pinned: model.is_pinned,
        }
    }
}
