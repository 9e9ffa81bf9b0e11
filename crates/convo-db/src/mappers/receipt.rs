//! Read receipt model -> entity mapper

use convo_core::entities::ReadReceipt;
use convo_core::value_objects::Snowflake;

use crate::models::ReadReceiptModel;

impl From<ReadReceiptModel> for ReadReceipt {
    fn from(model: ReadReceiptModel) -> Self {
        ReadReceipt {
            message_id: Snowflake::new(model.message_id),
            user_id: Snowflake::new(model.user_id),
            delivered_at: model.delivered_at,
            read_at: model.read_at,
        }
    }
}
