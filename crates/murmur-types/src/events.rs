use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Commands sent FROM client TO server over the WebSocket gateway.
/// Wire names follow the original socket event contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayCommand {
    /// Register presence for a user
    #[serde(rename_all = "camelCase")]
    Join { user_id: Uuid },

    /// Like (or unlike, when `like` is false) a post
    #[serde(rename_all = "camelCase")]
    LikePost {
        post_id: Uuid,
        user_id: Uuid,
        like: bool,
    },

    /// Send a direct message
    #[serde(rename_all = "camelCase")]
    SendNewMsg {
        user_id: Uuid,
        msg_send_to_user_id: Uuid,
        msg: String,
    },

    /// Same as SendNewMsg but acknowledged without a payload — used when the
    /// client replies straight from a notification popup
    #[serde(rename_all = "camelCase")]
    SendMsgFromNotification {
        user_id: Uuid,
        msg_send_to_user_id: Uuid,
        msg: String,
    },

    /// Hide a message for the calling user only
    #[serde(rename_all = "camelCase")]
    DeleteMsg {
        user_id: Uuid,
        messages_with: Uuid,
        message_id: Uuid,
    },

    /// Load the conversation with another user
    #[serde(rename_all = "camelCase")]
    LoadMessages {
        user_id: Uuid,
        messages_with: Uuid,
    },
}

/// A peer currently holding at least one live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: Uuid,
    pub username: String,
    pub profile_pic_url: String,
}

/// Events sent FROM server TO client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// The live-user set, excluding the receiving peer itself. Pushed on
    /// presence changes and re-emitted periodically as reconciliation.
    ConnectedUsers { users: Vec<OnlineUser> },

    /// Ack to the caller of a successful likePost
    PostLiked,

    /// Live social notification, carrying enough denormalized actor data for
    /// the client to render without a follow-up fetch
    #[serde(rename_all = "camelCase")]
    NewNotificationReceived {
        name: String,
        profile_pic_url: String,
        username: String,
        post_id: Option<Uuid>,
    },

    /// Ack to the sender: the message was persisted
    #[serde(rename_all = "camelCase")]
    MsgSent { new_msg: Message },

    /// Payload-less ack for the notification-popup send path
    MsgSentFromNotification,

    /// A message arrived while this client was connected
    #[serde(rename_all = "camelCase")]
    NewMsgReceived { new_msg: Message },

    /// Ack to the caller of a successful deleteMsg
    MsgDeleted,

    /// The conversation requested via loadMessages
    MessagesLoaded { chat: Vec<Message> },

    /// No conversation exists with the requested user
    NoChatFound,
}
