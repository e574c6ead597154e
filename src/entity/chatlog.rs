//! Chatlog entity - append-only chat messages
//!
//! Table: oa_chatlog

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conversation id shared by every group message
pub const GROUP_CONVERSATION_ID: &str = "all";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ChatType {
    #[sea_orm(num_value = 1)]
    Group,
    #[sea_orm(num_value = 2)]
    Single,
}

impl Serialize for ChatType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ChatType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        ChatType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown chat type {}", code)))
    }
}

impl ChatType {
    pub fn code(&self) -> i32 {
        match self {
            ChatType::Group => 1,
            ChatType::Single => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ChatType::Group),
            2 => Some(ChatType::Single),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oa_chatlog")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[serde(rename = "conversationId")]
    pub conversation_id: String,

    #[serde(rename = "sendId")]
    pub send_id: String,

    #[serde(rename = "recvId")]
    pub recv_id: String,

    #[serde(rename = "chatType")]
    pub chat_type: ChatType,

    #[sea_orm(column_type = "Text")]
    #[serde(rename = "content")]
    pub msg_content: String,

    #[serde(rename = "contentType")]
    pub content_type: i32,

    #[serde(rename = "sendTime")]
    pub send_time: i64,

    #[serde(rename = "createAt")]
    pub create_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
