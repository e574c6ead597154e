//! Chat messages: conversation ids, persistence and history

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{new_id, now_unix};
use crate::entity::chatlog::{self, ChatType, GROUP_CONVERSATION_ID};
use crate::error::{AppError, AppResult};
use crate::store::{ChatlogQuery, Stores};

const CONVERSATION_ID_LEN: usize = 22;

/// Default history window when none is given
const DEFAULT_HISTORY_SECS: i64 = 24 * 3600;

/// Stable id of the 1:1 conversation between two users, independent of order
pub fn conversation_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    let encoded = STANDARD_NO_PAD.encode(hasher.finalize());
    encoded[..CONVERSATION_ID_LEN].to_string()
}

/// Chat frame exchanged over the WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "conversationId", default)]
    pub conversation_id: String,
    #[serde(rename = "recvId", default)]
    pub recv_id: String,
    #[serde(rename = "sendId", default)]
    pub send_id: String,
    #[serde(rename = "chatType")]
    pub chat_type: ChatType,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "contentType", default)]
    pub content_type: i32,
}

/// Who receives a persisted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Broadcast,
    To(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct ChatLogRequest {
    /// Conversation to read; `all` for the group chat
    #[serde(rename = "conversationId")]
    pub conversation_id: Option<String>,
    /// Peer of a 1:1 conversation, used when no conversation id is given
    #[serde(rename = "recvId")]
    pub recv_id: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: Option<i64>,
    #[serde(rename = "endTime")]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub limit: u64,
}

#[derive(Clone)]
pub struct ChatService {
    stores: Stores,
}

impl ChatService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Persist a frame from `sender` and decide where it goes.
    ///
    /// `send_id` is always replaced with the sender; the conversation id is
    /// filled in when missing.
    pub async fn record(&self, sender: &str, msg: &mut ChatMessage) -> AppResult<Delivery> {
        msg.send_id = sender.to_string();

        let delivery = match msg.chat_type {
            ChatType::Group => {
                msg.conversation_id = GROUP_CONVERSATION_ID.to_string();
                Delivery::Broadcast
            }
            ChatType::Single => {
                if msg.recv_id.is_empty() {
                    return Err(AppError::Validation("recvId is required".to_string()));
                }
                if msg.conversation_id.is_empty() {
                    msg.conversation_id = conversation_id(sender, &msg.recv_id);
                }
                Delivery::To(vec![msg.recv_id.clone()])
            }
        };

        let now = now_unix();
        self.stores
            .chatlogs
            .insert(chatlog::Model {
                id: new_id(),
                conversation_id: msg.conversation_id.clone(),
                send_id: msg.send_id.clone(),
                recv_id: msg.recv_id.clone(),
                chat_type: msg.chat_type,
                msg_content: msg.content.clone(),
                content_type: msg.content_type,
                send_time: now,
                create_at: now,
            })
            .await?;

        Ok(delivery)
    }

    /// Messages of a conversation the caller takes part in, oldest first
    pub async fn history(&self, caller: &str, req: ChatLogRequest) -> AppResult<Vec<chatlog::Model>> {
        let conversation = match (req.conversation_id, req.recv_id) {
            (Some(id), _) if !id.is_empty() => id,
            (_, Some(peer)) if !peer.is_empty() => conversation_id(caller, &peer),
            _ => {
                return Err(AppError::Validation(
                    "conversationId or recvId is required".to_string(),
                ))
            }
        };

        let logs = self
            .stores
            .chatlogs
            .list(&ChatlogQuery {
                conversation_id: conversation.clone(),
                start_send_time: req.start_time,
                end_send_time: req.end_time,
                limit: req.limit,
            })
            .await?;

        Ok(visible_to(caller, &conversation, logs))
    }

    /// Transcript of a conversation, one `name(id): content` line per message,
    /// holding only what the caller may read. Defaults to the last day.
    pub async fn transcript(
        &self,
        caller: &str,
        conversation: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
    ) -> AppResult<String> {
        let now = now_unix();
        let logs = self
            .stores
            .chatlogs
            .list(&ChatlogQuery {
                conversation_id: conversation.to_string(),
                start_send_time: Some(start_time.unwrap_or(now - DEFAULT_HISTORY_SECS)),
                end_send_time: Some(end_time.unwrap_or(now)),
                limit: 0,
            })
            .await?;
        let logs = visible_to(caller, conversation, logs);

        let mut sender_ids: Vec<String> = logs.iter().map(|l| l.send_id.clone()).collect();
        sender_ids.sort();
        sender_ids.dedup();
        let users = self.stores.users.find_many(&sender_ids).await?;

        let mut out = String::new();
        for log in &logs {
            let name = users
                .iter()
                .find(|u| u.id == log.send_id)
                .map(|u| u.name.as_str())
                .unwrap_or_default();
            out.push_str(&format!("{}({}): {}\n", name, log.send_id, log.msg_content));
        }
        Ok(out)
    }
}

/// The group conversation is open to everyone; any other only to its two ends
fn visible_to(caller: &str, conversation: &str, logs: Vec<chatlog::Model>) -> Vec<chatlog::Model> {
    if conversation == GROUP_CONVERSATION_ID {
        return logs;
    }
    logs.into_iter()
        .filter(|l| l.send_id == caller || l.recv_id == caller)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(recv: &str, content: &str) -> ChatMessage {
        ChatMessage {
            conversation_id: String::new(),
            recv_id: recv.to_string(),
            send_id: "spoofed".to_string(),
            chat_type: ChatType::Single,
            content: content.to_string(),
            content_type: 1,
        }
    }

    #[test]
    fn test_conversation_id_is_order_independent() {
        let ab = conversation_id("alice", "bob");
        assert_eq!(ab, conversation_id("bob", "alice"));
        assert_eq!(ab.len(), CONVERSATION_ID_LEN);
        assert_ne!(ab, conversation_id("alice", "carol"));
    }

    #[test]
    fn test_frame_json_shape() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"recvId":"b","chatType":2,"content":"hi","contentType":1}"#,
        )
        .unwrap();
        assert_eq!(msg.chat_type, ChatType::Single);
        assert!(msg.conversation_id.is_empty());

        let bad = serde_json::from_str::<ChatMessage>(r#"{"chatType":9}"#);
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_single_message_is_recorded_under_pair_id() {
        let svc = ChatService::new(Stores::memory());
        let mut msg = single("bob", "hello");
        let delivery = svc.record("alice", &mut msg).await.unwrap();

        assert_eq!(delivery, Delivery::To(vec!["bob".to_string()]));
        assert_eq!(msg.send_id, "alice");
        assert_eq!(msg.conversation_id, conversation_id("alice", "bob"));

        let history = svc
            .history(
                "bob",
                ChatLogRequest {
                    conversation_id: None,
                    recv_id: Some("alice".to_string()),
                    start_time: None,
                    end_time: None,
                    limit: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].msg_content, "hello");
    }

    #[tokio::test]
    async fn test_group_message_goes_to_all() {
        let svc = ChatService::new(Stores::memory());
        let mut msg = single("", "morning");
        msg.chat_type = ChatType::Group;
        msg.conversation_id = "custom".to_string();

        let delivery = svc.record("alice", &mut msg).await.unwrap();
        assert_eq!(delivery, Delivery::Broadcast);
        assert_eq!(msg.conversation_id, GROUP_CONVERSATION_ID);
    }

    #[tokio::test]
    async fn test_single_message_requires_receiver() {
        let svc = ChatService::new(Stores::memory());
        let mut msg = single("", "lost");
        assert!(matches!(
            svc.record("alice", &mut msg).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_transcript_lines() {
        let svc = ChatService::new(Stores::memory());
        let mut msg = single("bob", "status?");
        svc.record("alice", &mut msg).await.unwrap();

        let text = svc
            .transcript("bob", &msg.conversation_id, None, None)
            .await
            .unwrap();
        assert_eq!(text, "(alice): status?\n");
    }

    #[tokio::test]
    async fn test_transcript_hides_other_pairs() {
        let svc = ChatService::new(Stores::memory());
        let mut msg = single("bob", "private");
        svc.record("alice", &mut msg).await.unwrap();
        let mut group = ChatMessage {
            chat_type: ChatType::Group,
            ..single("", "public")
        };
        svc.record("alice", &mut group).await.unwrap();

        let text = svc
            .transcript("carol", &msg.conversation_id, None, None)
            .await
            .unwrap();
        assert!(text.is_empty());

        let text = svc
            .transcript("carol", GROUP_CONVERSATION_ID, None, None)
            .await
            .unwrap();
        assert_eq!(text, "(alice): public\n");
    }
}
