//! Intent registry: maps each intent kind to the operation that serves it

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{AiChatType, Assistant, ChatReq, ChatResp, Intent, IntentKind};
use crate::error::{AppError, AppResult};
use crate::service::approval::{self, ApprovalListRequest};
use crate::service::todo::TodoListRequest;
use crate::service::{now_unix, ApprovalService, ChatService, TodoService};
use crate::store::{default_count, default_page};
use crate::ws::ConnectionRegistry;

/// Request scope handed to intent handlers
pub struct IntentContext<'a> {
    pub user_id: &'a str,
    pub relation_id: &'a str,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

#[async_trait]
pub trait IntentHandler: Send + Sync {
    async fn handle(&self, ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp>;
}

fn mismatched(intent: &Intent) -> AppError {
    AppError::Internal(format!("intent {:?} routed to the wrong handler", intent.kind()))
}

struct TodoAdd(TodoService);

#[async_trait]
impl IntentHandler for TodoAdd {
    async fn handle(&self, ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp> {
        let req = match intent {
            Intent::TodoAdd(req) => req,
            other => return Err(mismatched(&other)),
        };
        let id = self.0.create(ctx.user_id, req).await?;
        ChatResp::new(AiChatType::TodoAdd, serde_json::json!({ "id": id }))
    }
}

struct TodoFind(TodoService);

#[async_trait]
impl IntentHandler for TodoFind {
    async fn handle(&self, ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp> {
        let args = match intent {
            Intent::TodoFind(args) => args,
            other => return Err(mismatched(&other)),
        };
        if let Some(id) = args.id.filter(|id| !id.is_empty()) {
            let info = self.0.info(&id).await?;
            return ChatResp::new(AiChatType::TodoFind, info);
        }
        let list = self
            .0
            .list(
                ctx.user_id,
                TodoListRequest {
                    start_time: args.start_time,
                    end_time: args.end_time,
                    page: default_page(),
                    count: default_count(),
                },
            )
            .await?;
        ChatResp::new(AiChatType::TodoFind, list)
    }
}

struct ApprovalAdd {
    approvals: ApprovalService,
    hub: Arc<ConnectionRegistry>,
}

#[async_trait]
impl IntentHandler for ApprovalAdd {
    async fn handle(&self, ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp> {
        let req = match intent {
            Intent::ApprovalAdd(req) => req,
            other => return Err(mismatched(&other)),
        };
        let model = self.approvals.create(ctx.user_id, req).await?;
        let (message, targets) = approval::notification(&model);
        self.hub.notify(&message, &targets).await;
        ChatResp::new(
            AiChatType::ApprovalAdd,
            serde_json::json!({ "id": model.id, "no": model.no }),
        )
    }
}

struct ApprovalFind(ApprovalService);

#[async_trait]
impl IntentHandler for ApprovalFind {
    async fn handle(&self, ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp> {
        let args = match intent {
            Intent::ApprovalFind(args) => args,
            other => return Err(mismatched(&other)),
        };
        if let Some(id) = args.id.filter(|id| !id.is_empty()) {
            let info = self.0.info(ctx.user_id, &id).await?;
            if let Some(e) = &info.error {
                tracing::warn!("Approval {} returned without names: {}", id, e);
            }
            return ChatResp::new(AiChatType::ApprovalFind, info.value);
        }
        let list = self
            .0
            .list(
                ctx.user_id,
                ApprovalListRequest {
                    list_type: args.list_type.unwrap_or(1),
                    page: default_page(),
                    count: default_count(),
                },
            )
            .await?;
        ChatResp::new(AiChatType::ApprovalFind, list)
    }
}

struct ChatLogSummary {
    chat: ChatService,
    assistant: Arc<dyn Assistant>,
}

#[async_trait]
impl IntentHandler for ChatLogSummary {
    async fn handle(&self, ctx: &IntentContext<'_>, _intent: Intent) -> AppResult<ChatResp> {
        if ctx.relation_id.is_empty() {
            return Err(AppError::Validation(
                "relationId is required to summarize a conversation".to_string(),
            ));
        }
        let transcript = self
            .chat
            .transcript(ctx.user_id, ctx.relation_id, ctx.start_time, ctx.end_time)
            .await?;
        if transcript.is_empty() {
            return ChatResp::new(AiChatType::ChatLog, "no messages in this period");
        }
        let summary = self.assistant.summarize(&transcript).await?;
        ChatResp::new(AiChatType::ChatLog, summary)
    }
}

struct Reply;

#[async_trait]
impl IntentHandler for Reply {
    async fn handle(&self, _ctx: &IntentContext<'_>, intent: Intent) -> AppResult<ChatResp> {
        let text = match intent {
            Intent::Reply(text) => text,
            other => return Err(mismatched(&other)),
        };
        Ok(ChatResp::reply(text))
    }
}

/// Built once at startup and shared by the chat endpoint
pub struct IntentRouter {
    assistant: Arc<dyn Assistant>,
    handlers: HashMap<IntentKind, Box<dyn IntentHandler>>,
}

impl IntentRouter {
    pub fn new(
        assistant: Arc<dyn Assistant>,
        todos: TodoService,
        approvals: ApprovalService,
        chat: ChatService,
        hub: Arc<ConnectionRegistry>,
    ) -> Self {
        let mut handlers: HashMap<IntentKind, Box<dyn IntentHandler>> = HashMap::new();
        handlers.insert(IntentKind::TodoAdd, Box::new(TodoAdd(todos.clone())));
        handlers.insert(IntentKind::TodoFind, Box::new(TodoFind(todos)));
        handlers.insert(
            IntentKind::ApprovalAdd,
            Box::new(ApprovalAdd {
                approvals: approvals.clone(),
                hub,
            }),
        );
        handlers.insert(IntentKind::ApprovalFind, Box::new(ApprovalFind(approvals)));
        handlers.insert(
            IntentKind::ChatLog,
            Box::new(ChatLogSummary {
                chat,
                assistant: assistant.clone(),
            }),
        );
        handlers.insert(IntentKind::Reply, Box::new(Reply));
        Self {
            assistant,
            handlers,
        }
    }

    /// Answer a chat request from `user_id`
    pub async fn dispatch(&self, user_id: &str, req: ChatReq) -> AppResult<ChatResp> {
        let intent = match req.chat_type {
            Some(AiChatType::ChatLog) => Intent::ChatLog,
            _ => {
                if req.prompts.trim().is_empty() {
                    return Err(AppError::Validation("prompts is required".to_string()));
                }
                self.assistant.classify(&req.prompts, now_unix()).await?
            }
        };

        let kind = intent.kind();
        tracing::debug!("User {} chat intent {:?}", user_id, kind);
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| AppError::Internal(format!("no handler for intent {:?}", kind)))?;

        let ctx = IntentContext {
            user_id,
            relation_id: &req.relation_id,
            start_time: req.start_time,
            end_time: req.end_time,
        };
        handler.handle(&ctx, intent).await
    }
}
