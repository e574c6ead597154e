use std::sync::Arc;

use crate::assistant::{Assistant, DisabledAssistant, IntentRouter, OpenAiAssistant};
use crate::config::Config;
use crate::middleware::JwtKeys;
use crate::service::{ApprovalService, ChatService, DepartmentService, TodoService, UserService};
use crate::store::Stores;
use crate::ws::ConnectionRegistry;

/// Business services shared by HTTP handlers and the WebSocket session
#[derive(Clone)]
pub struct Services {
    pub user: UserService,
    pub department: DepartmentService,
    pub approval: ApprovalService,
    pub todo: TodoService,
    pub chat: ChatService,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub jwt: JwtKeys,
    pub services: Services,
    /// Live WebSocket connections by user
    pub hub: Arc<ConnectionRegistry>,
    pub intents: Arc<IntentRouter>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let assistant: Arc<dyn Assistant> = if config.assistant.enabled() {
            Arc::new(OpenAiAssistant::new(&config.assistant))
        } else {
            tracing::info!("Assistant endpoint not configured, chat intents disabled");
            Arc::new(DisabledAssistant)
        };
        Self::with_assistant(config, stores, assistant)
    }

    pub fn with_assistant(config: Config, stores: Stores, assistant: Arc<dyn Assistant>) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        let services = Services {
            user: UserService::new(stores.clone(), jwt.clone()),
            department: DepartmentService::new(stores.clone()),
            approval: ApprovalService::new(stores.clone(), config.approval.refuse_policy),
            todo: TodoService::new(stores.clone()),
            chat: ChatService::new(stores.clone()),
        };
        let hub = Arc::new(ConnectionRegistry::new());
        let intents = Arc::new(IntentRouter::new(
            assistant,
            services.todo.clone(),
            services.approval.clone(),
            services.chat.clone(),
            hub.clone(),
        ));

        Self {
            config: Arc::new(config),
            stores,
            jwt,
            services,
            hub,
            intents,
        }
    }
}
