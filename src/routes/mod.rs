use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;
use crate::ws;

pub mod health;

/// Envelope of every HTTP response; `code` is 200 on success
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            msg: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }

    /// An error that still carries whatever data could be produced
    pub fn partial(code: u16, msg: impl Into<String>, data: T) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            code: 200,
            msg: "success".to_string(),
            data: None,
        }
    }
}

/// Id of a newly created resource
#[derive(Debug, Serialize)]
pub struct IdResp {
    pub id: String,
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // User routes
        .route("/user/login", post(handlers::user::login))
        .route(
            "/user",
            post(handlers::user::create_user).put(handlers::user::edit_user),
        )
        .route("/user/list", get(handlers::user::list_users))
        .route("/user/password", post(handlers::user::change_password))
        .route(
            "/user/:id",
            get(handlers::user::user_info).delete(handlers::user::delete_user),
        )
        // Department routes
        .route(
            "/dep",
            post(handlers::department::create_department)
                .put(handlers::department::edit_department),
        )
        .route("/dep/soa", get(handlers::department::department_soa))
        .route("/dep/user", post(handlers::department::set_department_users))
        .route("/dep/user/:id", get(handlers::department::department_users))
        .route(
            "/dep/:id",
            get(handlers::department::department_info)
                .delete(handlers::department::delete_department),
        )
        // Todo routes
        .route(
            "/todo",
            post(handlers::todo::create_todo).put(handlers::todo::edit_todo),
        )
        .route("/todo/finish", post(handlers::todo::finish_todo))
        .route("/todo/record", post(handlers::todo::create_record))
        .route("/todo/list", get(handlers::todo::list_todos))
        .route(
            "/todo/:id",
            get(handlers::todo::todo_info).delete(handlers::todo::delete_todo),
        )
        // Approval routes
        .route("/approval", post(handlers::approval::create_approval))
        .route("/approval/dispose", post(handlers::approval::dispose_approval))
        .route("/approval/list", get(handlers::approval::list_approvals))
        .route("/approval/:id", get(handlers::approval::approval_info))
        // Assistant and chat history
        .route("/chat", post(handlers::chat::assistant_chat))
        .route("/chat/log", get(handlers::chat::chat_log));

    Router::new()
        .nest("/v1", api_routes)
        .route("/health", get(health::health_check))
        .route("/ws", get(ws::serve_ws))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(404, "Not Found")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::service::user::ROOT_USER_NAME;
    use crate::store::Stores;

    const ROOT_PASSWORD: &str = "root-pass";

    async fn app() -> (Router, AppState) {
        let state = AppState::new(Config::default(), Stores::memory());
        state
            .services
            .user
            .ensure_root(ROOT_PASSWORD)
            .await
            .unwrap();
        (create_router(state.clone()), state)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(app: &Router, name: &str, password: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/v1/user/login",
            None,
            Some(json!({"name": name, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, _) = app().await;
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (app, _) = app().await;
        let (status, body) = call(&app, Method::GET, "/v1/user/list", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);

        let (status, _) =
            call(&app, Method::GET, "/v1/user/list", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let (app, _) = app().await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/user/login",
            None,
            Some(json!({"name": ROOT_USER_NAME, "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_admin_requires_system_account() {
        let (app, _) = app().await;
        let (root, _) = login(&app, ROOT_USER_NAME, ROOT_PASSWORD).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/user",
            Some(&root),
            Some(json!({"name": "alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["id"].is_string());

        let (alice, _) = login(&app, "alice", "123456").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/user",
            Some(&alice),
            Some(json!({"name": "mallory"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            call(&app, Method::GET, "/v1/user/list?name=ali", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);
    }

    #[tokio::test]
    async fn test_approval_flow_over_http() {
        let (app, state) = app().await;
        let (root, root_id) = login(&app, ROOT_USER_NAME, ROOT_PASSWORD).await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/v1/user",
            Some(&root),
            Some(json!({"name": "bob"})),
        )
        .await;
        let bob_id = body["data"]["id"].as_str().unwrap().to_string();

        // root leads the department bob belongs to
        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/dep",
            Some(&root),
            Some(json!({"name": "hq", "leaderId": root_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let dep_id = body["data"]["id"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/dep/user",
            Some(&root),
            Some(json!({"depId": dep_id, "userIds": [root_id, bob_id]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (bob, _) = login(&app, "bob", "123456").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/approval",
            Some(&bob),
            Some(json!({"type": "general", "reason": "new laptop"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let approval_id = body["data"]["id"].as_str().unwrap().to_string();

        // bob cannot approve his own request
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/approval/dispose",
            Some(&bob),
            Some(json!({"approvalId": approval_id, "status": "pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/approval/dispose",
            Some(&root),
            Some(json!({"approvalId": approval_id, "status": "pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/v1/approval/{}", approval_id),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("pass"));
        assert_eq!(body["data"]["user"]["userName"], "bob");

        call(
            &app,
            Method::POST,
            "/v1/user",
            Some(&root),
            Some(json!({"name": "carol"})),
        )
        .await;
        let (carol, _) = login(&app, "carol", "123456").await;
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/v1/approval/{}", approval_id),
            Some(&carol),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/approval/dispose",
            Some(&root),
            Some(json!({"approvalId": approval_id, "status": "pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) =
            call(&app, Method::GET, "/v1/approval/list?type=1", Some(&bob), None).await;
        assert_eq!(body["data"]["count"], 1);
        assert!(state.hub.len().await == 0);
    }

    #[tokio::test]
    async fn test_todo_routes() {
        let (app, _) = app().await;
        let (root, _) = login(&app, ROOT_USER_NAME, ROOT_PASSWORD).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/todo",
            Some(&root),
            Some(json!({"title": "ship it", "deadlineAt": 4102444800i64})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let todo_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/todo/finish",
            Some(&root),
            Some(json!({"todoId": todo_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (_, body) = call(
            &app,
            Method::GET,
            &format!("/v1/todo/{}", todo_id),
            Some(&root),
            None,
        )
        .await;
        assert_eq!(body["data"]["creatorName"], ROOT_USER_NAME);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/v1/todo/{}", todo_id),
            Some(&root),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/v1/todo/{}", todo_id),
            Some(&root),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assistant_disabled_without_endpoint() {
        let (app, _) = app().await;
        let (root, _) = login(&app, ROOT_USER_NAME, ROOT_PASSWORD).await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/chat",
            Some(&root),
            Some(json!({"prompts": "add a todo"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app().await;
        let (root, _) = login(&app, ROOT_USER_NAME, ROOT_PASSWORD).await;
        let (status, _) = call(&app, Method::GET, "/v1/nothing", Some(&root), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
