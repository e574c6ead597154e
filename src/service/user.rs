//! User accounts: login, CRUD, password changes and root bootstrap

use serde::{Deserialize, Serialize};

use super::{new_id, now_unix};
use crate::entity::user::{self, UserResponse, UserStatus};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::JwtKeys;
use crate::store::{default_count, default_page, Page, Stores, UserQuery};

/// Password given to accounts created without one
pub const DEFAULT_PASSWORD: &str = "123456";

pub const ROOT_USER_NAME: &str = "root";

const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { 12 };

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Unix seconds
    #[serde(rename = "accessExpire")]
    pub access_expire: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Defaults to the caller
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "oldPwd")]
    pub old_pwd: String,
    #[serde(rename = "newPwd")]
    pub new_pwd: String,
}

#[derive(Debug, Deserialize)]
pub struct UserListRequest {
    pub name: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub count: u64,
    pub list: Vec<UserResponse>,
}

fn hash_password(password: &str) -> AppResult<String> {
    Ok(bcrypt::hash(password, BCRYPT_COST)?)
}

fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Clone)]
pub struct UserService {
    stores: Stores,
    jwt: JwtKeys,
}

impl UserService {
    pub fn new(stores: Stores, jwt: JwtKeys) -> Self {
        Self { stores, jwt }
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let user = self
            .stores
            .users
            .find_by_name(&req.name)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&req.password, &user.password) {
            tracing::info!("Login rejected for {}: wrong password", req.name);
            return Err(AppError::Unauthorized);
        }
        if user.user_status() == UserStatus::Disabled {
            return Err(AppError::Forbidden("account is disabled".to_string()));
        }

        let now = now_unix();
        let access_token = self.jwt.issue(&user.id, now)?;

        if user.user_status() == UserStatus::Inactive {
            let mut activated = user.clone();
            activated.status = UserStatus::Active.into();
            activated.update_at = now;
            self.stores.users.update(activated).await?;
        }

        tracing::info!("User {} logged in", user.name);
        Ok(LoginResponse {
            id: user.id,
            name: user.name,
            access_token,
            access_expire: now + self.jwt.expire(),
        })
    }

    pub async fn info(&self, id: &str) -> AppResult<UserResponse> {
        let user = self
            .stores
            .users
            .find(id)
            .await?
            .ok_or_not_found(format!("user {}", id))?;
        Ok(user.into())
    }

    pub async fn create(&self, req: CreateUserRequest) -> AppResult<String> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("user name is required".to_string()));
        }
        if self.stores.users.find_by_name(name).await?.is_some() {
            return Err(AppError::Validation(format!("user {} already exists", name)));
        }

        let password = if req.password.is_empty() {
            DEFAULT_PASSWORD
        } else {
            req.password.as_str()
        };

        let now = now_unix();
        let id = new_id();
        self.stores
            .users
            .insert(user::Model {
                id: id.clone(),
                name: name.to_string(),
                password: hash_password(password)?,
                status: UserStatus::Inactive.into(),
                is_system: false,
                create_at: now,
                update_at: now,
            })
            .await?;

        tracing::info!("Created user {} ({})", name, id);
        Ok(id)
    }

    pub async fn edit(&self, req: EditUserRequest) -> AppResult<()> {
        let mut user = self
            .stores
            .users
            .find(&req.id)
            .await?
            .ok_or_not_found(format!("user {}", req.id))?;

        if let Some(name) = req.name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::Validation("user name is required".to_string()));
            }
            if let Some(other) = self.stores.users.find_by_name(&name).await? {
                if other.id != user.id {
                    return Err(AppError::Validation(format!("user {} already exists", name)));
                }
            }
            user.name = name;
        }
        if let Some(status) = req.status {
            if !(0..=2).contains(&status) {
                return Err(AppError::Validation(format!("invalid user status {}", status)));
            }
            user.status = status;
        }

        user.update_at = now_unix();
        self.stores.users.update(user).await
    }

    /// System accounts cannot be deleted. Department memberships go with the user.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let Some(user) = self.stores.users.find(id).await? else {
            return Ok(());
        };
        if user.is_system {
            return Err(AppError::Forbidden("system accounts cannot be deleted".to_string()));
        }

        self.stores.members.delete_by_user(id).await?;
        self.stores.users.delete(id).await?;
        tracing::info!("Deleted user {} ({})", user.name, id);
        Ok(())
    }

    pub async fn list(&self, req: UserListRequest) -> AppResult<UserListResponse> {
        let (users, count) = self
            .stores
            .users
            .list(&UserQuery {
                name: req.name,
                page: Page::new(req.page, req.count),
            })
            .await?;
        Ok(UserListResponse {
            count,
            list: users.into_iter().map(UserResponse::from).collect(),
        })
    }

    /// Change the password of `caller`, or of another account when the caller
    /// is a system user.
    pub async fn change_password(
        &self,
        caller_id: &str,
        caller_is_system: bool,
        req: ChangePasswordRequest,
    ) -> AppResult<()> {
        let target = req.id.unwrap_or_else(|| caller_id.to_string());
        if target != caller_id && !caller_is_system {
            return Err(AppError::Forbidden(
                "cannot change another user's password".to_string(),
            ));
        }
        if req.new_pwd.is_empty() {
            return Err(AppError::Validation("new password is required".to_string()));
        }

        let mut user = self
            .stores
            .users
            .find(&target)
            .await?
            .ok_or_not_found(format!("user {}", target))?;

        if !verify_password(&req.old_pwd, &user.password) {
            return Err(AppError::Validation("old password is incorrect".to_string()));
        }

        user.password = hash_password(&req.new_pwd)?;
        user.update_at = now_unix();
        self.stores.users.update(user).await
    }

    /// Create the `root` system account if it does not exist yet
    pub async fn ensure_root(&self, password: &str) -> AppResult<()> {
        if self.stores.users.find_by_name(ROOT_USER_NAME).await?.is_some() {
            return Ok(());
        }

        let now = now_unix();
        self.stores
            .users
            .insert(user::Model {
                id: new_id(),
                name: ROOT_USER_NAME.to_string(),
                password: hash_password(password)?,
                status: UserStatus::Active.into(),
                is_system: true,
                create_at: now,
                update_at: now,
            })
            .await?;

        tracing::info!("Bootstrapped {} account", ROOT_USER_NAME);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn service() -> UserService {
        UserService::new(Stores::memory(), JwtKeys::new(&JwtConfig::default()))
    }

    #[tokio::test]
    async fn test_root_bootstrap_is_idempotent() {
        let svc = service();
        svc.ensure_root("000000").await.unwrap();
        svc.ensure_root("other").await.unwrap();

        let list = svc
            .list(UserListRequest {
                name: Some(ROOT_USER_NAME.to_string()),
                page: 1,
                count: 10,
            })
            .await
            .unwrap();
        assert_eq!(list.count, 1);
        assert!(list.list[0].is_system);

        let login = svc
            .login(LoginRequest {
                name: ROOT_USER_NAME.to_string(),
                password: "000000".to_string(),
            })
            .await
            .unwrap();
        assert!(!login.access_token.is_empty());
    }

    #[tokio::test]
    async fn test_create_uses_default_password() {
        let svc = service();
        let id = svc
            .create(CreateUserRequest {
                name: "alice".to_string(),
                password: String::new(),
            })
            .await
            .unwrap();

        let login = svc
            .login(LoginRequest {
                name: "alice".to_string(),
                password: DEFAULT_PASSWORD.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login.id, id);
        // First login activates the account
        assert_eq!(svc.info(&id).await.unwrap().status, 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let svc = service();
        let req = || CreateUserRequest {
            name: "bob".to_string(),
            password: String::new(),
        };
        svc.create(req()).await.unwrap();
        assert!(matches!(svc.create(req()).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let svc = service();
        svc.create(CreateUserRequest {
            name: "carol".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
        let result = svc
            .login(LoginRequest {
                name: "carol".to_string(),
                password: "nope".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let svc = service();
        let id = svc
            .create(CreateUserRequest {
                name: "dave".to_string(),
                password: "old".to_string(),
            })
            .await
            .unwrap();

        let bad = svc
            .change_password(
                &id,
                false,
                ChangePasswordRequest {
                    id: None,
                    old_pwd: "wrong".to_string(),
                    new_pwd: "new".to_string(),
                },
            )
            .await;
        assert!(matches!(bad, Err(AppError::Validation(_))));

        svc.change_password(
            &id,
            false,
            ChangePasswordRequest {
                id: None,
                old_pwd: "old".to_string(),
                new_pwd: "new".to_string(),
            },
        )
        .await
        .unwrap();

        svc.login(LoginRequest {
            name: "dave".to_string(),
            password: "new".to_string(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_system_account_cannot_be_deleted() {
        let svc = service();
        svc.ensure_root("000000").await.unwrap();
        let root = svc
            .stores
            .users
            .find_by_name(ROOT_USER_NAME)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(svc.delete(&root.id).await, Err(AppError::Forbidden(_))));
    }
}
