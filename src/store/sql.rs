//! SeaORM repositories

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::{
    ApprovalFilter, ApprovalQuery, ApprovalRepo, ChatlogQuery, ChatlogRepo, DepartmentRepo,
    DepartmentUserRepo, TodoQuery, TodoRepo, UserQuery, UserRepo,
};
use crate::entity::{approval, chatlog, department, department_user, id_pattern, todo, user};
use crate::error::AppResult;

pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn user_active(m: user::Model) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(m.id),
        name: Set(m.name),
        password: Set(m.password),
        status: Set(m.status),
        is_system: Set(m.is_system),
        create_at: Set(m.create_at),
        update_at: Set(m.update_at),
    }
}

fn department_active(m: department::Model) -> department::ActiveModel {
    department::ActiveModel {
        id: Set(m.id),
        name: Set(m.name),
        parent_id: Set(m.parent_id),
        parent_path: Set(m.parent_path),
        level: Set(m.level),
        leader_id: Set(m.leader_id),
        create_at: Set(m.create_at),
        update_at: Set(m.update_at),
    }
}

fn approval_active(m: approval::Model) -> approval::ActiveModel {
    approval::ActiveModel {
        id: Set(m.id),
        user_id: Set(m.user_id),
        no: Set(m.no),
        approval_type: Set(m.approval_type),
        status: Set(m.status),
        title: Set(m.title),
        summary: Set(m.summary),
        reason: Set(m.reason),
        approval_id: Set(m.approval_id),
        approval_idx: Set(m.approval_idx),
        approvers: Set(m.approvers),
        participation: Set(m.participation),
        payload: Set(m.payload),
        version: Set(m.version),
        finish_at: Set(m.finish_at),
        finish_day: Set(m.finish_day),
        finish_month: Set(m.finish_month),
        finish_year: Set(m.finish_year),
        create_at: Set(m.create_at),
        update_at: Set(m.update_at),
    }
}

fn todo_active(m: todo::Model) -> todo::ActiveModel {
    todo::ActiveModel {
        id: Set(m.id),
        creator_id: Set(m.creator_id),
        title: Set(m.title),
        deadline_at: Set(m.deadline_at),
        desc: Set(m.desc),
        records: Set(m.records),
        executes: Set(m.executes),
        executor_ids: Set(m.executor_ids),
        status: Set(m.status),
        create_at: Set(m.create_at),
        update_at: Set(m.update_at),
    }
}

#[async_trait]
impl UserRepo for SqlStore {
    async fn insert(&self, m: user::Model) -> AppResult<()> {
        user::Entity::insert(user_active(m)).exec(&self.db).await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id.to_string()).one(&self.db).await?)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.db)
            .await?)
    }

    async fn update(&self, m: user::Model) -> AppResult<()> {
        user_active(m).update(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        user::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<user::Model>, u64)> {
        let mut select = user::Entity::find();
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            select = select.filter(user::Column::Name.contains(name));
        }

        let total = select.clone().count(&self.db).await?;
        let users = select
            .order_by_asc(user::Column::Name)
            .offset(query.page.offset()?)
            .limit(query.page.limit())
            .all(&self.db)
            .await?;
        Ok((users, total))
    }
}

#[async_trait]
impl DepartmentRepo for SqlStore {
    async fn insert(&self, m: department::Model) -> AppResult<()> {
        department::Entity::insert(department_active(m))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<department::Model>> {
        Ok(department::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<department::Model>> {
        Ok(department::Entity::find()
            .filter(department::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    async fn find_many(&self, ids: &[String]) -> AppResult<Vec<department::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(department::Entity::find()
            .filter(department::Column::Id.is_in(ids.iter().cloned()))
            .all(&self.db)
            .await?)
    }

    async fn all(&self) -> AppResult<Vec<department::Model>> {
        Ok(department::Entity::find()
            .order_by_asc(department::Column::CreateAt)
            .all(&self.db)
            .await?)
    }

    async fn update(&self, m: department::Model) -> AppResult<()> {
        department_active(m).update(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        department::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DepartmentUserRepo for SqlStore {
    async fn insert_many(&self, edges: Vec<department_user::Model>) -> AppResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let rows = edges.into_iter().map(|e| department_user::ActiveModel {
            id: Set(e.id),
            dep_id: Set(e.dep_id),
            user_id: Set(e.user_id),
            create_at: Set(e.create_at),
        });
        department_user::Entity::insert_many(rows)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find_by_user(&self, user_id: &str) -> AppResult<Option<department_user::Model>> {
        Ok(department_user::Entity::find()
            .filter(department_user::Column::UserId.eq(user_id))
            .order_by_asc(department_user::Column::CreateAt)
            .one(&self.db)
            .await?)
    }

    async fn list_by_dep(&self, dep_id: &str) -> AppResult<Vec<department_user::Model>> {
        Ok(department_user::Entity::find()
            .filter(department_user::Column::DepId.eq(dep_id))
            .all(&self.db)
            .await?)
    }

    async fn delete_by_dep(&self, dep_id: &str) -> AppResult<()> {
        department_user::Entity::delete_many()
            .filter(department_user::Column::DepId.eq(dep_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> AppResult<()> {
        department_user::Entity::delete_many()
            .filter(department_user::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalRepo for SqlStore {
    async fn insert(&self, m: approval::Model) -> AppResult<()> {
        approval::Entity::insert(approval_active(m))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<approval::Model>> {
        Ok(approval::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn update_versioned(
        &self,
        m: approval::Model,
        expected_version: i64,
    ) -> AppResult<bool> {
        let id = m.id.clone();
        let result = approval::Entity::update_many()
            .set(approval_active(m))
            .filter(approval::Column::Id.eq(id))
            .filter(approval::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn list(&self, query: &ApprovalQuery) -> AppResult<(Vec<approval::Model>, u64)> {
        let select = match query.filter {
            ApprovalFilter::Submitted => {
                approval::Entity::find().filter(approval::Column::UserId.eq(query.user_id.as_str()))
            }
            ApprovalFilter::Audit => approval::Entity::find()
                .filter(approval::Column::UserId.ne(query.user_id.as_str()))
                .filter(approval::Column::Participation.contains(id_pattern(&query.user_id))),
        };

        let total = select.clone().count(&self.db).await?;
        let items = select
            .order_by_desc(approval::Column::CreateAt)
            .offset(query.page.offset()?)
            .limit(query.page.limit())
            .all(&self.db)
            .await?;
        Ok((items, total))
    }
}

#[async_trait]
impl TodoRepo for SqlStore {
    async fn insert(&self, m: todo::Model) -> AppResult<()> {
        todo::Entity::insert(todo_active(m)).exec(&self.db).await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> AppResult<Option<todo::Model>> {
        Ok(todo::Entity::find_by_id(id.to_string()).one(&self.db).await?)
    }

    async fn update(&self, m: todo::Model) -> AppResult<()> {
        todo_active(m).update(&self.db).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        todo::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list(&self, query: &TodoQuery) -> AppResult<(Vec<todo::Model>, u64)> {
        let mut select = todo::Entity::find().filter(
            Condition::any()
                .add(todo::Column::CreatorId.eq(query.user_id.as_str()))
                .add(todo::Column::ExecutorIds.contains(id_pattern(&query.user_id))),
        );
        if let Some(start) = query.start_time {
            select = select.filter(todo::Column::DeadlineAt.gte(start));
        }
        if let Some(end) = query.end_time {
            select = select.filter(todo::Column::DeadlineAt.lte(end));
        }

        let total = select.clone().count(&self.db).await?;
        let items = select
            .order_by_desc(todo::Column::CreateAt)
            .offset(query.page.offset()?)
            .limit(query.page.limit())
            .all(&self.db)
            .await?;
        Ok((items, total))
    }
}

#[async_trait]
impl ChatlogRepo for SqlStore {
    async fn insert(&self, m: chatlog::Model) -> AppResult<()> {
        let row = chatlog::ActiveModel {
            id: Set(m.id),
            conversation_id: Set(m.conversation_id),
            send_id: Set(m.send_id),
            recv_id: Set(m.recv_id),
            chat_type: Set(m.chat_type),
            msg_content: Set(m.msg_content),
            content_type: Set(m.content_type),
            send_time: Set(m.send_time),
            create_at: Set(m.create_at),
        };
        chatlog::Entity::insert(row).exec(&self.db).await?;
        Ok(())
    }

    async fn list(&self, query: &ChatlogQuery) -> AppResult<Vec<chatlog::Model>> {
        let mut select = chatlog::Entity::find()
            .filter(chatlog::Column::ConversationId.eq(query.conversation_id.as_str()));
        if let Some(start) = query.start_send_time {
            select = select.filter(chatlog::Column::SendTime.gte(start));
        }
        if let Some(end) = query.end_send_time {
            select = select.filter(chatlog::Column::SendTime.lte(end));
        }
        select = select.order_by_asc(chatlog::Column::SendTime);
        if query.limit > 0 {
            select = select.limit(query.limit);
        }
        Ok(select.all(&self.db).await?)
    }
}
