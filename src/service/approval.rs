//! Approval workflow
//!
//! An approval walks an ordered approver chain derived from the submitter's
//! department: the department leader first, then the leaders of the
//! ancestor departments, nearest parent first. `approval_idx` points at the
//! approver that acts next and `approval_id` mirrors that approver's user id.
//!
//! Status transitions:
//!
//! ```text
//! Processed --pass (not last)--> Processed (cursor advances)
//! Processed --pass (last)------> Pass
//! Processed --refuse-----------> Refuse   (RecordRefuse policy)
//! any       --cancel-----------> Cancel   (submitter only)
//! ```
//!
//! Under the `Legacy` refuse policy a refusal is recorded as a pass of the
//! current approver without advancing the cursor.

use chrono::{DateTime, Datelike, Local, TimeZone};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{dept_tree, new_id, now_unix, Partial};
use crate::entity::approval::{
    self, ApprovalListItem, ApprovalPayload, ApprovalStatus, ApprovalType, Approver, Approvers,
};
use crate::entity::encode_ids;
use crate::error::{AppError, AppResult, OptionExt};
use crate::store::{
    default_count, default_page, ApprovalFilter, ApprovalQuery, Page, Stores,
};

/// Width of the display tracking number
const TRACKING_NO_WIDTH: usize = 11;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a refusal is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusePolicy {
    /// The approver is marked as passed and the chain is re-scanned; a
    /// refusal by the last approver completes the approval as passed.
    Legacy,
    /// The approver is marked as refused and the approval ends as refused.
    RecordRefuse,
}

pub const DEFAULT_REFUSE_POLICY: RefusePolicy = RefusePolicy::Legacy;

impl Default for RefusePolicy {
    fn default() -> Self {
        DEFAULT_REFUSE_POLICY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pass,
    Refuse,
    Cancel,
}

#[derive(Debug, Deserialize)]
pub struct CreateApprovalRequest {
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub payload: Option<ApprovalPayload>,
}

#[derive(Debug, Deserialize)]
pub struct DisposeRequest {
    #[serde(rename = "approvalId")]
    pub approval_id: String,
    pub status: Decision,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalListRequest {
    /// 1 = submitted by me, 2 = awaiting my audit
    #[serde(rename = "type", default = "default_list_type")]
    pub list_type: u8,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count: u64,
}

fn default_list_type() -> u8 {
    1
}

#[derive(Debug, Serialize)]
pub struct ApprovalListResponse {
    pub count: u64,
    pub list: Vec<ApprovalListItem>,
}

/// Approval detail with display names joined in
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalInfo {
    pub id: String,
    pub no: String,
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    pub status: ApprovalStatus,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub reason: String,
    pub payload: Option<ApprovalPayload>,
    /// Submitter
    pub user: Approver,
    /// Approver that acts next
    pub approver: Approver,
    pub approvers: Vec<Approver>,
    #[serde(rename = "approvalIdx")]
    pub approval_idx: i32,
    #[serde(rename = "finishAt")]
    pub finish_at: i64,
    #[serde(rename = "finishDay")]
    pub finish_day: i64,
    #[serde(rename = "finishMonth")]
    pub finish_month: i64,
    #[serde(rename = "finishYear")]
    pub finish_year: i64,
    #[serde(rename = "createAt")]
    pub create_at: i64,
    #[serde(rename = "updateAt")]
    pub update_at: i64,
}

impl From<approval::Model> for ApprovalInfo {
    fn from(m: approval::Model) -> Self {
        let approver = m
            .current_approver()
            .cloned()
            .unwrap_or_else(|| Approver::new(m.approval_id.clone(), m.status));
        Self {
            user: Approver::new(m.user_id.clone(), m.status),
            approver,
            id: m.id,
            no: m.no,
            approval_type: m.approval_type,
            status: m.status,
            title: m.title,
            summary: m.summary,
            reason: m.reason,
            payload: m.payload,
            approvers: m.approvers.0,
            approval_idx: m.approval_idx,
            finish_at: m.finish_at,
            finish_day: m.finish_day,
            finish_month: m.finish_month,
            finish_year: m.finish_year,
            create_at: m.create_at,
            update_at: m.update_at,
        }
    }
}

/// Random decimal display number; collisions are tolerated
pub fn tracking_no() -> String {
    let mut rng = rand::rng();
    (0..TRACKING_NO_WIDTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn format_time(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(t) => t.format(TIME_FORMAT).to_string(),
        None => ts.to_string(),
    }
}

/// Check the payload against the type and derive (abstract, reason)
fn describe(req: &CreateApprovalRequest) -> AppResult<(String, String)> {
    let expects_payload = matches!(
        req.approval_type,
        ApprovalType::Leave | ApprovalType::GoOut | ApprovalType::MakeCard
    );

    match (&req.payload, expects_payload) {
        (None, false) => Ok((req.reason.clone(), req.reason.clone())),
        (None, true) => Err(AppError::Validation(format!(
            "{} requires a payload",
            req.approval_type.label()
        ))),
        (Some(payload), _) if payload.approval_type() != req.approval_type => {
            Err(AppError::Validation(format!(
                "payload does not match {}",
                req.approval_type.label()
            )))
        }
        (Some(ApprovalPayload::Leave(leave)), _) => {
            if leave.end_time < leave.start_time {
                return Err(AppError::Validation("leave ends before it starts".to_string()));
            }
            let summary = format!(
                "[{}]: [{}]-[{}]",
                leave.leave_type.label(),
                format_time(leave.start_time),
                format_time(leave.end_time)
            );
            Ok((summary, leave.reason.clone()))
        }
        (Some(ApprovalPayload::GoOut(go_out)), _) => {
            if go_out.end_time < go_out.start_time {
                return Err(AppError::Validation("go-out ends before it starts".to_string()));
            }
            let summary = format!(
                "[{}]-[{}]",
                format_time(go_out.start_time),
                format_time(go_out.end_time)
            );
            Ok((summary, go_out.reason.clone()))
        }
        (Some(ApprovalPayload::MakeCard(card)), _) => {
            let summary = format!("[{}][{}]", format_time(card.date), card.reason);
            Ok((summary, card.reason.clone()))
        }
    }
}

/// Build the approver chain and participation list.
///
/// `ancestors` are the ancestor departments that could be resolved, keyed
/// by id; `parent_path` orders them.
pub fn build_chain(
    leader_id: &str,
    submitter_id: &str,
    parent_path: &str,
    ancestors: &HashMap<String, String>,
) -> (Vec<Approver>, Vec<String>) {
    let mut approvers = vec![Approver::new(leader_id, ApprovalStatus::Processed)];
    let mut participation = vec![leader_id.to_string(), submitter_id.to_string()];

    for dep_id in dept_tree::ancestor_chain(parent_path).iter().rev() {
        let Some(ancestor_leader) = ancestors.get(dep_id) else {
            continue;
        };
        if ancestor_leader.is_empty() {
            continue;
        }
        approvers.push(Approver::new(ancestor_leader.clone(), ApprovalStatus::NotStarted));
        participation.push(ancestor_leader.clone());
    }

    (approvers, participation)
}

fn stamp_finish(approval: &mut approval::Model, now: DateTime<Local>) {
    let (year, month, day) = (now.year() as i64, now.month() as i64, now.day() as i64);
    approval.finish_at = now.timestamp();
    approval.finish_year = year;
    approval.finish_month = year * 100 + month;
    approval.finish_day = (year * 100 + month) * 100 + day;
}

/// Apply a decision to an approval in place
pub fn apply_decision(
    approval: &mut approval::Model,
    actor: &str,
    decision: Decision,
    reason: &str,
    policy: RefusePolicy,
    now: DateTime<Local>,
) -> AppResult<()> {
    if decision == Decision::Cancel {
        if actor != approval.user_id {
            return Err(AppError::Forbidden(
                "only the submitter can cancel an approval".to_string(),
            ));
        }
        // A finished approval stays finished; repeating a cancel is allowed
        match approval.status {
            ApprovalStatus::Pass => {
                return Err(AppError::State("approval has already passed".to_string()))
            }
            ApprovalStatus::Refuse => {
                return Err(AppError::State("approval has already been refused".to_string()))
            }
            _ => {}
        }
        approval.status = ApprovalStatus::Cancel;
        stamp_finish(approval, now);
        return Ok(());
    }

    if actor != approval.approval_id {
        return Err(AppError::Forbidden(
            "you are not the current approver".to_string(),
        ));
    }
    match approval.status {
        ApprovalStatus::Cancel => {
            return Err(AppError::State("approval has been cancelled".to_string()))
        }
        ApprovalStatus::Pass => {
            return Err(AppError::State("approval has already passed".to_string()))
        }
        ApprovalStatus::Refuse => {
            return Err(AppError::State("approval has already been refused".to_string()))
        }
        _ => {}
    }

    let idx = usize::try_from(approval.approval_idx)
        .ok()
        .filter(|i| *i < approval.approvers.0.len())
        .ok_or_else(|| {
            AppError::Internal(format!(
                "approval {} cursor {} is out of range",
                approval.id, approval.approval_idx
            ))
        })?;

    let current = &mut approval.approvers.0[idx];
    current.reason = reason.to_string();

    if decision == Decision::Refuse && policy == RefusePolicy::RecordRefuse {
        current.status = ApprovalStatus::Refuse;
        approval.status = ApprovalStatus::Refuse;
        stamp_finish(approval, now);
        return Ok(());
    }

    current.status = ApprovalStatus::Pass;

    if decision == Decision::Pass && idx + 1 < approval.approvers.0.len() {
        let next = &mut approval.approvers.0[idx + 1];
        next.status = ApprovalStatus::Processed;
        approval.approval_id = next.user_id.clone();
        approval.approval_idx = (idx + 1) as i32;
        return Ok(());
    }

    if approval
        .approvers
        .0
        .iter()
        .all(|a| a.status == ApprovalStatus::Pass)
    {
        approval.status = ApprovalStatus::Pass;
        stamp_finish(approval, now);
    }
    Ok(())
}

/// Message pushed to users affected by an approval change, with its recipients
pub fn notification(approval: &approval::Model) -> (String, Vec<String>) {
    let targets = if approval.status.is_terminal() {
        vec![approval.user_id.clone()]
    } else {
        vec![approval.approval_id.clone()]
    };
    let message = serde_json::json!({
        "type": "approval",
        "approvalId": approval.id,
        "title": approval.title,
        "status": approval.status,
    })
    .to_string();
    (message, targets)
}

#[derive(Clone)]
pub struct ApprovalService {
    stores: Stores,
    policy: RefusePolicy,
}

impl ApprovalService {
    pub fn new(stores: Stores, policy: RefusePolicy) -> Self {
        Self { stores, policy }
    }

    pub async fn create(
        &self,
        submitter_id: &str,
        req: CreateApprovalRequest,
    ) -> AppResult<approval::Model> {
        let (summary, reason) = describe(&req)?;

        let submitter = self
            .stores
            .users
            .find(submitter_id)
            .await?
            .ok_or_not_found(format!("user {}", submitter_id))?;

        let membership = self
            .stores
            .members
            .find_by_user(submitter_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("{} does not belong to a department", submitter.name))
            })?;
        let dep = self
            .stores
            .departments
            .find(&membership.dep_id)
            .await?
            .ok_or_not_found(format!("department {}", membership.dep_id))?;
        if dep.leader_id.is_empty() {
            return Err(AppError::Validation(format!(
                "department {} has no leader",
                dep.name
            )));
        }

        let ancestor_ids = dept_tree::ancestor_chain(&dep.parent_path);
        let ancestors: HashMap<String, String> = self
            .stores
            .departments
            .find_many(&ancestor_ids)
            .await?
            .into_iter()
            .map(|d| (d.id, d.leader_id))
            .collect();

        let (approvers, participation) =
            build_chain(&dep.leader_id, submitter_id, &dep.parent_path, &ancestors);

        let now = now_unix();
        let model = approval::Model {
            id: new_id(),
            user_id: submitter_id.to_string(),
            no: tracking_no(),
            approval_type: req.approval_type,
            status: ApprovalStatus::Processed,
            title: format!("{} submitted {}", submitter.name, req.approval_type.label()),
            summary,
            reason,
            approval_id: dep.leader_id.clone(),
            approval_idx: 0,
            approvers: Approvers(approvers),
            participation: encode_ids(&participation),
            payload: req.payload,
            version: 0,
            finish_at: 0,
            finish_day: 0,
            finish_month: 0,
            finish_year: 0,
            create_at: now,
            update_at: now,
        };

        self.stores.approvals.insert(model.clone()).await?;
        tracing::info!(
            "Approval {} ({}) created by {} with {} approver(s)",
            model.id,
            model.no,
            submitter_id,
            model.approvers.0.len()
        );
        Ok(model)
    }

    pub async fn dispose(&self, actor: &str, req: DisposeRequest) -> AppResult<approval::Model> {
        let mut model = self
            .stores
            .approvals
            .find(&req.approval_id)
            .await?
            .ok_or_not_found(format!("approval {}", req.approval_id))?;

        let expected_version = model.version;
        apply_decision(
            &mut model,
            actor,
            req.status,
            &req.reason,
            self.policy,
            Local::now(),
        )?;
        model.version = expected_version + 1;
        model.update_at = now_unix();

        if !self
            .stores
            .approvals
            .update_versioned(model.clone(), expected_version)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "approval {} was modified concurrently",
                model.id
            )));
        }

        tracing::info!(
            "Approval {} disposed by {}: {:?} -> {:?}",
            model.id,
            actor,
            req.status,
            model.status
        );
        Ok(model)
    }

    /// Detail view. When the user lookup fails the view is still returned,
    /// without display names, alongside the error.
    /// Approval details with user names, readable only by its participants
    pub async fn info(&self, viewer: &str, id: &str) -> AppResult<Partial<ApprovalInfo>> {
        let model = self
            .stores
            .approvals
            .find(id)
            .await?
            .ok_or_not_found(format!("approval {}", id))?;

        let participants = model.participants();
        if model.user_id != viewer && !participants.iter().any(|p| p == viewer) {
            return Err(AppError::Forbidden(
                "you do not take part in this approval".to_string(),
            ));
        }
        let mut info = ApprovalInfo::from(model);

        let users = match self.stores.users.find_many(&participants).await {
            Ok(users) if users.is_empty() => return Ok(Partial::complete(info)),
            Ok(users) => users,
            Err(e) => {
                tracing::warn!("Approval {}: user lookup failed: {}", id, e);
                return Ok(Partial::with_error(info, e));
            }
        };
        let names: HashMap<String, String> = users.into_iter().map(|u| (u.id, u.name)).collect();
        let name_of = |uid: &str| names.get(uid).cloned().unwrap_or_default();

        info.user.user_name = name_of(&info.user.user_id);
        info.approver.user_name = name_of(&info.approver.user_id);
        for approver in info.approvers.iter_mut() {
            approver.user_name = name_of(&approver.user_id);
        }
        Ok(Partial::complete(info))
    }

    pub async fn list(
        &self,
        user_id: &str,
        req: ApprovalListRequest,
    ) -> AppResult<ApprovalListResponse> {
        let filter = match req.list_type {
            1 => ApprovalFilter::Submitted,
            2 => ApprovalFilter::Audit,
            other => {
                return Err(AppError::Validation(format!(
                    "unknown approval list type {}",
                    other
                )))
            }
        };

        let (items, count) = self
            .stores
            .approvals
            .list(&ApprovalQuery {
                user_id: user_id.to_string(),
                filter,
                page: Page::new(req.page, req.count),
            })
            .await?;

        Ok(ApprovalListResponse {
            count,
            list: items.into_iter().map(ApprovalListItem::from).collect(),
        })
    }
}
