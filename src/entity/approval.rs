//! Approval entity
//!
//! Table: oa_approval
//!
//! The approver chain and the type-specific payload are stored as JSON
//! columns. `participation` holds every user that may see the approval in
//! the delimited form produced by [`super::encode_ids`].

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Approval type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    #[sea_orm(num_value = 1)]
    General,
    #[sea_orm(num_value = 2)]
    Leave,
    #[sea_orm(num_value = 3)]
    MakeCard,
    #[sea_orm(num_value = 4)]
    GoOut,
    #[sea_orm(num_value = 5)]
    Reimburse,
    #[sea_orm(num_value = 6)]
    Payment,
    #[sea_orm(num_value = 7)]
    Buyer,
    #[sea_orm(num_value = 8)]
    Proceeds,
    #[sea_orm(num_value = 9)]
    Positive,
    #[sea_orm(num_value = 10)]
    Dimission,
    #[sea_orm(num_value = 11)]
    Overtime,
    #[sea_orm(num_value = 12)]
    BuyerContract,
}

impl ApprovalType {
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalType::General => "general approval",
            ApprovalType::Leave => "leave approval",
            ApprovalType::MakeCard => "clock-in correction approval",
            ApprovalType::GoOut => "go-out approval",
            ApprovalType::Reimburse => "reimbursement approval",
            ApprovalType::Payment => "payment approval",
            ApprovalType::Buyer => "purchase approval",
            ApprovalType::Proceeds => "proceeds approval",
            ApprovalType::Positive => "probation approval",
            ApprovalType::Dimission => "resignation approval",
            ApprovalType::Overtime => "overtime approval",
            ApprovalType::BuyerContract => "purchase contract approval",
        }
    }
}

/// Approval status, shared by the approval and each approver entry
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    #[sea_orm(num_value = 0)]
    NotStarted,
    /// In progress
    #[sea_orm(num_value = 1)]
    Processed,
    #[sea_orm(num_value = 2)]
    Pass,
    #[sea_orm(num_value = 3)]
    Refuse,
    #[sea_orm(num_value = 4)]
    Cancel,
    /// Declared for compatibility, nothing transitions into it
    #[sea_orm(num_value = 5)]
    AutoPass,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::Pass | ApprovalStatus::Refuse | ApprovalStatus::Cancel
        )
    }
}

/// Leave type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Matter,
    Rest,
    Sick,
    Annual,
    Maternity,
    Paternity,
    Marriage,
    Funeral,
    Breastfeeding,
}

impl LeaveType {
    pub fn label(&self) -> &'static str {
        match self {
            LeaveType::Matter => "personal leave",
            LeaveType::Rest => "compensatory leave",
            LeaveType::Sick => "sick leave",
            LeaveType::Annual => "annual leave",
            LeaveType::Maternity => "maternity leave",
            LeaveType::Paternity => "paternity leave",
            LeaveType::Marriage => "marriage leave",
            LeaveType::Funeral => "funeral leave",
            LeaveType::Breastfeeding => "nursing leave",
        }
    }
}

/// Clock-in kind being corrected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkCheckType {
    OnWork,
    OffWork,
}

/// Unit a leave is counted in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormatType {
    Hour,
    #[default]
    Day,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "timeType", default)]
    pub time_type: TimeFormatType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoOut {
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
    #[serde(default)]
    pub reason: String,
}

/// Clock-in correction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeCard {
    /// Time of the missed clock-in
    pub date: i64,
    #[serde(default)]
    pub reason: String,
    /// Calendar day, e.g. 20221011
    #[serde(default)]
    pub day: i64,
    #[serde(rename = "checkType")]
    pub check_type: WorkCheckType,
}

/// Type-specific approval content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalPayload {
    Leave(Leave),
    GoOut(GoOut),
    MakeCard(MakeCard),
}

impl ApprovalPayload {
    /// The approval type this payload belongs to
    pub fn approval_type(&self) -> ApprovalType {
        match self {
            ApprovalPayload::Leave(_) => ApprovalType::Leave,
            ApprovalPayload::GoOut(_) => ApprovalType::GoOut,
            ApprovalPayload::MakeCard(_) => ApprovalType::MakeCard,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Filled at read time, never authoritative
    #[serde(rename = "userName", default)]
    pub user_name: String,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub reason: String,
}

impl Approver {
    pub fn new(user_id: impl Into<String>, status: ApprovalStatus) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: String::new(),
            status,
            reason: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Approvers(pub Vec<Approver>);

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oa_approval")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Submitter
    pub user_id: String,

    /// Display tracking number, not unique
    #[sea_orm(column_type = "String(Some(32))")]
    pub no: String,

    pub approval_type: ApprovalType,

    pub status: ApprovalStatus,

    pub title: String,

    #[sea_orm(column_name = "abstract")]
    pub summary: String,

    pub reason: String,

    /// User id of the approver that acts next
    pub approval_id: String,

    /// Index of that approver in `approvers`
    pub approval_idx: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub approvers: Approvers,

    pub participation: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub payload: Option<ApprovalPayload>,

    /// Bumped on every write, checked on update
    pub version: i64,

    pub finish_at: i64,
    pub finish_day: i64,
    pub finish_month: i64,
    pub finish_year: i64,

    pub create_at: i64,
    pub update_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn participants(&self) -> Vec<String> {
        super::decode_ids(&self.participation)
    }

    pub fn current_approver(&self) -> Option<&Approver> {
        usize::try_from(self.approval_idx)
            .ok()
            .and_then(|idx| self.approvers.0.get(idx))
    }
}

/// Approval list item (API response)
#[derive(Clone, Debug, Serialize)]
pub struct ApprovalListItem {
    pub id: String,
    pub no: String,
    #[serde(rename = "type")]
    pub approval_type: ApprovalType,
    pub status: ApprovalStatus,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "approvalId")]
    pub approval_id: String,
    #[serde(rename = "createAt")]
    pub create_at: i64,
}

impl From<Model> for ApprovalListItem {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            no: m.no,
            approval_type: m.approval_type,
            status: m.status,
            title: m.title,
            summary: m.summary,
            user_id: m.user_id,
            approval_id: m.approval_id,
            create_at: m.create_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let payload = ApprovalPayload::GoOut(GoOut {
            start_time: 1,
            end_time: 2,
            reason: "client visit".to_string(),
        });
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "go_out");
        assert_eq!(value["startTime"], 1);

        let back: ApprovalPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.approval_type(), ApprovalType::GoOut);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ApprovalStatus::Pass.is_terminal());
        assert!(ApprovalStatus::Refuse.is_terminal());
        assert!(ApprovalStatus::Cancel.is_terminal());
        assert!(!ApprovalStatus::Processed.is_terminal());
        assert!(!ApprovalStatus::AutoPass.is_terminal());
    }
}
