//! Bulk user import from JSON or an Excel workbook.
//!
//! Rows are validated one by one and reported individually; valid rows are
//! created in a single transaction together with one audit entry.

use std::{collections::HashSet, io::Cursor, str::FromStr};

use calamine::{Reader, Xlsx, XlsxError, open_workbook_from_rs};
use db::{
    DBService, TransactionTrait,
    events::ChangeLogDraft,
    models::{
        team::Team,
        user::{CreateUser, User},
        workspace::{UsageCounter, Workspace},
    },
};
use protocol::{
    Action, ChangeLogEventType, Resource, Role, realtime::USERS_IMPORTED,
};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::text::normalize_email;

use super::{
    activity::Activity,
    context::Actor,
    error::{Result, ServiceError},
    users::validate_identity,
    workspaces::ensure_capacity,
};

const COLUMNS: [&str; 4] = ["name", "email", "role", "team"];
pub const TEMPLATE_FILENAME: &str = "user-import-template.xlsx";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ImportRow {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Team name, matched case-insensitively.
    #[serde(default)]
    pub team: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct JsonImport {
    pub users: Vec<ImportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct RowError {
    /// 1-based; for workbooks this is the sheet row, header included.
    pub row: usize,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct BulkImportResult {
    pub total: usize,
    pub created: Vec<User>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct JsonTemplate {
    pub users: Vec<ImportRow>,
    pub roles: Vec<Role>,
}

/// Accepts wire names as well as labels such as "Team Lead".
fn parse_role(raw: &str) -> Option<Role> {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    Role::from_str(&normalized).ok()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reads `(sheet_row, ImportRow)` pairs from the first worksheet. The
/// header row decides column order; blank rows are skipped.
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<(usize, ImportRow)>> {
    let mut workbook: Xlsx<Cursor<&[u8]>> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|err: XlsxError| ServiceError::Spreadsheet(err.to_string()))?;
    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| ServiceError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|err| ServiceError::Spreadsheet(err.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|cell| cell.to_string().trim().to_lowercase()).collect(),
        None => return Err(ServiceError::Spreadsheet("sheet is empty".to_string())),
    };
    let position = |column: &str| headers.iter().position(|header| header == column);
    let (Some(name_col), Some(email_col)) = (position("name"), position("email")) else {
        return Err(ServiceError::Spreadsheet(
            "header row must contain 'name' and 'email' columns".to_string(),
        ));
    };
    let role_col = position("role");
    let team_col = position("team");

    let mut parsed = Vec::new();
    for (index, row) in rows.enumerate() {
        let cell = |col: Option<usize>| {
            col.and_then(|col| row.get(col))
                .map(|value| value.to_string().trim().to_string())
                .unwrap_or_default()
        };
        let item = ImportRow {
            name: cell(Some(name_col)),
            email: cell(Some(email_col)),
            role: blank_to_none(Some(cell(role_col))),
            team: blank_to_none(Some(cell(team_col))),
        };
        if item.name.is_empty() && item.email.is_empty() {
            continue;
        }
        parsed.push((index + 2, item));
    }
    Ok(parsed)
}

/// An `.xlsx` with the expected header and one example row.
pub fn template_workbook() -> Result<Vec<u8>> {
    let spreadsheet = |err: rust_xlsxwriter::XlsxError| ServiceError::Spreadsheet(err.to_string());
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Users").map_err(spreadsheet)?;
    for (col, title) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet
            .write_string_with_format(0, col, *title, &header)
            .map_err(spreadsheet)?;
        worksheet.set_column_width(col, 28).map_err(spreadsheet)?;
    }
    let example = example_row();
    let values = [
        example.name.as_str(),
        example.email.as_str(),
        example.role.as_deref().unwrap_or_default(),
        example.team.as_deref().unwrap_or_default(),
    ];
    for (col, value) in values.iter().enumerate() {
        worksheet.write_string(1, col as u16, *value).map_err(spreadsheet)?;
    }
    workbook.save_to_buffer().map_err(spreadsheet)
}

fn example_row() -> ImportRow {
    ImportRow {
        name: "Jane Doe".to_string(),
        email: "jane.doe@example.com".to_string(),
        role: Some(Role::Member.to_string()),
        team: None,
    }
}

#[derive(Clone, Default)]
pub struct BulkImportService;

impl BulkImportService {
    pub fn new() -> Self {
        Self
    }

    pub fn json_template(&self, actor: &Actor) -> Result<JsonTemplate> {
        actor.require(Resource::User, Action::Import)?;
        Ok(JsonTemplate {
            users: vec![example_row()],
            roles: actor.role().assignable_roles(actor.workspace_type).to_vec(),
        })
    }

    pub fn excel_template(&self, actor: &Actor) -> Result<Vec<u8>> {
        actor.require(Resource::User, Action::Import)?;
        template_workbook()
    }

    pub async fn import_json(
        &self,
        db: &DBService,
        actor: &Actor,
        payload: &JsonImport,
    ) -> Result<BulkImportResult> {
        let rows = payload
            .users
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, row)| (index + 1, row))
            .collect();
        self.import_rows(db, actor, rows, "json").await
    }

    pub async fn import_excel(
        &self,
        db: &DBService,
        actor: &Actor,
        bytes: &[u8],
    ) -> Result<BulkImportResult> {
        actor.require(Resource::User, Action::Import)?;
        let rows = parse_workbook(bytes)?;
        self.import_rows(db, actor, rows, "excel").await
    }

    async fn import_rows(
        &self,
        db: &DBService,
        actor: &Actor,
        rows: Vec<(usize, ImportRow)>,
        source: &str,
    ) -> Result<BulkImportResult> {
        actor.require(Resource::User, Action::Import)?;
        if rows.is_empty() {
            return Err(ServiceError::Validation("No users to import".to_string()));
        }

        let total = rows.len();
        let emails: Vec<String> = rows.iter().map(|(_, row)| normalize_email(&row.email)).collect();
        let existing = User::existing_emails(&db.pool, &emails).await?;
        let teams: Vec<(String, uuid::Uuid)> = Team::names(&db.pool, &actor.scope)
            .await?
            .into_iter()
            .map(|(id, name)| (name.to_lowercase(), id))
            .collect();

        let mut errors = Vec::new();
        let mut accepted: Vec<CreateUser> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (row_number, row) in rows {
            let email = normalize_email(&row.email);
            let mut fail = |message: String| {
                errors.push(RowError { row: row_number, email: email.clone(), message });
            };
            if let Err(message) = validate_identity(&row.name, &row.email) {
                fail(message);
                continue;
            }
            if !seen.insert(email.clone()) {
                fail("Duplicate email in this import".to_string());
                continue;
            }
            if existing.contains(&email) {
                fail("Email is already registered".to_string());
                continue;
            }
            let role = match row.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                Some(raw) => match parse_role(raw) {
                    Some(role) => role,
                    None => {
                        fail(format!("Unknown role '{raw}'"));
                        continue;
                    }
                },
                None => Role::default(),
            };
            if !actor.role().can_assign(actor.workspace_type, role) {
                fail(format!("You cannot create {role} accounts"));
                continue;
            }
            let team_id = match blank_to_none(row.team.clone()) {
                Some(team) => match teams.iter().find(|(name, _)| *name == team.to_lowercase()) {
                    Some((_, id)) => Some(*id),
                    None => {
                        fail(format!("Unknown team '{team}'"));
                        continue;
                    }
                },
                None => None,
            };
            accepted.push(CreateUser {
                name: row.name.trim().to_string(),
                email,
                role: Some(role),
                team_id,
                profile_picture: None,
            });
        }

        let mut created = Vec::with_capacity(accepted.len());
        if !accepted.is_empty() {
            let tx = db.pool.begin().await?;
            ensure_capacity(&tx, &actor.scope, UsageCounter::Users, accepted.len() as i32).await?;
            for data in &accepted {
                created.push(User::create(&tx, &actor.scope, data).await?);
            }
            Workspace::adjust_usage(&tx, &actor.scope, UsageCounter::Users, created.len() as i32)
                .await?;
            Activity::new(USERS_IMPORTED, actor, "user", actor.workspace_id())
                .entity(&serde_json::json!({ "users": created }))?
                .changelog(
                    ChangeLogDraft::new(
                        ChangeLogEventType::UserBulkImported,
                        "bulk_import",
                        format!("Imported {} of {} users from {source}", created.len(), total),
                    )
                    .metadata(serde_json::json!({
                        "source": source,
                        "total": total,
                        "created": created.len(),
                        "failed": errors.len(),
                    })),
                )
                .enqueue(&tx)
                .await?;
            tx.commit().await?;
        }

        tracing::info!(
            workspace_id = %actor.workspace_id(),
            total,
            created = created.len(),
            failed = errors.len(),
            source,
            "bulk user import finished"
        );
        Ok(BulkImportResult { total, created, errors })
    }
}
