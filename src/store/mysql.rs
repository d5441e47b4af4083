use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySql, MySqlPool, Row, Transaction};
use strum::IntoEnumIterator;

use super::{Directory, RequestFilter, RequestPage, RequestStore, Transition};
use crate::errors::WorkflowError;
use crate::model::attendance::{Attendance, AttendanceUpsert, SOURCE_CORRECTION};
use crate::model::employee::Employee;
use crate::model::leave_balance::{LeaveBalance, LeaveType};
use crate::model::manager_link::ManagerLink;
use crate::model::request::{
    ApprovableRequest, Decision, DecisionOutcome, NewRequest, RequestKind, RequestPayload,
    RequestStatus,
};
use crate::utils::name_cache::NameCache;
use crate::workflow::effects::{EffectLedger, SideEffectApplier};

const DUPLICATE_KEY: &str = "23000";

fn table_for(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Leave => "leave_requests",
        RequestKind::Overtime => "overtime_requests",
        RequestKind::Correction => "correction_requests",
    }
}

fn columns_for(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Leave => {
            "id, employee_id, leave_type, start_date, end_date, days_requested, reason, status, created_at"
        }
        RequestKind::Overtime => "id, employee_id, work_date, hours, reason, status, created_at",
        RequestKind::Correction => {
            "id, employee_id, work_date, requested_check_in, requested_check_out, reason, status, created_at"
        }
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(DUPLICATE_KEY))
}

fn row_to_request(kind: RequestKind, row: &MySqlRow) -> Result<ApprovableRequest, WorkflowError> {
    let payload = match kind {
        RequestKind::Leave => {
            let leave_type: String = row.try_get("leave_type")?;
            RequestPayload::Leave {
                leave_type: leave_type.parse().map_err(|_| {
                    sqlx::Error::Decode(format!("invalid leave_type `{}`", leave_type).into())
                })?,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
                days_requested: row.try_get("days_requested")?,
                reason: row.try_get("reason")?,
            }
        }
        RequestKind::Overtime => RequestPayload::Overtime {
            date: row.try_get("work_date")?,
            hours: row.try_get("hours")?,
            reason: row.try_get("reason")?,
        },
        RequestKind::Correction => RequestPayload::Correction {
            date: row.try_get("work_date")?,
            requested_check_in: row.try_get("requested_check_in")?,
            requested_check_out: row.try_get("requested_check_out")?,
            reason: row.try_get::<Option<String>, _>("reason")?.unwrap_or_default(),
        },
    };
    let status: String = row.try_get("status")?;

    Ok(ApprovableRequest {
        id: row.try_get("id")?,
        employee_id: row.try_get("employee_id")?,
        payload,
        status: RequestStatus::from_stored(&status),
        decisions: Vec::new(),
        created_at: row.try_get("created_at")?,
    })
}

#[derive(FromRow)]
struct DecisionRow {
    request_id: u64,
    approval_level: u32,
    outcome: String,
    approver_user_id: u64,
    approver_employee_id: Option<u64>,
    via_override: bool,
    comment: Option<String>,
    decided_at: DateTime<Utc>,
}

impl DecisionRow {
    fn into_decision(self) -> Result<Decision, WorkflowError> {
        let outcome: DecisionOutcome = self.outcome.parse().map_err(|_| {
            sqlx::Error::Decode(format!("invalid decision outcome `{}`", self.outcome).into())
        })?;
        Ok(Decision {
            level: self.approval_level,
            outcome,
            approver_user_id: self.approver_user_id,
            approver_employee_id: self.approver_employee_id,
            via_override: self.via_override,
            comment: self.comment,
            decided_at: self.decided_at,
        })
    }
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

pub struct MySqlRequestStore {
    pool: MySqlPool,
}

impl MySqlRequestStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_one(
        &self,
        kind: RequestKind,
        id: u64,
    ) -> Result<Option<ApprovableRequest>, WorkflowError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            columns_for(kind),
            table_for(kind)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let mut requests = vec![row_to_request(kind, r)?];
                self.attach_decisions(kind, &mut requests).await?;
                Ok(requests.pop())
            }
            None => Ok(None),
        }
    }

    /// Loads the decision rows of `requests` in one query.
    async fn attach_decisions(
        &self,
        kind: RequestKind,
        requests: &mut [ApprovableRequest],
    ) -> Result<(), WorkflowError> {
        if requests.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; requests.len()].join(", ");
        let sql = format!(
            r#"
            SELECT request_id, approval_level, outcome, approver_user_id,
                   approver_employee_id, via_override, comment, decided_at
            FROM request_decisions
            WHERE request_kind = ? AND request_id IN ({})
            ORDER BY request_id, approval_level
            "#,
            placeholders
        );

        let mut q = sqlx::query_as::<_, DecisionRow>(&sql).bind(kind.as_str());
        for request in requests.iter() {
            q = q.bind(request.id);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut by_request: HashMap<u64, Vec<Decision>> = HashMap::new();
        for row in rows {
            let request_id = row.request_id;
            by_request
                .entry(request_id)
                .or_default()
                .push(row.into_decision()?);
        }
        for request in requests.iter_mut() {
            request.decisions = by_request.remove(&request.id).unwrap_or_default();
        }
        Ok(())
    }
}

struct MySqlLedger<'t> {
    tx: &'t mut Transaction<'static, MySql>,
}

#[async_trait]
impl EffectLedger for MySqlLedger<'_> {
    async fn add_leave_taken(
        &mut self,
        employee_id: u64,
        leave_type: LeaveType,
        year: i32,
        days: f64,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            r#"
            INSERT INTO leave_balances (employee_id, leave_type, balance_year, taken)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE taken = taken + VALUES(taken)
            "#,
        )
        .bind(employee_id)
        .bind(leave_type.as_str())
        .bind(year)
        .bind(days)
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_attendance(
        &mut self,
        upsert: &AttendanceUpsert,
    ) -> Result<Attendance, WorkflowError> {
        // Each time column keeps its stored value unless a new one is supplied.
        sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, check_in, check_out, source, note)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                check_in = COALESCE(VALUES(check_in), check_in),
                check_out = COALESCE(VALUES(check_out), check_out),
                source = VALUES(source),
                note = CONCAT_WS('\n', NULLIF(note, ''), VALUES(note))
            "#,
        )
        .bind(upsert.employee_id)
        .bind(upsert.date)
        .bind(upsert.check_in)
        .bind(upsert.check_out)
        .bind(SOURCE_CORRECTION)
        .bind(&upsert.note)
        .execute(&mut **self.tx)
        .await?;

        let record = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT employee_id, date, check_in, check_out, source, note
            FROM attendance
            WHERE employee_id = ? AND date = ?
            "#,
        )
        .bind(upsert.employee_id)
        .bind(upsert.date)
        .fetch_one(&mut **self.tx)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl RequestStore for MySqlRequestStore {
    async fn insert(&self, new: NewRequest) -> Result<ApprovableRequest, WorkflowError> {
        let kind = new.payload.kind();
        let result = match &new.payload {
            RequestPayload::Leave {
                leave_type,
                start_date,
                end_date,
                days_requested,
                reason,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO leave_requests
                        (employee_id, leave_type, start_date, end_date, days_requested, reason, status)
                    VALUES (?, ?, ?, ?, ?, ?, 'pending')
                    "#,
                )
                .bind(new.employee_id)
                .bind(leave_type.as_str())
                .bind(start_date)
                .bind(end_date)
                .bind(days_requested)
                .bind(reason)
                .execute(&self.pool)
                .await?
            }
            RequestPayload::Overtime {
                date,
                hours,
                reason,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO overtime_requests (employee_id, work_date, hours, reason, status)
                    VALUES (?, ?, ?, ?, 'pending')
                    "#,
                )
                .bind(new.employee_id)
                .bind(date)
                .bind(hours)
                .bind(reason)
                .execute(&self.pool)
                .await?
            }
            RequestPayload::Correction {
                date,
                requested_check_in,
                requested_check_out,
                reason,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO correction_requests
                        (employee_id, work_date, requested_check_in, requested_check_out, reason, status)
                    VALUES (?, ?, ?, ?, ?, 'pending')
                    "#,
                )
                .bind(new.employee_id)
                .bind(date)
                .bind(requested_check_in)
                .bind(requested_check_out)
                .bind(reason)
                .execute(&self.pool)
                .await?
            }
        };

        let id = result.last_insert_id();
        self.fetch_one(kind, id).await?.ok_or_else(|| {
            WorkflowError::NotFound(format!("{} request #{} vanished after insert", kind, id))
        })
    }

    async fn find(
        &self,
        kind: RequestKind,
        id: u64,
    ) -> Result<Option<ApprovableRequest>, WorkflowError> {
        self.fetch_one(kind, id).await
    }

    async fn list(
        &self,
        kind: RequestKind,
        filter: &RequestFilter,
    ) -> Result<RequestPage, WorkflowError> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(emp_id) = filter.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(emp_id));
        }

        if let Some(status) = filter.status.as_deref() {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status));
        }

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table_for(kind), where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Str(s) => count_q.bind(*s),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            r#"
            SELECT {}
            FROM {}
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            columns_for(kind),
            table_for(kind),
            where_sql
        );
        let mut data_q = sqlx::query(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
            };
        }
        let rows = data_q
            .bind(filter.per_page)
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut data = rows
            .iter()
            .map(|row| row_to_request(kind, row))
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_decisions(kind, &mut data).await?;

        Ok(RequestPage { data, total })
    }

    async fn list_open(
        &self,
        kind: Option<RequestKind>,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError> {
        let mut open = Vec::new();
        for k in RequestKind::iter().filter(|k| kind.is_none_or(|wanted| wanted == *k)) {
            let sql = format!(
                "SELECT {} FROM {} WHERE status NOT IN ('approved', 'rejected') ORDER BY created_at, id",
                columns_for(k),
                table_for(k)
            );
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            let mut requests = rows
                .iter()
                .map(|row| row_to_request(k, row))
                .collect::<Result<Vec<_>, _>>()?;
            self.attach_decisions(k, &mut requests).await?;
            open.extend(requests);
        }
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }

    async fn list_decided_by(
        &self,
        user_id: u64,
        limit: usize,
    ) -> Result<Vec<ApprovableRequest>, WorkflowError> {
        let keys = sqlx::query_as::<_, (String, u64)>(
            r#"
            SELECT request_kind, request_id
            FROM request_decisions
            WHERE approver_user_id = ?
            GROUP BY request_kind, request_id
            ORDER BY MAX(decided_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut decided = Vec::with_capacity(limit);
        for (raw_kind, request_id) in keys {
            if decided.len() >= limit {
                break;
            }
            let Ok(kind) = raw_kind.parse::<RequestKind>() else {
                tracing::warn!(request_kind = %raw_kind, request_id, "Skipping decision of unknown kind");
                continue;
            };
            if let Some(request) = self.fetch_one(kind, request_id).await? {
                if request.is_terminal() {
                    decided.push(request);
                }
            }
        }
        Ok(decided)
    }

    async fn commit(
        &self,
        transition: Transition<'_>,
        effect: Option<&dyn SideEffectApplier>,
    ) -> Result<(), WorkflowError> {
        let kind = transition.request.kind();
        let id = transition.request.id;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            "UPDATE {} SET status = ? WHERE id = ? AND status = ?",
            table_for(kind)
        ))
        .bind(transition.next.to_string())
        .bind(id)
        .bind(transition.expected.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(WorkflowError::Conflict(format!(
                "{} request #{} was changed by another approver",
                kind, id
            )));
        }

        let decision = &transition.decision;
        let inserted = sqlx::query(
            r#"
            INSERT INTO request_decisions
                (request_kind, request_id, approval_level, outcome, approver_user_id,
                 approver_employee_id, via_override, comment, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(decision.level)
        .bind(decision.outcome.as_str())
        .bind(decision.approver_user_id)
        .bind(decision.approver_employee_id)
        .bind(decision.via_override)
        .bind(&decision.comment)
        .bind(decision.decided_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_duplicate(&e) => {
                tx.rollback().await?;
                return Err(WorkflowError::Conflict(format!(
                    "Level {} of {} request #{} is already decided",
                    decision.level + 1,
                    kind,
                    id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(effect) = effect {
            let mut ledger = MySqlLedger { tx: &mut tx };
            effect.apply(transition.request, &mut ledger).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reapply(
        &self,
        request: &ApprovableRequest,
        effect: &dyn SideEffectApplier,
    ) -> Result<(), WorkflowError> {
        let kind = request.kind();
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, String>(&format!(
            "SELECT status FROM {} WHERE id = ? FOR UPDATE",
            table_for(kind)
        ))
        .bind(request.id)
        .fetch_optional(&mut *tx)
        .await?;

        if status.as_deref().map(RequestStatus::from_stored) != Some(RequestStatus::Approved) {
            tx.rollback().await?;
            return Err(WorkflowError::State(format!(
                "{} request #{} is no longer approved",
                kind, request.id
            )));
        }

        let mut ledger = MySqlLedger { tx: &mut tx };
        effect.apply(request, &mut ledger).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn leave_balances(
        &self,
        employee_id: u64,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, WorkflowError> {
        let rows = sqlx::query_as::<_, (String, f64)>(
            r#"
            SELECT leave_type, taken
            FROM leave_balances
            WHERE employee_id = ? AND balance_year = ?
            ORDER BY leave_type
            "#,
        )
        .bind(employee_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(leave_type, taken)| -> Result<LeaveBalance, WorkflowError> {
                let leave_type = leave_type.parse().map_err(|_| {
                    sqlx::Error::Decode(format!("invalid leave_type `{}`", leave_type).into())
                })?;
                Ok(LeaveBalance {
                    employee_id,
                    leave_type,
                    year,
                    taken,
                })
            })
            .collect()
    }

    async fn attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<Attendance>, WorkflowError> {
        let record = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT employee_id, date, check_in, check_out, source, note
            FROM attendance
            WHERE employee_id = ? AND date = ?
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

pub struct MySqlDirectory {
    pool: MySqlPool,
    names: NameCache,
}

impl MySqlDirectory {
    pub fn new(pool: MySqlPool, names: NameCache) -> Self {
        Self { pool, names }
    }
}

#[async_trait]
impl Directory for MySqlDirectory {
    async fn employee_exists(&self, employee_id: u64) -> Result<bool, WorkflowError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn display_name(&self, employee_id: u64) -> Result<Option<String>, WorkflowError> {
        if let Some(name) = self.names.get(employee_id).await {
            return Ok(Some(name));
        }

        let name = sqlx::query_as::<_, Employee>(
            "SELECT id, first_name, last_name FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|e| e.display_name());

        if let Some(ref name) = name {
            self.names.insert(employee_id, name.clone()).await;
        }
        Ok(name)
    }

    async fn manager_links(&self, employee_id: u64) -> Result<Vec<ManagerLink>, WorkflowError> {
        let links = sqlx::query_as::<_, ManagerLink>(
            r#"
            SELECT id, employee_id, manager_id, escalation_rank, active, created_at
            FROM manager_links
            WHERE employee_id = ? AND active = TRUE
            ORDER BY escalation_rank, id
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    async fn assign_manager(
        &self,
        employee_id: u64,
        manager_id: u64,
        rank: u32,
    ) -> Result<ManagerLink, WorkflowError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE manager_links
            SET active = FALSE
            WHERE employee_id = ? AND escalation_rank = ? AND active = TRUE
            "#,
        )
        .bind(employee_id)
        .bind(rank)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO manager_links (employee_id, manager_id, escalation_rank, active)
            VALUES (?, ?, ?, TRUE)
            "#,
        )
        .bind(employee_id)
        .bind(manager_id)
        .bind(rank)
        .execute(&mut *tx)
        .await?;

        let link = sqlx::query_as::<_, ManagerLink>(
            r#"
            SELECT id, employee_id, manager_id, escalation_rank, active, created_at
            FROM manager_links
            WHERE id = ?
            "#,
        )
        .bind(inserted.last_insert_id())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(link)
    }

    async fn deactivate_link(&self, link_id: u64) -> Result<bool, WorkflowError> {
        let result =
            sqlx::query("UPDATE manager_links SET active = FALSE WHERE id = ? AND active = TRUE")
                .bind(link_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
