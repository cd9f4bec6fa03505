use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use libsql::Row;
use uuid::Uuid;
use vigil::{CheckResult, MonitoredTarget, TargetStatus, User};

/// A target together with its most recent check, for listings
#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub target: MonitoredTarget,
    pub last_check: Option<CheckResult>,
}

/// Convert a timestamp to the stored Unix milliseconds
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a timestamp
pub fn i64_to_timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| anyhow!("Timestamp out of range: {}", millis))
}

pub fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

fn parse_uuid(row: &Row, idx: i32) -> Result<Uuid> {
    let raw: String = row.get(idx)?;
    Ok(Uuid::parse_str(&raw)?)
}

/// Columns: id, owner_id, name, url, status, active
pub fn target_from_row(row: &Row) -> Result<MonitoredTarget> {
    Ok(MonitoredTarget {
        id: parse_uuid(row, 0)?,
        owner_id: parse_uuid(row, 1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        status: TargetStatus::from_success(row.get::<i64>(4)? != 0),
        active: row.get::<i64>(5)? != 0,
    })
}

/// Columns: target_id, owner_id, checked_at, success, status_code, latency_ms
pub fn check_from_row(row: &Row) -> Result<CheckResult> {
    Ok(CheckResult {
        target_id: parse_uuid(row, 0)?,
        owner_id: parse_uuid(row, 1)?,
        checked_at: i64_to_timestamp(row.get(2)?)?,
        success: row.get::<i64>(3)? != 0,
        status_code: u16::try_from(row.get::<i64>(4)?)?,
        latency_ms: u64::try_from(row.get::<i64>(5)?)?,
    })
}

/// Columns: id, name, email
pub fn user_from_row(row: &Row) -> Result<User> {
    Ok(User { id: parse_uuid(row, 0)?, name: row.get(1)?, email: row.get(2)? })
}
