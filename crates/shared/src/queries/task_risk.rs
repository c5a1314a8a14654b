use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::task::Task;
use crate::repos::{Store, StoreError};

const LOW_COMPLETION_THRESHOLD: u32 = 40;
const MID_COMPLETION_THRESHOLD: u32 = 60;
const RISK_SCORE_CUTOFF: u32 = 30;

#[derive(Debug)]
pub struct RiskyTask {
    pub task: Task,
    pub completion_rate: u32,
    pub score: u32,
}

/// Groups completion history by the natural key a recurring task shares
/// across days: its routine, falling back to its name for adhoc tasks.
fn completion_key(task: &Task) -> String {
    task.routine_definition_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| task.name.clone())
}

/// Task Risk query (spec §4.5.5): scores incomplete, non-DAILY tasks over
/// `lookback_days` by category weight, historical completion rate, and
/// frequency, returning only those at or above the cutoff.
pub async fn task_risk(
    store: &Store,
    user_id: Uuid,
    today: NaiveDate,
    lookback_days: i64,
) -> Result<Vec<RiskyTask>, StoreError> {
    let since_date = today - Duration::days(lookback_days);
    let candidates = store.list_risk_candidate_tasks(user_id, since_date, today).await?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let since = since_date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    let audit_logs = store.list_audit_logs_since(user_id, since).await?;

    let mut completions: HashMap<String, (u32, u32)> = HashMap::new();
    for log in &audit_logs {
        let key = match (&log.activity_type[..], log.entity_data.as_ref()) {
            ("TaskCompletedEvent", Some(data)) | ("TaskPuntedEvent", Some(data)) => data
                .get("routine_definition_id")
                .and_then(|value| value.as_str())
                .map(str::to_string)
                .or_else(|| data.get("name").and_then(|value| value.as_str()).map(str::to_string)),
            _ => None,
        };
        let Some(key) = key else { continue };

        let entry = completions.entry(key).or_insert((0, 0));
        if log.activity_type == "TaskCompletedEvent" {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut risky = Vec::new();
    for task in candidates {
        let (completed, punted) = completions.get(&completion_key(&task)).copied().unwrap_or((0, 0));
        let total = completed + punted;
        let completion_rate = if total == 0 { 100 } else { completed * 100 / total };

        let mut score = task.category.risk_weight();
        if completion_rate < LOW_COMPLETION_THRESHOLD {
            score += 40;
        } else if completion_rate < MID_COMPLETION_THRESHOLD {
            score += 20;
        }
        if !task.frequency.is_daily() {
            score += 15;
        }

        if score >= RISK_SCORE_CUTOFF {
            risky.push(RiskyTask {
                task,
                completion_rate,
                score,
            });
        }
    }

    Ok(risky)
}
