//! Plain-text rendering of screen states and records.

use chrono::{DateTime, Local, Utc};

use sigref_core::cache::manager::format_age;
use sigref_core::models::{
    PendingSubmission, School, SchoolDashboard, SchoolQuestionnaires,
};
use sigref_core::screens::ScreenState;

/// One-line banner describing where the data on screen came from
pub fn freshness<T>(state: &ScreenState<T>) -> Option<String> {
    match state {
        ScreenState::ShowingFresh(_) => None,
        ScreenState::ShowingCached { cached_at, .. } => {
            Some(format!("(cached, updated {})", age_of(*cached_at)))
        }
        ScreenState::ShowingStaleOffline { cached_at, .. } => Some(format!(
            "(could not refresh - showing data saved {})",
            age_of(*cached_at)
        )),
        ScreenState::Loading => Some("(no data yet)".to_string()),
        ScreenState::Error(e) => Some(format!("Error: {}", e)),
    }
}

fn age_of(at: DateTime<Utc>) -> String {
    format_age((Utc::now() - at).num_minutes())
}

pub fn school_line(school: &School) -> String {
    let mut line = format!("{:>6}  {}", school.id, school.name);
    if !school.inep.is_empty() {
        line.push_str(&format!("  [INEP {}]", school.inep));
    }
    line
}

pub fn questionnaires(listing: &SchoolQuestionnaires) -> Vec<String> {
    let mut lines = vec![format!("{} (id {})", listing.school.name, listing.school.id)];
    lines.push(format!(
        "Monitorings: {} today / {} overall (mine: {} today / {} overall)",
        listing.total_today,
        listing.total_overall,
        listing.my_monitorings_today,
        listing.my_monitorings_total
    ));
    if let Some(last) = &listing.last_answer_at {
        lines.push(format!("Last answer: {}", last));
    }
    if listing.questionnaires.is_empty() {
        lines.push("No questionnaires available.".to_string());
    }
    for q in &listing.questionnaires {
        lines.push(format!(
            "{:>6}  {}  ({} today, {} total, {:.0}%)",
            q.id,
            q.title,
            q.answers_today,
            q.answers_total,
            q.today_percentage()
        ));
    }
    lines
}

pub fn dashboard(dashboard: &SchoolDashboard) -> Vec<String> {
    let mut lines = vec![format!("{} (id {})", dashboard.school.name, dashboard.school.id)];
    lines.push(format!("Gaps: {}", stats(&dashboard.gap_stats)));
    lines.push(format!("Problems: {}", stats(&dashboard.problem_stats)));
    lines.push(format!("Notices: {}", dashboard.notices.len()));
    lines
}

/// `{"abertas": 2, "resolvidas": 5}` as `abertas=2 resolvidas=5`
fn stats(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" "),
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Object(_) => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn pending_line(item: &PendingSubmission) -> String {
    format!(
        "{}  school {} questionnaire {}  {} answer(s)  queued {}{}",
        item.id,
        item.payload.school_id,
        item.payload.questionnaire_id,
        item.payload.answers.len(),
        item.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        if item.auth_token.is_none() { "  (no session)" } else { "" }
    )
}
