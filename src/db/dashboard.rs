use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{AssignmentStats, AssignmentStatus, Priority, completion_rate, is_within};

use super::{
    AssignmentDetail, count_tasks, count_trainees, list_assignment_details_for_trainee,
    list_for_coach,
};

const RECENT_LIMIT: usize = 5;
const UPCOMING_WINDOW_DAYS: i64 = 7;
const DUE_SOON_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Serialize)]
pub struct CoachOverview {
    pub total_trainees: i64,
    pub total_tasks: i64,
    pub total_assignments: i64,
    pub assignment_stats: AssignmentStats,
}

#[derive(Debug, Serialize)]
pub struct RecentAssignment {
    pub assignment_id: i64,
    pub task_id: i64,
    pub task_title: String,
    pub trainee_id: i64,
    pub trainee_name: String,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CoachDashboard {
    pub overview: CoachOverview,
    pub recent_assignments: Vec<RecentAssignment>,
}

#[derive(Debug, Serialize)]
pub struct TraineeOverview {
    pub total_assignments: i64,
    pub assignment_stats: AssignmentStats,
    pub completion_rate: i64,
}

#[derive(Debug, Serialize)]
pub struct UpcomingTask {
    pub assignment_id: i64,
    pub task_id: i64,
    pub title: String,
    pub duration: Option<i64>,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub coach_name: String,
}

impl From<&AssignmentDetail> for UpcomingTask {
    fn from(detail: &AssignmentDetail) -> Self {
        Self {
            assignment_id: detail.assignment_id,
            task_id: detail.task_id,
            title: detail.title.clone(),
            duration: detail.duration,
            status: detail.status,
            priority: detail.priority,
            due_date: detail.due_date,
            coach_name: detail.party.full_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecentCompletion {
    pub assignment_id: i64,
    pub task_id: i64,
    pub title: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct TraineeDashboard {
    pub overview: TraineeOverview,
    pub upcoming_tasks: Vec<UpcomingTask>,
    pub recent_completions: Vec<RecentCompletion>,
}

#[derive(Debug, Serialize)]
pub struct ProgressStatistics {
    pub total_tasks: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub pending: i64,
    pub overdue: i64,
    pub completion_rate: i64,
    pub total_workout_minutes: i64,
    pub total_workout_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct RecentActivity {
    pub last_7_days_completions: i64,
    pub recent_tasks: Vec<AssignmentDetail>,
}

#[derive(Debug, Serialize)]
pub struct TraineeProgress {
    pub statistics: ProgressStatistics,
    pub recent_activity: RecentActivity,
    pub upcoming_tasks: Vec<AssignmentDetail>,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskDueSoon,
}

#[derive(Debug, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub task_id: i64,
    pub assignment_id: i64,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
}

fn is_open(detail: &AssignmentDetail) -> bool {
    matches!(
        detail.stored_status,
        AssignmentStatus::Pending | AssignmentStatus::InProgress
    )
}

/// Open assignments due between now and `now + window`, soonest first.
fn due_within(
    details: &[AssignmentDetail],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<&AssignmentDetail> {
    let mut due: Vec<&AssignmentDetail> = details
        .iter()
        .filter(|detail| is_open(detail))
        .filter(|detail| detail.due_date.is_some_and(|d| is_within(d, now, window)))
        .collect();
    due.sort_by_key(|detail| detail.due_date);
    due
}

/// Minutes to hours, rounded to one decimal place.
pub fn workout_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

#[instrument(skip(pool))]
pub async fn coach_dashboard(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    now: DateTime<Utc>,
) -> Result<CoachDashboard, AppError> {
    info!("Building coach dashboard");

    let total_trainees = count_trainees(pool, coach_id).await?;
    let total_tasks = count_tasks(pool, coach_id).await?;
    let listing = list_for_coach(pool, coach_id, None, now).await?;

    let recent_assignments = listing
        .tasks
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|view| RecentAssignment {
            assignment_id: view.detail.assignment_id,
            task_id: view.detail.task_id,
            task_title: view.detail.title,
            trainee_id: view.trainee.id,
            trainee_name: view.trainee.full_name,
            status: view.detail.status,
            priority: view.detail.priority,
            due_date: view.detail.due_date,
            assigned_at: view.detail.assigned_at,
        })
        .collect();

    Ok(CoachDashboard {
        overview: CoachOverview {
            total_trainees,
            total_tasks,
            total_assignments: listing.stats.total,
            assignment_stats: listing.stats.stats,
        },
        recent_assignments,
    })
}

#[instrument(skip(pool))]
pub async fn trainee_dashboard(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    now: DateTime<Utc>,
) -> Result<TraineeDashboard, AppError> {
    info!("Building trainee dashboard");

    let details = list_assignment_details_for_trainee(pool, trainee_id, now).await?;
    let stats = AssignmentStats::tally(details.iter().map(|detail| detail.status));

    let upcoming_tasks = due_within(&details, now, Duration::days(UPCOMING_WINDOW_DAYS))
        .into_iter()
        .take(RECENT_LIMIT)
        .map(UpcomingTask::from)
        .collect();

    let mut completed: Vec<&AssignmentDetail> = details
        .iter()
        .filter(|detail| detail.status == AssignmentStatus::Completed)
        .collect();
    completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    let recent_completions = completed
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|detail| RecentCompletion {
            assignment_id: detail.assignment_id,
            task_id: detail.task_id,
            title: detail.title.clone(),
            completed_at: detail.completed_at,
            notes: detail.notes.clone(),
        })
        .collect();

    Ok(TraineeDashboard {
        overview: TraineeOverview {
            total_assignments: stats.total(),
            assignment_stats: stats,
            completion_rate: stats.completion_rate(),
        },
        upcoming_tasks,
        recent_completions,
    })
}

#[instrument(skip(pool))]
pub async fn trainee_progress(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    now: DateTime<Utc>,
) -> Result<TraineeProgress, AppError> {
    info!("Computing trainee progress");

    let details = list_assignment_details_for_trainee(pool, trainee_id, now).await?;
    let stats = AssignmentStats::tally(details.iter().map(|detail| detail.status));

    let completed = details
        .iter()
        .filter(|detail| detail.status == AssignmentStatus::Completed);

    let total_workout_minutes = completed
        .clone()
        .filter_map(|detail| detail.duration)
        .fold(0i64, |total, minutes| total.saturating_add(minutes));

    let week_ago = now - Duration::days(7);
    let mut recent_completions: Vec<AssignmentDetail> = completed
        .filter(|detail| detail.completed_at.is_some_and(|at| at >= week_ago))
        .cloned()
        .collect();
    let last_7_days_completions = recent_completions.len() as i64;
    recent_completions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    recent_completions.truncate(RECENT_LIMIT);

    let mut upcoming: Vec<AssignmentDetail> = details
        .iter()
        .filter(|detail| detail.status != AssignmentStatus::Completed && detail.due_date.is_some())
        .cloned()
        .collect();
    upcoming.sort_by_key(|detail| detail.due_date);
    upcoming.truncate(RECENT_LIMIT);

    Ok(TraineeProgress {
        statistics: ProgressStatistics {
            total_tasks: stats.total(),
            completed: stats.completed,
            in_progress: stats.in_progress,
            pending: stats.pending,
            overdue: stats.overdue,
            completion_rate: completion_rate(stats.completed, stats.total()),
            total_workout_minutes,
            total_workout_hours: workout_hours(total_workout_minutes),
        },
        recent_activity: RecentActivity {
            last_7_days_completions,
            recent_tasks: recent_completions,
        },
        upcoming_tasks: upcoming,
    })
}

#[instrument(skip(pool))]
pub async fn trainee_notifications(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, AppError> {
    info!("Collecting trainee notifications");

    let details = list_assignment_details_for_trainee(pool, trainee_id, now).await?;

    Ok(due_within(&details, now, Duration::days(DUE_SOON_WINDOW_DAYS))
        .into_iter()
        .filter_map(|detail| {
            let due_date = detail.due_date?;
            Some(Notification {
                kind: NotificationKind::TaskDueSoon,
                message: format!(
                    "Task \"{}\" is due on {}",
                    detail.title,
                    due_date.format("%Y-%m-%d")
                ),
                task_id: detail.task_id,
                assignment_id: detail.assignment_id,
                due_date,
                priority: detail.priority,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workout_hours_rounds_to_one_decimal() {
        assert_eq!(workout_hours(0), 0.0);
        assert_eq!(workout_hours(30), 0.5);
        assert_eq!(workout_hours(100), 1.7);
        assert_eq!(workout_hours(125), 2.1);
    }
}
