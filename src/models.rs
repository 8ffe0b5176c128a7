use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub profile_picture: String,
    pub bio: String,
    pub phone_number: String,
    pub fitness_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
    pub fitness_level: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            full_name: user.full_name.unwrap_or_default(),
            // The schema constrains role to known values.
            role: user
                .role
                .as_deref()
                .and_then(|r| Role::parse(r).ok())
                .unwrap_or(Role::Trainee),
            profile_picture: user.profile_picture.unwrap_or_default(),
            bio: user.bio.unwrap_or_default(),
            phone_number: user.phone_number.unwrap_or_default(),
            fitness_level: user.fitness_level,
            created_at: user.created_at.unwrap_or_else(Utc::now),
            updated_at: user.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

/// A user together with the stored password hash. Only produced by the
/// authentication lookups and never serialized.
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// The subset of a user shown to the other side of a coaching relationship.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AssignmentStatus::Pending),
            "in_progress" => Some(AssignmentStatus::InProgress),
            "completed" => Some(AssignmentStatus::Completed),
            "overdue" => Some(AssignmentStatus::Overdue),
            _ => None,
        }
    }

    /// The status as displayed and aggregated: an unfinished assignment whose
    /// due date has passed reads as overdue. Overdue is never persisted.
    pub fn effective(
        self,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AssignmentStatus {
        match (self, due_date) {
            (AssignmentStatus::Completed, _) => AssignmentStatus::Completed,
            (_, Some(due)) if due < now => AssignmentStatus::Overdue,
            (status, _) => status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Exercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub workout_type: String,
    pub difficulty_level: Difficulty,
    pub duration_minutes: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Vec<Exercise>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted: bool,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTask {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub duration_minutes: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub fn decode_exercises(raw: Option<&str>) -> Vec<Exercise> {
    raw.and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default()
}

impl From<DbTask> for Task {
    fn from(db: DbTask) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            workout_type: db.workout_type.unwrap_or_default(),
            difficulty_level: db
                .difficulty_level
                .as_deref()
                .and_then(Difficulty::parse)
                .unwrap_or_default(),
            duration_minutes: db.duration_minutes,
            calories_target: db.calories_target,
            exercises: decode_exercises(db.exercises.as_deref()),
            created_by: db.created_by.unwrap_or_default(),
            created_at: db.created_at.unwrap_or_else(Utc::now),
            updated_at: db.updated_at.unwrap_or_else(Utc::now),
            deleted: db.deleted_at.is_some(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskAssignment {
    pub id: i64,
    pub task_id: i64,
    pub trainee_id: i64,
    pub assigned_by: i64,
    pub status: AssignmentStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub notes: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbTaskAssignment {
    pub id: Option<i64>,
    pub task_id: Option<i64>,
    pub trainee_id: Option<i64>,
    pub assigned_by: Option<i64>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DbTaskAssignment> for TaskAssignment {
    fn from(db: DbTaskAssignment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            task_id: db.task_id.unwrap_or_default(),
            trainee_id: db.trainee_id.unwrap_or_default(),
            assigned_by: db.assigned_by.unwrap_or_default(),
            status: db
                .status
                .as_deref()
                .and_then(AssignmentStatus::parse)
                .unwrap_or_default(),
            due_date: db.due_date,
            priority: db
                .priority
                .as_deref()
                .and_then(Priority::parse)
                .unwrap_or_default(),
            notes: db.notes.unwrap_or_default(),
            completed_at: db.completed_at,
            created_at: db.created_at.unwrap_or_else(Utc::now),
            updated_at: db.updated_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Per-status counts, zero-filled.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentStats {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub overdue: i64,
}

impl AssignmentStats {
    pub fn tally(statuses: impl IntoIterator<Item = AssignmentStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            match status {
                AssignmentStatus::Pending => stats.pending += 1,
                AssignmentStatus::InProgress => stats.in_progress += 1,
                AssignmentStatus::Completed => stats.completed += 1,
                AssignmentStatus::Overdue => stats.overdue += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.completed + self.overdue
    }

    pub fn completion_rate(&self) -> i64 {
        completion_rate(self.completed, self.total())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: i64,
    #[serde(flatten)]
    pub stats: AssignmentStats,
}

impl From<AssignmentStats> for StatusSummary {
    fn from(stats: AssignmentStats) -> Self {
        Self {
            total: stats.total(),
            stats,
        }
    }
}

/// Whole-number percentage of completed assignments; zero when there are none.
pub fn completion_rate(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i64
}

/// Accepts either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (taken as
/// midnight UTC).
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| {
            AppError::Validation(format!(
                "Invalid due date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
                value
            ))
        })
}

pub fn is_within(due: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    due >= now && due <= now + window
}
