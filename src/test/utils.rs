#[cfg(test)]
pub mod test_db {
    use chrono::{DateTime, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    use crate::auth::Role;
    use crate::db::{NewTask, NewUser, add_trainee, create_task, create_user};
    use crate::error::AppError;
    use crate::models::{AssignmentStatus, Difficulty, TaskAssignment};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        links: Vec<(String, String)>,
        tasks: Vec<TestTask>,
        assignments: Vec<TestAssignment>,
    }

    pub struct TestUser {
        pub username: String,
        pub full_name: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestTask {
        pub title: String,
        pub coach_username: String,
        pub duration_minutes: Option<i64>,
    }

    pub struct TestAssignment {
        pub task_title: String,
        pub trainee_username: String,
        pub status: AssignmentStatus,
        pub due_date: Option<DateTime<Utc>>,
        pub completed_at: Option<DateTime<Utc>>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn coach(self, username: &str, full_name: &str) -> Self {
            self.user_with_password(username, full_name, Role::Coach, STANDARD_PASSWORD)
        }

        pub fn trainee(self, username: &str, full_name: &str) -> Self {
            self.user_with_password(username, full_name, Role::Trainee, STANDARD_PASSWORD)
        }

        pub fn user_with_password(
            mut self,
            username: &str,
            full_name: &str,
            role: Role,
            password: &str,
        ) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                full_name: full_name.to_string(),
                role,
                password: password.to_string(),
            });
            self
        }

        pub fn link(mut self, coach_username: &str, trainee_username: &str) -> Self {
            self.links
                .push((coach_username.to_string(), trainee_username.to_string()));
            self
        }

        pub fn task(mut self, title: &str, coach_username: &str, duration_minutes: Option<i64>) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                coach_username: coach_username.to_string(),
                duration_minutes,
            });
            self
        }

        /// Inserts the assignment row directly, so tests can seed any status and
        /// due date, including ones the API would never produce at creation.
        pub fn assign(
            mut self,
            task_title: &str,
            trainee_username: &str,
            status: AssignmentStatus,
            due_date: Option<DateTime<Utc>>,
        ) -> Self {
            let completed_at = match status {
                AssignmentStatus::Completed => Some(Utc::now()),
                _ => None,
            };

            self.assignments.push(TestAssignment {
                task_title: task_title.to_string(),
                trainee_username: trainee_username.to_string(),
                status,
                due_date,
                completed_at,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            // One connection that never recycles: every connection to
            // `sqlite::memory:` would otherwise open its own empty database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let created = create_user(
                    &pool,
                    NewUser {
                        username: user.username.clone(),
                        email: format!("{}@example.com", user.username),
                        password: user.password.clone(),
                        full_name: user.full_name.clone(),
                        role: user.role,
                    },
                )
                .await?;

                user_id_map.insert(user.username.clone(), created.id);
            }

            let lookup = |map: &HashMap<String, i64>, key: &str| {
                map.get(key)
                    .copied()
                    .ok_or_else(|| AppError::NotFound(format!("Unknown test fixture '{}'", key)))
            };

            for (coach, trainee) in &self.links {
                add_trainee(
                    &pool,
                    lookup(&user_id_map, coach)?,
                    lookup(&user_id_map, trainee)?,
                )
                .await?;
            }

            for task in &self.tasks {
                let created = create_task(
                    &pool,
                    lookup(&user_id_map, &task.coach_username)?,
                    &NewTask {
                        title: task.title.clone(),
                        description: format!("{} description", task.title),
                        workout_type: "cardio".to_string(),
                        difficulty_level: Difficulty::Beginner,
                        duration_minutes: task.duration_minutes,
                        calories_target: None,
                        exercises: Vec::new(),
                    },
                )
                .await?;

                task_id_map.insert(task.title.clone(), created.id);
            }

            for assignment in &self.assignments {
                let task_id = lookup(&task_id_map, &assignment.task_title)?;
                let trainee_id = lookup(&user_id_map, &assignment.trainee_username)?;
                let (coach_id,) =
                    sqlx::query_as::<_, (i64,)>("SELECT created_by FROM tasks WHERE id = ?")
                        .bind(task_id)
                        .fetch_one(&pool)
                        .await?;
                let now = Utc::now();

                sqlx::query(
                    "INSERT INTO task_assignments
                     (task_id, trainee_id, assigned_by, status, due_date, priority, notes,
                      completed_at, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, 'medium', '', ?, ?, ?)",
                )
                .bind(task_id)
                .bind(trainee_id)
                .bind(coach_id)
                .bind(assignment.status.as_str())
                .bind(assignment.due_date)
                .bind(assignment.completed_at)
                .bind(now)
                .bind(now)
                .execute(&pool)
                .await?;
            }

            Ok(TestDb {
                pool,
                user_id_map,
                task_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub task_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map[username]
        }

        pub fn task_id(&self, title: &str) -> i64 {
            self.task_id_map[title]
        }

        pub async fn assignment(&self, trainee_username: &str, task_title: &str) -> TaskAssignment {
            crate::db::find_trainee_assignment(
                &self.pool,
                self.user_id(trainee_username),
                self.task_id(task_title),
            )
            .await
            .expect("assignment should exist")
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use chrono::Duration;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::{Client, LocalRequest, LocalResponse};
    use serde_json::{Value, json};

    use crate::config::AuthConfig;

    use super::test_db::{STANDARD_PASSWORD, TestDb, TestDbBuilder};

    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_ttl: Duration::days(7),
            refresh_token_ttl: Duration::days(30),
        }
    }

    /// A coach `coach_kim` with linked trainee `trainee_tom`, plus an unlinked
    /// trainee `trainee_una` and a second coach `coach_lee`.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .coach("coach_kim", "Kim Coach")
            .coach("coach_lee", "Lee Coach")
            .trainee("trainee_tom", "Tom Trainee")
            .trainee("trainee_una", "Una Trainee")
            .link("coach_kim", "trainee_tom")
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = crate::init_rocket(test_db.pool.clone(), test_auth_config()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }

    pub fn authed<'c>(request: LocalRequest<'c>, token: &str) -> LocalRequest<'c> {
        request.header(bearer(token))
    }

    pub async fn json_body(response: LocalResponse<'_>) -> Value {
        let body = response.into_string().await.unwrap_or_default();
        serde_json::from_str(&body).expect("response body should be JSON")
    }

    pub async fn login_test_user(client: &Client, username: &str) -> String {
        login_with_password(client, username, STANDARD_PASSWORD).await
    }

    pub async fn login_with_password(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "login failed for {}", username);

        let body = json_body(response).await;
        body["data"]["token"]
            .as_str()
            .expect("login response should carry a token")
            .to_string()
    }
}
