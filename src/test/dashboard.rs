#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::models::AssignmentStatus;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::{
        authed, create_standard_test_db, json_body, login_test_user, setup_test_client,
    };

    #[rocket::async_test]
    async fn test_coach_stats_follow_the_assignment_lifecycle() {
        let test_db = TestDbBuilder::new()
            .coach("coach_kim", "Kim Coach")
            .trainee("trainee_tom", "Tom Trainee")
            .trainee("trainee_una", "Una Trainee")
            .link("coach_kim", "trainee_tom")
            .task("Warmup", "coach_kim", Some(10))
            .assign("Warmup", "trainee_tom", AssignmentStatus::Pending, None)
            .build()
            .await
            .unwrap();
        let kim = test_db.user_id("coach_kim");
        let una = test_db.user_id("trainee_una");
        let (client, _) = setup_test_client(test_db).await;
        let coach = login_test_user(&client, "coach_kim").await;

        let response = authed(client.post("/api/coach/trainees"), &coach)
            .header(ContentType::JSON)
            .body(json!({ "trainee_id": una }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = authed(client.post(format!("/api/coach/{}/tasks", kim)), &coach)
            .header(ContentType::JSON)
            .body(json!({ "trainee_id": una, "title": "Deadlifts", "duration_minutes": 25 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let task_id = json_body(response).await["data"]["task"]["id"]
            .as_i64()
            .unwrap();

        let response = authed(client.get("/api/dashboard/coach"), &coach).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let before = json_body(response).await;
        let overview = &before["data"]["overview"];
        assert_eq!(overview["total_trainees"], 2);
        assert_eq!(overview["total_tasks"], 2);
        assert_eq!(overview["total_assignments"], 2);
        assert_eq!(overview["assignment_stats"]["pending"], 2);
        assert_eq!(overview["assignment_stats"]["completed"], 0);
        assert_eq!(overview["assignment_stats"]["in_progress"], 0);
        assert_eq!(overview["assignment_stats"]["overdue"], 0);

        let recent = before["data"]["recent_assignments"].as_array().unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0]["task_title"], "Deadlifts");
        assert_eq!(recent[0]["trainee_name"], "Una Trainee");

        let trainee = login_test_user(&client, "trainee_una").await;
        let response = authed(
            client.post(format!("/api/trainee/tasks/{}/complete", task_id)),
            &trainee,
        )
        .dispatch()
        .await;
        assert_eq!(response.status(), Status::Ok);

        let response = authed(client.get("/api/dashboard/coach"), &coach).dispatch().await;
        let after = json_body(response).await;
        let before_stats = &before["data"]["overview"]["assignment_stats"];
        let after_stats = &after["data"]["overview"]["assignment_stats"];
        assert_eq!(
            after_stats["completed"].as_i64().unwrap(),
            before_stats["completed"].as_i64().unwrap() + 1
        );
        assert_eq!(
            after_stats["pending"].as_i64().unwrap(),
            before_stats["pending"].as_i64().unwrap() - 1
        );
    }

    #[rocket::async_test]
    async fn test_trainee_dashboard_without_assignments() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let trainee = login_test_user(&client, "trainee_una").await;

        let response = authed(client.get("/api/dashboard/trainee"), &trainee)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Dashboard data retrieved successfully");
        assert_eq!(body["data"]["overview"]["total_assignments"], 0);
        assert_eq!(body["data"]["overview"]["completion_rate"], 0);
        assert_eq!(body["data"]["overview"]["assignment_stats"]["pending"], 0);
        assert!(body["data"]["upcoming_tasks"].as_array().unwrap().is_empty());
        assert!(body["data"]["recent_completions"].as_array().unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn test_trainee_dashboard_upcoming_and_completions() {
        let now = Utc::now();
        let test_db = TestDbBuilder::new()
            .coach("coach_kim", "Kim Coach")
            .trainee("trainee_tom", "Tom Trainee")
            .link("coach_kim", "trainee_tom")
            .task("Mobility", "coach_kim", Some(20))
            .task("Sprint", "coach_kim", Some(15))
            .task("Distant", "coach_kim", Some(60))
            .task("Done", "coach_kim", Some(30))
            .assign("Mobility", "trainee_tom", AssignmentStatus::Pending, Some(now + Duration::days(5)))
            .assign("Sprint", "trainee_tom", AssignmentStatus::InProgress, Some(now + Duration::days(1)))
            .assign("Distant", "trainee_tom", AssignmentStatus::Pending, Some(now + Duration::days(10)))
            .assign("Done", "trainee_tom", AssignmentStatus::Completed, None)
            .build()
            .await
            .unwrap();
        let (client, _) = setup_test_client(test_db).await;
        let trainee = login_test_user(&client, "trainee_tom").await;

        let response = authed(client.get("/api/dashboard/trainee"), &trainee)
            .dispatch()
            .await;
        let body = json_body(response).await;

        assert_eq!(body["data"]["overview"]["total_assignments"], 4);
        assert_eq!(body["data"]["overview"]["completion_rate"], 25);

        let upcoming = body["data"]["upcoming_tasks"].as_array().unwrap();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0]["title"], "Sprint");
        assert_eq!(upcoming[0]["duration"], 15);
        assert_eq!(upcoming[0]["coach_name"], "Kim Coach");
        assert_eq!(upcoming[1]["title"], "Mobility");

        let completions = body["data"]["recent_completions"].as_array().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0]["title"], "Done");
    }
}
