#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::api::auth::AuthPayload;
    use crate::auth::{Role, issue_access_token, issue_refresh_token, verify_access_token};
    use crate::config::AuthConfig;
    use crate::db::get_user;
    use crate::response::{Envelope, ErrorBody};
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::{
        authed, create_standard_test_db, json_body, login_test_user, login_with_password,
        setup_test_client, test_auth_config,
    };

    #[rocket::async_test]
    async fn test_register_then_login_scenario() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "alice",
                    "email": "alice@x.com",
                    "password": "secret1",
                    "full_name": "Alice"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body = response.into_string().await.unwrap();
        let registered: Envelope<AuthPayload> = serde_json::from_str(&body).unwrap();
        assert!(registered.success);
        assert_eq!(registered.data.role, Role::Trainee);
        assert!(!registered.data.token.is_empty());
        assert!(!registered.data.refresh_token.is_empty());
        assert!(!body.contains("secret1"));
        assert!(!body.contains("password"));

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "alice", "password": "wrong" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
        let error: ErrorBody = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!error.success);
        assert_eq!(error.message, "Invalid username or password");

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "alice", "password": "secret1" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let login: Envelope<AuthPayload> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(login.message, "Login successful");
        assert_eq!(login.data.id, registered.data.id);

        let claims = verify_access_token(&login.data.token, &test_auth_config()).unwrap();
        assert_eq!(claims.id, registered.data.id);
        assert_eq!(claims.role, Role::Trainee);
    }

    #[rocket::async_test]
    async fn test_login_failures_are_indistinguishable() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let wrong_password = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "trainee_tom", "password": "nope-nope" }).to_string())
            .dispatch()
            .await;
        assert_eq!(wrong_password.status(), Status::Unauthorized);
        let wrong_password_body = wrong_password.into_string().await.unwrap();

        let unknown_user = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "nobody", "password": "nope-nope" }).to_string())
            .dispatch()
            .await;
        assert_eq!(unknown_user.status(), Status::Unauthorized);
        let unknown_user_body = unknown_user.into_string().await.unwrap();

        assert_eq!(wrong_password_body, unknown_user_body);
    }

    #[rocket::async_test]
    async fn test_login_accepts_email_and_requires_both_fields() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        login_with_password(&client, "trainee_tom@example.com", "password123").await;

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "trainee_tom" }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Username and password are required");
    }

    #[rocket::async_test]
    async fn test_register_rejects_bad_input() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let cases = vec![
            (
                json!({ "username": "trainee_tom", "email": "new@x.com", "password": "secret1", "full_name": "Dup" }),
                "Username or email already exists",
            ),
            (
                json!({ "username": "bob", "email": "bob@x.com", "password": "short", "full_name": "Bob" }),
                "Password must be at least 6 characters",
            ),
            (
                json!({ "username": "bob", "email": "not-an-email", "password": "secret1", "full_name": "Bob" }),
                "Please provide a valid email",
            ),
            (
                json!({ "username": "bob", "email": "bob@x.com", "password": "secret1", "full_name": "Bob", "role": "admin" }),
                "Unknown role: admin",
            ),
        ];

        for (payload, expected) in cases {
            let response = client
                .post("/api/auth/register")
                .header(ContentType::JSON)
                .body(payload.to_string())
                .dispatch()
                .await;

            assert_eq!(response.status(), Status::BadRequest, "payload {}", payload);
            let body = json_body(response).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], expected);
        }
    }

    #[rocket::async_test]
    async fn test_register_coach_role() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/api/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "carol",
                    "email": "carol@x.com",
                    "password": "secret1",
                    "full_name": "Carol",
                    "role": "coach"
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Created);
        let body = json_body(response).await;
        assert_eq!(body["data"]["role"], "coach");
    }

    #[rocket::async_test]
    async fn test_bearer_token_failures() {
        let test_db = create_standard_test_db().await;
        let user = get_user(&test_db.pool, test_db.user_id("trainee_tom"))
            .await
            .unwrap();
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/api/auth/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Access token required");

        let expired_config = AuthConfig {
            access_token_ttl: Duration::minutes(-10),
            ..test_auth_config()
        };
        let expired = issue_access_token(&user, &expired_config).unwrap();
        let response = authed(client.get("/api/auth/me"), &expired).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Token expired");

        let valid = login_test_user(&client, "trainee_tom").await;
        let mut parts: Vec<String> = valid.split('.').map(String::from).collect();
        let signature: Vec<char> = parts[2].chars().collect();
        let replacement = if signature[10] == 'A' { 'B' } else { 'A' };
        parts[2] = signature
            .iter()
            .enumerate()
            .map(|(i, c)| if i == 10 { replacement } else { *c })
            .collect();
        let tampered = parts.join(".");

        let response = authed(client.get("/api/auth/me"), &tampered).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Invalid token");

        let response = authed(client.get("/api/auth/me"), "garbage").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Invalid token");

        let response = authed(client.get("/api/auth/me"), &valid).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        assert_eq!(body["data"]["username"], "trainee_tom");
        assert!(body["data"].get("password").is_none());
    }

    #[rocket::async_test]
    async fn test_refresh_flow() {
        let test_db = create_standard_test_db().await;
        let user = get_user(&test_db.pool, test_db.user_id("coach_kim"))
            .await
            .unwrap();
        let (client, _) = setup_test_client(test_db).await;

        let refresh_token = issue_refresh_token(&user, &test_auth_config()).unwrap();

        let response = client
            .post("/api/auth/refresh")
            .header(ContentType::JSON)
            .body(json!({ "refreshToken": refresh_token }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        let token = body["data"]["token"].as_str().unwrap().to_string();
        assert!(body["data"]["refreshToken"].as_str().is_some());

        let response = authed(client.get("/api/auth/me"), &token).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        // A refresh token is not an access token.
        let response = authed(client.get("/api/auth/me"), &refresh_token)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Invalid token");

        let response = client
            .post("/api/auth/refresh")
            .header(ContentType::JSON)
            .body(json!({ "refreshToken": token }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/auth/refresh")
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(json_body(response).await["message"], "Refresh token required");
    }

    #[rocket::async_test]
    async fn test_refresh_for_missing_user_is_not_found() {
        let test_db = create_standard_test_db().await;
        let mut ghost = get_user(&test_db.pool, test_db.user_id("coach_kim"))
            .await
            .unwrap();
        ghost.id = 9999;
        let (client, _) = setup_test_client(test_db).await;

        let refresh_token = issue_refresh_token(&ghost, &test_auth_config()).unwrap();
        let response = client
            .post("/api/auth/refresh")
            .header(ContentType::JSON)
            .body(json!({ "refreshToken": refresh_token }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(json_body(response).await["message"], "User not found");
    }

    #[rocket::async_test]
    async fn test_change_password() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "trainee_tom").await;

        let response = authed(client.put("/api/auth/change-password"), &token)
            .header(ContentType::JSON)
            .body(json!({ "currentPassword": "not-it", "newPassword": "brandnew1" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(json_body(response).await["message"], "Wrong current password");

        let response = authed(client.put("/api/auth/change-password"), &token)
            .header(ContentType::JSON)
            .body(json!({ "currentPassword": "password123", "newPassword": "abc" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = authed(client.put("/api/auth/change-password"), &token)
            .header(ContentType::JSON)
            .body(
                json!({ "currentPassword": "password123", "newPassword": "brandnew1" }).to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        login_with_password(&client, "trainee_tom", "brandnew1").await;

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": "trainee_tom", "password": "password123" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_logout_requires_token() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.post("/api/auth/logout").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let token = login_test_user(&client, "coach_kim").await;
        let response = authed(client.post("/api/auth/logout"), &token).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json_body(response).await["message"], "Logout successful");
    }

    #[rocket::async_test]
    async fn test_forgot_password_never_reveals_accounts() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        for email in ["coach_kim@example.com", "nobody@example.com"] {
            let response = client
                .post("/api/auth/forgot-password")
                .header(ContentType::JSON)
                .body(json!({ "email": email }).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
            assert_eq!(
                json_body(response).await["message"],
                "Reset link sent if email exists"
            );
        }

        let response = client
            .post("/api/auth/forgot-password")
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(json_body(response).await["message"], "Email required");
    }

    #[rocket::async_test]
    async fn test_envelopes_for_framework_errors() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client.get("/api/does-not-exist").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("not found"));

        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert_eq!(json_body(response).await["success"], false);

        let response = client.get("/api/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }

    #[rocket::async_test]
    async fn test_profile_update_restrictions() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        let token = login_test_user(&client, "trainee_tom").await;

        for forbidden in [
            json!({ "role": "coach" }),
            json!({ "password": "hijack123" }),
            json!({ "email": "other@x.com" }),
            json!({ "username": "renamed" }),
        ] {
            let response = authed(client.put("/api/trainee/profile"), &token)
                .header(ContentType::JSON)
                .body(forbidden.to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest, "payload {}", forbidden);
        }

        let response = authed(client.put("/api/trainee/profile"), &token)
            .header(ContentType::JSON)
            .body(json!({ "bio": "Marathon in May", "fitness_level": "intermediate" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        assert_eq!(body["data"]["bio"], "Marathon in May");
        assert_eq!(body["data"]["fitness_level"], "intermediate");
        assert_eq!(body["data"]["role"], "trainee");

        let coach_token = login_test_user(&client, "coach_kim").await;
        let response = authed(client.put("/api/coach/profile"), &coach_token)
            .header(ContentType::JSON)
            .body(json!({ "fitness_level": "advanced" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = authed(client.get("/api/coach/profile"), &coach_token)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json_body(response).await["data"]["full_name"], "Kim Coach");
    }
}
