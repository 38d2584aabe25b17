//! End-to-end tests driving the full route stack against a live Postgres.
//!
//! These are ignored by default; point DATABASE_URL at a disposable
//! database and run `cargo test -- --ignored` to exercise them. Every test
//! registers its own users with unique emails, so a shared database stays
//! usable across runs.

use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::Filter;

use reseptit::{handle_rejection, routes, Config};

struct TestApp {
    pool: Pool<Postgres>,
    media_root: tempfile::TempDir,
}

impl TestApp {
    async fn spawn() -> Self {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must point at a disposable test database");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("failed to connect to the test database");
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("failed to run migrations");

        Self {
            pool,
            media_root: tempfile::tempdir().expect("failed to create media dir"),
        }
    }

    fn config(&self) -> Config {
        Config {
            database_url: String::new(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            media_root: self.media_root.path().to_path_buf(),
            session_secret: String::from("test-secret"),
        }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
        let api = routes(self.pool.clone(), self.config()).recover(handle_rejection);

        let mut req = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            req = req.header("authorization", format!("Token {token}"));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.reply(&api).await;
        let status = resp.status();
        let body = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
        self.request("POST", path, token, Some(body)).await
    }

    async fn patch(&self, path: &str, token: &str, body: &Value) -> (StatusCode, Value) {
        self.request("PATCH", path, Some(token), Some(body)).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", path, Some(token), None).await
    }

    /// Registers a fresh user and returns (email, token).
    async fn register(&self) -> (String, String) {
        let email = format!("user-{}@example.com", uuid::Uuid::new_v4());
        let (status, _) = self
            .post(
                "/user/create",
                None,
                &json!({ "email": email, "password": "pass123", "name": "Test Test" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .post(
                "/user/token",
                None,
                &json!({ "email": email, "password": "pass123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().expect("token missing").to_owned();

        (email, token)
    }

    async fn create_recipe(&self, token: &str, body: &Value) -> Value {
        let (status, body) = self.post("/recipes", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body
    }
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn create_user_normalizes_email_and_hides_password() {
    let app = TestApp::spawn().await;
    let email = format!("Mixed.Case-{}@EXAMPLE.Com", uuid::Uuid::new_v4());

    let (status, body) = app
        .post(
            "/user/create",
            None,
            &json!({ "email": email, "password": "pass123", "name": "Test Test" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], email.to_lowercase());
    assert_eq!(body["name"], "Test Test");
    assert!(body.get("password").is_none());
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn case_variant_emails_collide_as_duplicates() {
    let app = TestApp::spawn().await;
    let seed = uuid::Uuid::new_v4();
    let payload = |email: &str| json!({ "email": email, "password": "pass123", "name": "T" });

    let (status, _) = app
        .post("/user/create", None, &payload(&format!("dup-{seed}@example.com")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/user/create", None, &payload(&format!("DUP-{seed}@EXAMPLE.COM")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn invalid_registrations_are_rejected() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .post(
            "/user/create",
            None,
            &json!({ "email": "", "password": "pass123", "name": "T" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let short = format!("short-{}@example.com", uuid::Uuid::new_v4());
    let (status, _) = app
        .post(
            "/user/create",
            None,
            &json!({ "email": short, "password": "pw", "name": "T" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing was persisted for the rejected payloads
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&short)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn token_requires_valid_credentials() {
    let app = TestApp::spawn().await;
    let (email, _) = app.register().await;

    let (status, body) = app
        .post(
            "/user/token",
            None,
            &json!({ "email": email, "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("token").is_none());
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn me_endpoint_requires_auth_and_updates_profile() {
    let app = TestApp::spawn().await;
    let (email, token) = app.register().await;

    let (status, _) = app.request("GET", "/user/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/user/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email);

    let (status, body) = app
        .patch(
            "/user/me",
            &token,
            &json!({ "name": "Renamed", "password": "newpass123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");

    // the stored credential now verifies against the new password only
    let (status, _) = app
        .post("/user/token", None, &json!({ "email": email, "password": "pass123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(
            "/user/token",
            None,
            &json!({ "email": email, "password": "newpass123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn recipe_with_nested_tag_end_to_end() {
    let app = TestApp::spawn().await;
    let (email, token) = app.register().await;

    let body = app
        .create_recipe(
            &token,
            &json!({
                "title": "X",
                "time_minutes": 5,
                "price": "5.50",
                "tags": [{ "name": "T1" }]
            }),
        )
        .await;

    assert_eq!(body["title"], "X");
    assert_eq!(body["time_minutes"], 5);
    assert_eq!(body["price"], 5.5);
    assert_eq!(body["tags"].as_array().unwrap().len(), 1);
    assert_eq!(body["tags"][0]["name"], "T1");

    let (count,): (i64,) = sqlx::query_as(
        "
        SELECT COUNT(*) FROM tags
        WHERE name = 'T1' AND user_id = (SELECT id FROM users WHERE email = $1)
    ",
    )
    .bind(&email)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn lists_are_scoped_to_the_requesting_user() {
    let app = TestApp::spawn().await;
    let (_, token_a) = app.register().await;
    let (_, token_b) = app.register().await;

    let recipe_a = app
        .create_recipe(&token_a, &json!({ "title": "A", "time_minutes": 5, "price": 1.0 }))
        .await;
    app.create_recipe(&token_b, &json!({ "title": "B", "time_minutes": 5, "price": 1.0 }))
        .await;

    let (status, body) = app.get("/recipes", &token_a).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["A"]);
    assert_eq!(body[0]["id"], recipe_a["id"]);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn empty_tag_list_clears_and_absent_preserves() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register().await;

    let recipe = app
        .create_recipe(
            &token,
            &json!({
                "title": "Stew",
                "time_minutes": 30,
                "price": 8.0,
                "tags": [{ "name": "Dinner" }, { "name": "Winter" }]
            }),
        )
        .await;
    let path = format!("/recipes/{}", recipe["id"]);

    // tags omitted entirely: associations untouched
    let (status, body) = app.patch(&path, &token, &json!({ "title": "Renamed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["tags"].as_array().unwrap().len(), 2);

    // tags present but empty: association cleared
    let (status, body) = app.patch(&path, &token, &json!({ "tags": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn nested_names_reuse_existing_rows() {
    let app = TestApp::spawn().await;
    let (email, token) = app.register().await;

    for title in ["First", "Second"] {
        app.create_recipe(
            &token,
            &json!({
                "title": title,
                "time_minutes": 5,
                "price": 2.5,
                "tags": [{ "name": "Shared" }],
                "ingredients": [{ "name": "Salt" }, { "name": "Salt" }]
            }),
        )
        .await;
    }

    let (tags,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tags WHERE user_id = (SELECT id FROM users WHERE email = $1)",
    )
    .bind(&email)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    let (ingredients,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM ingredients WHERE user_id = (SELECT id FROM users WHERE email = $1)",
    )
    .bind(&email)
    .fetch_one(&app.pool)
    .await
    .unwrap();

    assert_eq!(tags, 1);
    assert_eq!(ingredients, 1);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn foreign_resources_look_missing() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.register().await;
    let (_, other) = app.register().await;

    let recipe = app
        .create_recipe(&owner, &json!({ "title": "Mine", "time_minutes": 5, "price": 3.0 }))
        .await;
    let path = format!("/recipes/{}", recipe["id"]);

    let (status, _) = app.get(&path, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&path, &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the record is intact for its owner
    let (status, body) = app.get(&path, &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Mine");

    // the owner can actually delete it
    let (status, _) = app.delete(&path, &owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&path, &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn recipes_filter_by_assigned_tag_ids() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register().await;

    let vegan = app
        .create_recipe(
            &token,
            &json!({ "title": "Vegan bowl", "time_minutes": 5, "price": 3.0, "tags": [{ "name": "Vegan" }] }),
        )
        .await;
    app.create_recipe(
        &token,
        &json!({ "title": "Cake", "time_minutes": 50, "price": 6.0, "tags": [{ "name": "Dessert" }] }),
    )
    .await;
    app.create_recipe(&token, &json!({ "title": "Plain", "time_minutes": 5, "price": 1.0 }))
        .await;

    let tag_id = vegan["tags"][0]["id"].clone();
    let (status, body) = app.get(&format!("/recipes?tags={tag_id}"), &token).await;

    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Vegan bowl");
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn assigned_only_excludes_unlinked_and_deduplicates() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register().await;

    // "Used" ends up linked to two recipes, "Unused" to none
    for title in ["First", "Second"] {
        app.create_recipe(
            &token,
            &json!({ "title": title, "time_minutes": 5, "price": 2.0, "tags": [{ "name": "Used" }] }),
        )
        .await;
    }
    let orphan = app
        .create_recipe(
            &token,
            &json!({ "title": "Third", "time_minutes": 5, "price": 2.0, "tags": [{ "name": "Unused" }] }),
        )
        .await;
    let (status, _) = app
        .patch(
            &format!("/recipes/{}", orphan["id"]),
            &token,
            &json!({ "tags": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/tags", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.get("/tags?assigned_only=1", &token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Used"]);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn tags_support_rename_and_delete() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.register().await;
    let (_, other) = app.register().await;

    let recipe = app
        .create_recipe(
            &owner,
            &json!({ "title": "Soup", "time_minutes": 5, "price": 2.0, "tags": [{ "name": "Starter" }] }),
        )
        .await;
    let tag_id = recipe["tags"][0]["id"].clone();
    let path = format!("/tags/{tag_id}");

    let (status, body) = app.patch(&path, &owner, &json!({ "name": "Appetizer" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Appetizer");

    let (status, _) = app.patch(&path, &other, &json!({ "name": "Hijacked" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&path, &owner).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // the recipe survives with the tag detached
    let (status, body) = app.get(&format!("/recipes/{}", recipe["id"]), &owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn superusers_get_flags_and_inactive_accounts_cannot_authenticate() {
    let app = TestApp::spawn().await;
    let email = format!("admin-{}@example.com", uuid::Uuid::new_v4());

    let user = reseptit::actions::users::create_superuser(&email, "pass123", &app.pool)
        .await
        .unwrap();
    assert!(user.is_staff);
    assert!(user.is_superuser);
    assert!(user.is_active);

    let (status, _) = app
        .post("/user/token", None, &json!({ "email": email, "password": "pass123" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(user.id)
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, _) = app
        .post("/user/token", None, &json!({ "email": email, "password": "pass123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires postgres (DATABASE_URL)"]
async fn image_upload_stores_a_generated_filename() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register().await;

    let recipe = app
        .create_recipe(&token, &json!({ "title": "Pic", "time_minutes": 5, "price": 2.0 }))
        .await;

    let boundary = "----reseptit-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
             filename=\"my photo.JPG\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"fake image bytes");
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let api = routes(app.pool.clone(), app.config()).recover(handle_rejection);
    let resp = warp::test::request()
        .method("POST")
        .path(&format!("/recipes/{}/upload-image", recipe["id"]))
        .header("authorization", format!("Token {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(body)
        .reply(&api)
        .await;

    assert_eq!(resp.status(), StatusCode::OK, "{:?}", resp.body());
    let out: Value = serde_json::from_slice(resp.body()).unwrap();
    let image = out["image"].as_str().unwrap();

    assert!(image.starts_with("uploads/recipe/"));
    assert!(image.ends_with(".jpg"));
    assert!(!image.contains("my photo"));
    assert_eq!(
        std::fs::read(app.media_root.path().join(image)).unwrap(),
        b"fake image bytes"
    );
}
