mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};

use campus_hub::db::ad_repository::AdRepository;
use campus_hub::db::models::Category;
use campus_hub::db::repository::ListingRepository;

fn job_form() -> MultipartForm {
    MultipartForm::new()
        .add_text("company_name", "Acme Robotics")
        .add_text("role", "Embedded Intern")
        .add_text("job_type", "Internship")
        .add_text("location", "Bangalore")
        .add_text("official_link", "https://acme.example/careers")
        .add_text("requirements", "C, Rust")
}

#[tokio::test]
async fn admin_area_requires_admin_role() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();

    server.get("/admin/dashboard").await.assert_status_unauthorized();

    common::register_member(&server, "asha@college.edu").await;
    server.get("/admin/dashboard").await.assert_status(StatusCode::FORBIDDEN);
    server
        .post("/admin/add/jobs")
        .multipart(job_form())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn add_job_with_image_and_promotion() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login_admin(&server).await;

    let form = job_form().add_text("promote_as_ad", "on").add_part(
        "image",
        Part::bytes(vec![0x89, b'P', b'N', b'G'])
            .file_name("logo.png")
            .mime_type("image/png"),
    );
    let response = server.post("/admin/add/jobs").multipart(form).await;
    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Jobs added successfully!");

    let uploads = env.images.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name, "logo.png");

    let jobs: serde_json::Value = server.get("/jobs").await.json();
    let job = &jobs["items"][0];
    assert_eq!(job["title"], "Acme Robotics");
    assert_eq!(job["image"], "https://images.test/logo.png");
    assert_eq!(job["requirements"], serde_json::json!(["C", "Rust"]));

    let ads: serde_json::Value = server.get("/api/get-ads").await.json();
    assert_eq!(ads[0]["title"], "Acme Robotics");
    assert_eq!(ads[0]["description"], "Embedded Intern");
    assert_eq!(ads[0]["image"], "https://images.test/logo.png");
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();
    common::login_admin(&server).await;

    let form = job_form().add_part(
        "image",
        Part::bytes(b"hello".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );
    server
        .post("/admin/add/jobs")
        .multipart(form)
        .await
        .assert_status_bad_request();
    assert_eq!(env.listings.count(Category::Jobs).await.unwrap(), 0);
}

#[tokio::test]
async fn writes_invalidate_cached_pages() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login_admin(&server).await;

    let before: serde_json::Value = server.get("/workshops").await.json();
    assert!(before["items"].as_array().unwrap().is_empty());

    let form = MultipartForm::new()
        .add_text("title", "Intro to Embedded Rust")
        .add_text("organizer", "Rust Club");
    server.post("/admin/add/workshops").multipart(form).await;

    let after: serde_json::Value = server.get("/workshops").await.json();
    assert_eq!(after["items"][0]["title"], "Intro to Embedded Rust");
    assert_eq!(after["items"][0]["organizer"], "Rust Club");
}

#[tokio::test]
async fn edit_toggles_promotion() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login_admin(&server).await;

    let created: serde_json::Value = server
        .post("/admin/add/jobs")
        .multipart(job_form())
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();
    let path = format!("/admin/edit/jobs/{id}");

    let view: serde_json::Value = server.get(&path).await.json();
    assert_eq!(view["has_ad"], false);
    assert_eq!(view["item"]["title"], "Acme Robotics");

    let body: serde_json::Value = server
        .post(&path)
        .multipart(job_form().add_text("promote_as_ad", "on"))
        .await
        .json();
    assert_eq!(body["message"], "Jobs updated and ad created!");
    assert_eq!(env.ads.count().await.unwrap(), 1);

    let body: serde_json::Value = server.post(&path).multipart(job_form()).await.json();
    assert_eq!(body["message"], "Jobs updated (ad removed)!");
    assert_eq!(env.ads.count().await.unwrap(), 0);
}

#[tokio::test]
async fn edit_keeps_fields_the_form_did_not_send() {
    let env = common::TestEnv::start();
    let server = env.server();
    common::login_admin(&server).await;

    let created: serde_json::Value = server
        .post("/admin/add/jobs")
        .multipart(job_form().add_text("description", "Firmware for drones"))
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();
    let path = format!("/admin/edit/jobs/{id}");

    server
        .post(&path)
        .multipart(MultipartForm::new().add_text("company_name", "Acme Corp"))
        .await;

    let view: serde_json::Value = server.get(&path).await.json();
    assert_eq!(view["item"]["title"], "Acme Corp");
    assert_eq!(view["item"]["description"], "Firmware for drones");
    assert_eq!(view["item"]["role"], "Embedded Intern");
    assert_eq!(view["item"]["job_type"], "Internship");
    assert_eq!(view["item"]["link"], "https://acme.example/careers");
    assert_eq!(view["item"]["requirements"], serde_json::json!(["C", "Rust"]));
}

#[tokio::test]
async fn delete_removes_listing_and_its_ads() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();
    common::login_admin(&server).await;

    let created: serde_json::Value = server
        .post("/admin/add/jobs")
        .multipart(job_form().add_text("promote_as_ad", "on"))
        .await
        .json();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(env.ads.count().await.unwrap(), 1);

    let path = format!("/admin/delete/jobs/{id}");
    let body: serde_json::Value = server.post(&path).await.json();
    assert_eq!(body["message"], "Jobs deleted successfully!");
    assert_eq!(env.listings.count(Category::Jobs).await.unwrap(), 0);
    assert_eq!(env.ads.count().await.unwrap(), 0);

    server.post(&path).await.assert_status_not_found();
}

#[tokio::test]
async fn dashboard_users_and_content_lists() {
    let env = common::TestEnv::start();
    let member = env.server();
    common::register_member(&member, "asha@college.edu").await;

    let server = env.server_permissive();
    common::login_admin(&server).await;
    server
        .post("/admin/add/ads")
        .multipart(
            MultipartForm::new()
                .add_text("title", "Summer Fest")
                .add_text("active", "on"),
        )
        .await
        .assert_status(StatusCode::CREATED);

    let stats: serde_json::Value = server.get("/admin/dashboard").await.json();
    assert_eq!(stats["total_users"], 1);
    assert_eq!(stats["total_ads"], 1);
    assert_eq!(stats["active_ads"], 1);
    assert_eq!(stats["total_jobs"], 0);

    let users: serde_json::Value = server.get("/admin/users").await.json();
    assert_eq!(users["items"][0]["email"], "asha@college.edu");
    assert!(users["items"][0].get("password").is_none());

    let ads: serde_json::Value = server.get("/admin/content/ads").await.json();
    assert_eq!(ads["content_type"], "ads");
    assert_eq!(ads["items"][0]["title"], "Summer Fest");
    assert_eq!(ads["items"][0]["impressions"], 0);

    server
        .get("/admin/content/users")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn add_requires_a_title() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();
    common::login_admin(&server).await;

    let response = server
        .post("/admin/add/courses")
        .multipart(MultipartForm::new().add_text("instructor", "Ferris"))
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Title is required");
}
