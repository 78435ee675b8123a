mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use mongodb::bson::DateTime as BsonDateTime;

use campus_hub::api::pagination::MAX_PAGE;
use campus_hub::db::models::{Category, Listing};
use campus_hub::db::repository::ListingRepository;

fn posted_hours_ago(title: &str, hours: i64) -> Listing {
    let mut listing = Listing::new(title, format!("About {title}"), "https://example.com/apply");
    listing.posted_at = BsonDateTime::from_chrono(Utc::now() - Duration::hours(hours));
    listing
}

#[tokio::test]
async fn root_redirects_to_jobs() {
    let env = common::TestEnv::start();
    let response = env.server_permissive().get("/").await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/jobs");
}

#[tokio::test]
async fn listing_pages_are_newest_first_and_paginated() {
    let env = common::TestEnv::start();
    for hours in 0..35 {
        env.listings
            .insert(Category::Courses, posted_hours_ago(&format!("Course {hours}"), hours))
            .await
            .unwrap();
    }
    let server = env.server();

    let response = server.get("/courses").await;
    assert_eq!(
        response.header("cache-control"),
        "public, max-age=300"
    );
    let body: serde_json::Value = response.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 30);
    assert_eq!(items[0]["title"], "Course 0");
    assert_eq!(items[29]["title"], "Course 29");
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);
    assert!(items[0].get("admin_id").is_none());

    let body: serde_json::Value = server.get("/courses").add_query_param("page", 2).await.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[4]["title"], "Course 34");
    assert_eq!(body["pagination"]["prev_page"], 1);
}

#[tokio::test]
async fn huge_page_numbers_are_clamped() {
    let env = common::TestEnv::start();
    env.listings
        .insert(Category::Jobs, posted_hours_ago("Acme", 1))
        .await
        .unwrap();
    let server = env.server();

    let body: serde_json::Value = server
        .get("/jobs")
        .add_query_param("page", "1000000000000000000")
        .await
        .json();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["page"], MAX_PAGE);
    assert_eq!(body["pagination"]["has_next"], false);

    let body: serde_json::Value = server
        .get("/api/filter/jobs")
        .add_query_param("page", u64::MAX)
        .await
        .json();
    assert!(body["items"].as_array().unwrap().is_empty());
    assert_eq!(body["pagination"]["page"], MAX_PAGE);
}

#[tokio::test]
async fn roadmaps_require_login() {
    let env = common::TestEnv::start();
    env.listings
        .insert(Category::Roadmaps, posted_hours_ago("Rust Roadmap", 1))
        .await
        .unwrap();
    let server = env.server_permissive();

    server.get("/roadmaps").await.assert_status_unauthorized();

    common::register_member(&server, "asha@college.edu").await;
    let body: serde_json::Value = server.get("/roadmaps").await.json();
    assert_eq!(body["items"][0]["title"], "Rust Roadmap");
}

#[tokio::test]
async fn detail_includes_related_jobs_of_same_type() {
    let env = common::TestEnv::start();
    let mut ids = Vec::new();
    for (title, job_type) in [
        ("Acme", "Internship"),
        ("Globex", "Internship"),
        ("Initech", "Full-time"),
    ] {
        let mut job = posted_hours_ago(title, 1);
        job.job_type = Some(job_type.to_string());
        ids.push(env.listings.insert(Category::Jobs, job).await.unwrap());
    }
    let server = env.server_permissive();

    let path = format!("/detail/job/{}", ids[0].to_hex());
    server.get(&path).await.assert_status_unauthorized();

    common::register_member(&server, "asha@college.edu").await;
    let body: serde_json::Value = server.get(&path).await.json();
    assert_eq!(body["content_type"], "job");
    assert_eq!(body["item"]["title"], "Acme");
    let related: Vec<&str> = body["related"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["title"].as_str())
        .collect();
    assert_eq!(related, vec!["Globex"]);
}

#[tokio::test]
async fn detail_errors() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();
    common::register_member(&server, "asha@college.edu").await;

    server.get("/detail/job/not-an-id").await.assert_status_bad_request();
    server
        .get(&format!("/detail/job/{}", mongodb::bson::oid::ObjectId::new().to_hex()))
        .await
        .assert_status_not_found();
    server
        .get(&format!("/detail/roadmap/{}", mongodb::bson::oid::ObjectId::new().to_hex()))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn apply_returns_the_official_link() {
    let env = common::TestEnv::start();
    let with_link = env
        .listings
        .insert(Category::Hackathons, posted_hours_ago("HackFest", 1))
        .await
        .unwrap();
    let without_link = env
        .listings
        .insert(Category::Hackathons, Listing::new("NoLink Jam", "", "N/A"))
        .await
        .unwrap();
    let server = env.server();
    common::register_member(&server, "asha@college.edu").await;

    let body: serde_json::Value = server
        .post(&format!("/apply/hackathon/{}", with_link.to_hex()))
        .await
        .json();
    assert_eq!(body["redirect_url"], "https://example.com/apply");

    let body: serde_json::Value = server
        .post(&format!("/apply/hackathon/{}", without_link.to_hex()))
        .await
        .json();
    assert_eq!(body["redirect_url"], "#");
}

#[tokio::test]
async fn filter_narrows_jobs() {
    let env = common::TestEnv::start();
    for (title, location, hours) in [
        ("Remote Rustaceans", "Remote", 2),
        ("Pune Systems", "Pune", 3),
        ("Old Remote Co", "Remote", 24 * 10),
    ] {
        let mut job = posted_hours_ago(title, hours);
        job.location = Some(location.to_string());
        env.listings.insert(Category::Jobs, job).await.unwrap();
    }
    let server = env.server_permissive();

    let body: serde_json::Value = server
        .get("/api/filter/jobs")
        .add_query_param("location", "remote")
        .add_query_param("date", "week")
        .await
        .json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Remote Rustaceans");

    server
        .get("/api/filter/websites")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn our_projects_lists_flagged_websites() {
    let env = common::TestEnv::start();
    let mut project = posted_hours_ago("Campus Notes", 1);
    project.is_project = true;
    env.listings.insert(Category::Websites, project).await.unwrap();
    env.listings
        .insert(Category::Websites, posted_hours_ago("Rust Book", 1))
        .await
        .unwrap();

    let body: serde_json::Value = env.server().get("/our-projects").await.json();
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Campus Notes"]);
}

#[tokio::test]
async fn unknown_routes_answer_json_404() {
    let env = common::TestEnv::start();
    let response = env.server_permissive().get("/no-such-page").await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Route not found");
}
