//! Competition and registration flows through the HTTP API.

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

mod common;
use common::{body_json, call, portal, TestPortal, ADMIN_TOKEN, INSTRUCTOR_TOKEN, STUDENT_EMAIL, STUDENT_TOKEN};

const MISSING_ID: &str = "9a1f2c3d-4e5f-4a6b-8c7d-0e1f2a3b4c5d";

async fn create(portal: &TestPortal, token: &str, body: Value) -> Value {
    let res = call(Method::POST, "/api/competitions")
        .token(token)
        .json(body)
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["competition"].clone()
}

fn open_competition(title: &str) -> Value {
    json!({
        "title": title,
        "category": "science",
        "organizer": "Dinas Pendidikan",
        "registration_deadline": (Utc::now() + Duration::days(14)).to_rfc3339(),
        "start_date": "2030-03-01",
        "end_date": "2030-03-03",
        "max_participants": 50
    })
}

fn registration_for(competition_id: &str) -> Value {
    json!({
        "competition_id": competition_id,
        "full_name": "Siti Rahma",
        "institution": "SMA 1 Bandung"
    })
}

#[tokio::test]
async fn test_create_requires_title_before_any_write() {
    let portal = portal();

    let res = call(Method::POST, "/api/competitions")
        .token(ADMIN_TOKEN)
        .json(json!({ "category": "math" }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Title is required");
    assert_eq!(portal.store.competition_count(), 0);

    let res = call(Method::POST, "/api/competitions")
        .token(ADMIN_TOKEN)
        .json(json!({ "title": "Cup", "start_date": "2030-05-10", "end_date": "2030-05-01" }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(portal.store.competition_count(), 0);
}

#[tokio::test]
async fn test_create_requires_staff() {
    let portal = portal();

    let res = call(Method::POST, "/api/competitions")
        .json(open_competition("Robotics"))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = call(Method::POST, "/api/competitions")
        .token(STUDENT_TOKEN)
        .json(open_competition("Robotics"))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(portal.store.competition_count(), 0);

    // Privileged email with a student profile counts as staff.
    let competition = create(&portal, INSTRUCTOR_TOKEN, open_competition("Robotics")).await;
    assert_eq!(competition["title"], "Robotics");
    assert_eq!(competition["created_by"], common::INSTRUCTOR_ID);
}

#[tokio::test]
async fn test_listing_and_filters() {
    let portal = portal();
    create(&portal, ADMIN_TOKEN, open_competition("Physics Olympiad")).await;
    let mut art = open_competition("Poster Design");
    art["category"] = json!("art");
    art["registration_deadline"] = json!((Utc::now() + Duration::days(3)).to_rfc3339());
    create(&portal, ADMIN_TOKEN, art).await;

    let res = call(Method::GET, "/api/competitions").send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let titles: Vec<&str> = body["competitions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Poster Design", "Physics Olympiad"]);

    let res = call(Method::GET, "/api/competitions?category=art").send(&portal.router).await;
    assert_eq!(body_json(res).await["competitions"].as_array().unwrap().len(), 1);

    let res = call(Method::GET, "/api/competitions?search=olymp").send(&portal.router).await;
    let body = body_json(res).await;
    assert_eq!(body["competitions"][0]["title"], "Physics Olympiad");
    assert_eq!(body["competitions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_update_delete() {
    let portal = portal();
    let competition = create(&portal, ADMIN_TOKEN, open_competition("Debate")).await;
    let id = competition["id"].as_str().unwrap().to_string();
    let uri = format!("/api/competitions/{}", id);

    let res = call(Method::GET, &uri).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["competition"]["title"], "Debate");

    let res = call(Method::PUT, &uri)
        .token(STUDENT_TOKEN)
        .json(json!({ "title": "Hijacked" }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = call(Method::PUT, &uri)
        .token(ADMIN_TOKEN)
        .json(json!({ "title": "Debate Championship", "location": "Jakarta" }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = body_json(res).await["competition"].clone();
    assert_eq!(updated["title"], "Debate Championship");
    assert_eq!(updated["location"], "Jakarta");
    assert_eq!(updated["organizer"], "Dinas Pendidikan");

    let res = call(Method::DELETE, &uri).token(ADMIN_TOKEN).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "success": true }));

    let res = call(Method::GET, &uri).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = call(Method::DELETE, &uri).token(ADMIN_TOKEN).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_and_unknown_ids() {
    let portal = portal();

    let res = call(Method::GET, "/api/competitions/not-a-uuid").send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = call(Method::GET, &format!("/api/competitions/{}", MISSING_ID))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_json(res).await["error"].is_string());

    let res = call(Method::GET, "/api/nothing-here").send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_and_duplicates() {
    let portal = portal();
    let competition = create(&portal, ADMIN_TOKEN, open_competition("Chemistry")).await;
    let id = competition["id"].as_str().unwrap();

    let res = call(Method::POST, "/api/competitions/register")
        .json(registration_for(id))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(registration_for(id))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let registration = body_json(res).await["registration"].clone();
    assert_eq!(registration["status"], "pending");
    assert_eq!(registration["email"], STUDENT_EMAIL);

    // Same address in a different case is still a duplicate.
    let mut again = registration_for(id);
    again["email"] = json!("Siswa@Example.com");
    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(again)
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(portal.store.registration_count(), 1);
}

#[tokio::test]
async fn test_registration_rejections() {
    let portal = portal();

    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(registration_for(MISSING_ID))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let mut closed = open_competition("Closed Cup");
    closed["registration_deadline"] = json!((Utc::now() - Duration::hours(1)).to_rfc3339());
    let competition = create(&portal, ADMIN_TOKEN, closed).await;
    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(registration_for(competition["id"].as_str().unwrap()))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(json!({ "competition_id": MISSING_ID }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(portal.store.registration_count(), 0);
}

#[tokio::test]
async fn test_review_flow() {
    let portal = portal();
    let competition = create(&portal, ADMIN_TOKEN, open_competition("Coding Camp")).await;
    let competition_id = competition["id"].as_str().unwrap();

    let res = call(Method::POST, "/api/competitions/register")
        .token(STUDENT_TOKEN)
        .json(registration_for(competition_id))
        .send(&portal.router)
        .await;
    let registration = body_json(res).await["registration"].clone();
    let approve_uri = format!("/api/registrations/{}/approve", registration["id"].as_str().unwrap());

    let res = call(Method::PUT, &approve_uri).token(STUDENT_TOKEN).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = call(Method::PUT, &approve_uri).token(INSTRUCTOR_TOKEN).send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::OK);
    let reviewed = body_json(res).await["registration"].clone();
    assert_eq!(reviewed["status"], "approved");
    assert_eq!(reviewed["reviewed_by"], common::INSTRUCTOR_ID);

    let res = call(Method::PUT, &approve_uri)
        .token(ADMIN_TOKEN)
        .json(json!({ "status": "rejected" }))
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["registration"]["status"], "rejected");

    let res = call(Method::PUT, &format!("/api/registrations/{}/approve", MISSING_ID))
        .token(ADMIN_TOKEN)
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_visibility() {
    let portal = portal();
    let competition = create(&portal, ADMIN_TOKEN, open_competition("Essay Contest")).await;
    let competition_id = competition["id"].as_str().unwrap();

    for token in [STUDENT_TOKEN, INSTRUCTOR_TOKEN] {
        let res = call(Method::POST, "/api/competitions/register")
            .token(token)
            .json(registration_for(competition_id))
            .send(&portal.router)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = call(Method::GET, "/api/registrations").send(&portal.router).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = call(Method::GET, "/api/registrations").token(STUDENT_TOKEN).send(&portal.router).await;
    let mine = body_json(res).await["registrations"].clone();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["email"], STUDENT_EMAIL);

    let uri = format!("/api/registrations?competition_id={}&status=pending", competition_id);
    let res = call(Method::GET, &uri).token(ADMIN_TOKEN).send(&portal.router).await;
    assert_eq!(body_json(res).await["registrations"].as_array().unwrap().len(), 2);

    let res = call(Method::GET, "/api/registrations?status=approved")
        .token(ADMIN_TOKEN)
        .send(&portal.router)
        .await;
    assert!(body_json(res).await["registrations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_query_string_uses_error_envelope() {
    let portal = portal();

    let res = call(Method::GET, "/api/registrations?status=bogus")
        .token(STUDENT_TOKEN)
        .send(&portal.router)
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body = body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("bogus"));
}
