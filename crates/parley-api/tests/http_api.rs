mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::json;

use common::TestApp;
use parley_types::models::Role;

#[tokio::test]
async fn health_is_public_everything_else_needs_a_token() {
    let app = TestApp::new();
    let health = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);

    let denied = app.call(Method::GET, "/threads", None, None).await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(denied.body["allowed"], json!(false));
    assert_eq!(denied.body["reason_code"], "unauthorized");
}

#[tokio::test]
async fn keyword_is_blocked_on_minor_threads_and_flagged_elsewhere() {
    let app = TestApp::new();
    let admin = app.onboarded(Role::Admin).await;
    let coach = app.onboarded(Role::Coach).await;
    let peer = app.onboarded(Role::Coach).await;
    let student = app.onboarded(Role::Student).await;

    let patched = app
        .call(
            Method::PATCH,
            "/messaging/policy",
            Some(&admin),
            Some(json!({ "guard_mode": "block", "sensitive_words": ["WhatsApp"] })),
        )
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["sensitive_words"], json!(["whatsapp"]));
    let seen = app.call(Method::GET, "/messaging/policy", Some(&student), None).await;
    assert_eq!(seen.status, StatusCode::OK);
    assert_eq!(seen.body["sensitive_words"], json!([]));
    assert_eq!(seen.body["guard_mode"], "block");

    let minor = app.direct_thread(&coach, &student).await;
    let blocked = app.send(&student, minor, "contact me on whatsapp").await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);
    assert_eq!(blocked.body["reason_code"], "content_blocked");
    assert_eq!(blocked.body["flag_types"], json!(["keyword"]));

    let adult = app.direct_thread(&coach, &peer).await;
    let sent = app.send(&peer, adult, "contact me on whatsapp").await;
    assert_eq!(sent.status, StatusCode::CREATED);

    let flags = app.call(Method::GET, "/moderation/flags", Some(&admin), None).await;
    assert_eq!(flags.status, StatusCode::OK);
    let flags = flags.body["flags"].as_array().unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0]["type"], "keyword");
    assert_eq!(flags[0]["matched_value"], "whatsapp");
    assert_eq!(flags[0]["thread_id"], json!(adult));
}

#[tokio::test]
async fn resolving_with_freeze_blocks_both_participants() {
    let app = TestApp::new();
    let admin = app.onboarded(Role::Admin).await;
    let coach = app.onboarded(Role::Coach).await;
    let student = app.onboarded(Role::Student).await;
    let thread = app.direct_thread(&coach, &student).await;
    assert_eq!(app.send(&coach, thread, "welcome!").await.status, StatusCode::CREATED);

    let report = app
        .call(
            Method::POST,
            "/moderation/reports",
            Some(&student),
            Some(json!({ "thread_id": thread, "reason": "made me uncomfortable" })),
        )
        .await;
    assert_eq!(report.status, StatusCode::CREATED);
    let report_id = report.body["id"].as_str().unwrap().to_string();

    let resolved = app
        .call(
            Method::PATCH,
            &format!("/moderation/reports/{report_id}"),
            Some(&admin),
            Some(json!({ "status": "resolved", "freeze_thread": true })),
        )
        .await;
    assert_eq!(resolved.status, StatusCode::OK, "{}", resolved.body);
    assert_eq!(resolved.body["status"], "resolved");
    assert_eq!(resolved.body["freeze_applied"], json!(true));

    let detail = app
        .call(Method::GET, &format!("/moderation/reports/{report_id}"), Some(&admin), None)
        .await;
    assert!(!detail.body["thread"]["frozen_at"].is_null());

    for who in [&coach, &student] {
        let denied = app.send(who, thread, "still there?").await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.body["reason_code"], "thread_frozen");

        let decision = app
            .call(Method::GET, &format!("/threads/{thread}/access?operation=write"), Some(who), None)
            .await;
        assert_eq!(decision.status, StatusCode::OK);
        assert_eq!(decision.body["allowed"], json!(false));
        assert_eq!(decision.body["http_status_hint"], 403);

        let read = app
            .call(Method::GET, &format!("/threads/{thread}/messages"), Some(who), None)
            .await;
        assert_eq!(read.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn uncharted_users_are_turned_away_until_they_accept() {
    let app = TestApp::new();
    let coach = app.onboarded(Role::Coach).await;
    let student = app.user(Role::Student);
    let thread = app.direct_thread(&coach, &student).await;

    let denied = app.send(&student, thread, "hi coach").await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["reason_code"], "charter_not_accepted");

    let wrong = app
        .call(
            Method::POST,
            "/messaging/charter/accept",
            Some(&student),
            Some(json!({ "charter_version": 7 })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::CONFLICT);

    let accepted = app
        .call(
            Method::POST,
            "/messaging/charter/accept",
            Some(&student),
            Some(json!({ "charter_version": 1 })),
        )
        .await;
    assert_eq!(accepted.body["must_accept"], json!(false));
    assert_eq!(app.send(&student, thread, "hi coach").await.status, StatusCode::CREATED);
}

#[tokio::test]
async fn sending_too_fast_is_rate_limited() {
    let app = TestApp::new();
    let coach = app.onboarded(Role::Coach).await;
    let student = app.onboarded(Role::Student).await;
    let thread = app.direct_thread(&coach, &student).await;

    for i in 0..30 {
        let reply = app.send(&coach, thread, &format!("note {i}")).await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }
    let limited = app.send(&coach, thread, "one more").await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = limited.body["retry_after_seconds"].as_u64().unwrap();
    assert!((1..=60).contains(&retry));
    assert_eq!(limited.headers[header::RETRY_AFTER], retry.to_string().as_str());

    app.clock.advance(chrono::Duration::seconds(61));
    assert_eq!(app.send(&coach, thread, "later").await.status, StatusCode::CREATED);
}

#[tokio::test]
async fn suspended_users_cannot_write_but_can_still_read_and_report() {
    let app = TestApp::new();
    let admin = app.onboarded(Role::Admin).await;
    let coach = app.onboarded(Role::Coach).await;
    let student = app.onboarded(Role::Student).await;
    let thread = app.direct_thread(&coach, &student).await;

    let suspended = app
        .call(
            Method::POST,
            "/moderation/suspensions",
            Some(&admin),
            Some(json!({ "user_id": student.id, "reason": "sharing contact details" })),
        )
        .await;
    assert_eq!(suspended.status, StatusCode::CREATED);

    let denied = app.send(&student, thread, "hello").await;
    assert_eq!(denied.body["reason_code"], "suspended");
    let read = app
        .call(Method::GET, &format!("/threads/{thread}/messages"), Some(&student), None)
        .await;
    assert_eq!(read.status, StatusCode::OK);
    let report = app
        .call(
            Method::POST,
            "/moderation/reports",
            Some(&student),
            Some(json!({ "thread_id": thread, "reason": "appeal" })),
        )
        .await;
    assert_eq!(report.status, StatusCode::CREATED);

    let id = suspended.body["id"].as_str().unwrap();
    let lifted = app
        .call(Method::POST, &format!("/moderation/suspensions/{id}/lift"), Some(&admin), None)
        .await;
    assert_eq!(lifted.status, StatusCode::OK);
    assert_eq!(app.send(&student, thread, "hello").await.status, StatusCode::CREATED);
}

#[tokio::test]
async fn contact_requests_answer_neutrally_and_open_threads() {
    let app = TestApp::new();
    let student = app.onboarded(Role::Student).await;
    let coach = app.onboarded(Role::Coach).await;

    let ghost = app
        .call(
            Method::POST,
            "/contacts",
            Some(&student),
            Some(json!({ "target_user_id": uuid::Uuid::new_v4() })),
        )
        .await;
    let real = app
        .call(
            Method::POST,
            "/contacts",
            Some(&student),
            Some(json!({ "target_user_id": coach.id, "note": "help with essays?" })),
        )
        .await;
    assert_eq!(ghost.status, StatusCode::ACCEPTED);
    assert_eq!(ghost.status, real.status);
    assert_eq!(ghost.body, real.body);

    let pending = app
        .state
        .db
        .pending_contact_request(app.org, student.id, coach.id)
        .unwrap()
        .unwrap();
    let answer = app
        .call(
            Method::POST,
            &format!("/contacts/{}/respond", pending.id),
            Some(&coach),
            Some(json!({ "accept": true })),
        )
        .await;
    assert_eq!(answer.status, StatusCode::OK);
    let thread = answer.body["thread_id"].as_str().unwrap().to_string();

    let listed = app.call(Method::GET, "/threads", Some(&student), None).await;
    assert_eq!(listed.body[0]["id"], thread.as_str());
    assert_eq!(listed.body[0]["kind"], "student_coach");
}

#[tokio::test]
async fn malformed_bodies_are_rejected() {
    let app = TestApp::new();
    let coach = app.onboarded(Role::Coach).await;
    let student = app.onboarded(Role::Student).await;
    let thread = app.direct_thread(&coach, &student).await;

    let empty = app.send(&coach, thread, "   ").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["reason_code"], "body_empty");

    let long = app.send(&coach, thread, &"a".repeat(2001)).await;
    assert_eq!(long.body["reason_code"], "body_too_long");

    let unknown = app
        .call(Method::GET, &format!("/threads/{}/messages", uuid::Uuid::new_v4()), Some(&coach), None)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}
