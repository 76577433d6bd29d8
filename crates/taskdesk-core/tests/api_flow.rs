mod support;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use chrono::{TimeZone, Utc};
use serde_json::json;
use support::{Recorder, reply, serve};
use taskdesk_core::api::{ApiClient, ClientSettings, TaskApi, WriteOutcome};
use taskdesk_core::auth::{AuthClient, Session};
use taskdesk_core::error::ApiError;
use taskdesk_core::model::{Priority, StatusRef, TaskDraft};

fn client(base: &str, session: Option<Session>) -> ApiClient {
    let settings = ClientSettings {
        api_url: format!("{base}/api"),
        timeout: Some(Duration::from_secs(5)),
    };
    ApiClient::new(&settings, session).expect("api client")
}

fn complete_draft() -> TaskDraft {
    TaskDraft {
        title: Some("Ship release".to_string()),
        description: Some("cut the tag".to_string()),
        status_id: Some(StatusRef::Text("2".to_string())),
        priority: Some(Priority::High),
        owner: Some("alice".to_string()),
        assigned: None,
        project_name: Some("apollo".to_string()),
        task_number: Some("AP-1".to_string()),
        due_date: Some(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn null_task_list_is_empty() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks",
        get(reply(rec.clone(), StatusCode::OK, "null")),
    ))
    .await;

    let tasks = client(&base, None).list_tasks().await.expect("list");
    assert!(tasks.is_empty());
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn task_fields_decode_leniently() {
    let rec = Recorder::new();
    let body = r#"[{
        "id": 1,
        "title": "Ship",
        "description": null,
        "status_id": "3",
        "priority": "urgent",
        "owner": "alice",
        "assigned": null,
        "project_name": "apollo",
        "task_number": "AP-1",
        "due_date": "2024-01-31T00:00:00.000Z",
        "created_at": "yesterday-ish"
    }]"#;
    let base = serve(Router::new().route(
        "/api/tasks",
        get(reply(rec.clone(), StatusCode::OK, body)),
    ))
    .await;

    let tasks = client(&base, None).list_tasks().await.expect("list");
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.status_id, 3);
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(task.description, "");
    assert_eq!(task.assigned, "");
    assert_eq!(
        task.due_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap())
    );
    assert_eq!(task.created_at, None);
}

#[tokio::test]
async fn failed_fetch_reports_status() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/statuses",
        get(reply(rec.clone(), StatusCode::INTERNAL_SERVER_ERROR, "boom")),
    ))
    .await;

    let err = client(&base, None).list_statuses().await.unwrap_err();
    match err {
        ApiError::Fetch { resource, status } => {
            assert_eq!(resource, "task statuses");
            assert_eq!(status.as_u16(), 500);
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn incomplete_create_never_reaches_the_server() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks",
        post(reply(rec.clone(), StatusCode::CREATED, "")),
    ))
    .await;

    let draft = TaskDraft {
        title: Some(String::new()),
        status_id: Some(StatusRef::Text("open".to_string())),
        ..complete_draft()
    };
    let err = client(&base, None).create_task(&draft).await.unwrap_err();
    match err {
        ApiError::MissingFields(fields) => assert_eq!(fields, vec!["title", "status_id"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(rec.hits(), 0);
}

#[tokio::test]
async fn empty_create_response_is_synthesized() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks",
        post(reply(rec.clone(), StatusCode::CREATED, "")),
    ))
    .await;

    let outcome = client(&base, None)
        .create_task(&complete_draft())
        .await
        .expect("create");
    match outcome {
        WriteOutcome::Synthesized { id, submitted } => {
            assert_eq!(id, None);
            assert_eq!(submitted.status_id, Some(StatusRef::Id(2)));
        }
        other => panic!("expected synthesized outcome, got {other:?}"),
    }

    let sent = rec.last_body_json();
    assert_eq!(sent["status_id"], json!(2));
    assert_eq!(sent["priority"], json!("high"));
    assert_eq!(sent["due_date"], json!("2024-01-31T00:00:00.000Z"));
    assert!(sent.get("assigned").is_none());
}

#[tokio::test]
async fn echoed_create_is_confirmed() {
    let rec = Recorder::new();
    let echoed = r#"{"id": 9, "title": "Ship release", "status_id": 2, "priority": "high",
        "owner": "alice", "project_name": "apollo", "task_number": "AP-1"}"#;
    let base = serve(Router::new().route(
        "/api/tasks",
        post(reply(rec.clone(), StatusCode::CREATED, echoed)),
    ))
    .await;

    let outcome = client(&base, None)
        .create_task(&complete_draft())
        .await
        .expect("create");
    match outcome {
        WriteOutcome::Confirmed(task) => {
            assert_eq!(task.id, 9);
            assert_eq!(task.status_id, 2);
        }
        other => panic!("expected confirmed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn partial_update_sends_only_set_fields() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks/{id}",
        put(reply(rec.clone(), StatusCode::OK, "")),
    ))
    .await;

    let draft = TaskDraft {
        priority: Some(Priority::Low),
        ..TaskDraft::default()
    };
    let outcome = client(&base, None)
        .update_task(7, &draft)
        .await
        .expect("update");
    assert_eq!(
        outcome,
        WriteOutcome::Synthesized {
            id: Some(7),
            submitted: draft,
        }
    );
    assert_eq!(rec.last_body_json(), json!({ "priority": "low" }));
}

#[tokio::test]
async fn rejected_update_and_delete_map_to_errors() {
    let rec = Recorder::new();
    let base = serve(
        Router::new()
            .route(
                "/api/tasks/{id}",
                put(reply(rec.clone(), StatusCode::BAD_REQUEST, "")),
            )
            .route(
                "/api/statuses/{id}",
                delete(reply(rec.clone(), StatusCode::NOT_FOUND, "")),
            ),
    )
    .await;
    let api = client(&base, None);

    let update = api.update_task(1, &TaskDraft::default()).await.unwrap_err();
    assert!(matches!(update, ApiError::Update { resource: "task", .. }));

    let removal = api.delete_status(4).await.unwrap_err();
    match removal {
        ApiError::Delete { resource, status } => {
            assert_eq!(resource, "task status");
            assert_eq!(status.as_u16(), 404);
        }
        other => panic!("expected delete error, got {other:?}"),
    }
}

#[tokio::test]
async fn single_records_decode_with_dates() {
    let rec = Recorder::new();
    let task_body = r#"{"id": 4, "title": "Plan", "status_id": 2, "priority": "low",
        "owner": "alice", "project_name": "apollo", "task_number": "AP-4",
        "due_date": "2024-01-01T00:00:00Z", "created_at": "2023-12-30"}"#;
    let status_body = r#"{"id": 2, "name": "Done", "updated_at": "2024-03-05T10:00:00+02:00"}"#;
    let base = serve(
        Router::new()
            .route(
                "/api/tasks/{id}",
                get(reply(rec.clone(), StatusCode::OK, task_body)),
            )
            .route(
                "/api/statuses/{id}",
                get(reply(rec.clone(), StatusCode::OK, status_body)),
            ),
    )
    .await;
    let api = client(&base, None);

    let task = api.get_task(4).await.expect("get task");
    assert_eq!(task.id, 4);
    assert_eq!(task.priority, Priority::Low);
    assert_eq!(
        task.due_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        task.created_at,
        Some(Utc.with_ymd_and_hms(2023, 12, 30, 0, 0, 0).unwrap())
    );

    let status = api.get_status(2).await.expect("get status");
    assert_eq!(status.name, "Done");
    assert_eq!(
        status.updated_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap())
    );
    assert_eq!(rec.hits(), 2);
}

#[tokio::test]
async fn missing_single_task_is_a_fetch_error() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks/{id}",
        get(reply(rec.clone(), StatusCode::NOT_FOUND, "")),
    ))
    .await;

    let err = client(&base, None).get_task(404).await.unwrap_err();
    match err {
        ApiError::Fetch { resource, status } => {
            assert_eq!(resource, "task");
            assert_eq!(status.as_u16(), 404);
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn echoed_update_is_confirmed() {
    let rec = Recorder::new();
    let echoed = r#"{"id": 7, "title": "Ship release", "status_id": "3", "priority": "low",
        "owner": "alice", "project_name": "apollo", "task_number": "AP-7"}"#;
    let base = serve(Router::new().route(
        "/api/tasks/{id}",
        put(reply(rec.clone(), StatusCode::OK, echoed)),
    ))
    .await;

    let draft = TaskDraft {
        priority: Some(Priority::Low),
        ..TaskDraft::default()
    };
    let outcome = client(&base, None)
        .update_task(7, &draft)
        .await
        .expect("update");
    match outcome {
        WriteOutcome::Confirmed(task) => {
            assert_eq!(task.id, 7);
            assert_eq!(task.status_id, 3);
            assert_eq!(task.priority, Priority::Low);
        }
        other => panic!("expected confirmed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_create_keeps_the_error_body() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks",
        post(reply(
            rec.clone(),
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"bad"}"#,
        )),
    ))
    .await;

    let err = client(&base, None)
        .create_task(&complete_draft())
        .await
        .unwrap_err();
    match err {
        ApiError::Create {
            resource,
            status,
            detail,
        } => {
            assert_eq!(resource, "task");
            assert_eq!(status.as_u16(), 422);
            assert_eq!(detail.as_deref(), Some(r#"{"error":"bad"}"#));
        }
        other => panic!("expected create error, got {other:?}"),
    }
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn successful_delete_needs_no_body() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks/{id}",
        delete(reply(rec.clone(), StatusCode::NO_CONTENT, "")),
    ))
    .await;

    client(&base, None).delete_task(3).await.expect("delete");
    assert_eq!(rec.hits(), 1);
}

#[tokio::test]
async fn status_rename_sends_name_and_reads_echo() {
    let echo_rec = Recorder::new();
    let echo_base = serve(Router::new().route(
        "/api/statuses/{id}",
        put(reply(
            echo_rec.clone(),
            StatusCode::OK,
            r#"{"id": 3, "name": "Waiting"}"#,
        )),
    ))
    .await;

    let confirmed = client(&echo_base, None)
        .update_status(3, "Waiting ")
        .await
        .expect("rename");
    match confirmed {
        WriteOutcome::Confirmed(status) => {
            assert_eq!(status.id, 3);
            assert_eq!(status.name, "Waiting");
        }
        other => panic!("expected confirmed outcome, got {other:?}"),
    }
    assert_eq!(echo_rec.last_body_json(), json!({ "name": "Waiting" }));

    let quiet_rec = Recorder::new();
    let quiet_base = serve(Router::new().route(
        "/api/statuses/{id}",
        put(reply(quiet_rec.clone(), StatusCode::OK, "")),
    ))
    .await;

    let synthesized = client(&quiet_base, None)
        .update_status(3, "Waiting")
        .await
        .expect("rename");
    assert_eq!(
        synthesized,
        WriteOutcome::Synthesized {
            id: Some(3),
            submitted: "Waiting".to_string(),
        }
    );
}

#[tokio::test]
async fn status_names_are_trimmed() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/statuses",
        post(reply(rec.clone(), StatusCode::CREATED, "")),
    ))
    .await;

    let outcome = client(&base, None)
        .create_status("  Done ")
        .await
        .expect("create status");
    assert_eq!(
        outcome,
        WriteOutcome::Synthesized {
            id: None,
            submitted: "Done".to_string(),
        }
    );
    assert_eq!(rec.last_body_json(), json!({ "name": "Done" }));
}

#[tokio::test]
async fn session_token_is_sent_as_bearer() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/api/tasks",
        get(reply(rec.clone(), StatusCode::OK, "[]")),
    ))
    .await;

    client(&base, None).list_tasks().await.expect("anonymous list");
    let session = Session {
        username: "alice".to_string(),
        token: "tok-1".to_string(),
    };
    client(&base, Some(session))
        .list_tasks()
        .await
        .expect("authenticated list");

    assert_eq!(
        rec.auth_headers(),
        vec![None, Some("Bearer tok-1".to_string())]
    );
}

#[tokio::test]
async fn login_returns_session() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/login",
        post(reply(rec.clone(), StatusCode::OK, r#"{"token":"abc"}"#)),
    ))
    .await;

    let auth = AuthClient::new(&base, None).expect("auth client");
    let session = auth.login("alice", "pw").await.expect("login");
    assert_eq!(session.username, "alice");
    assert_eq!(session.token, "abc");
    assert_eq!(
        rec.last_body_json(),
        json!({ "username": "alice", "password": "pw" })
    );
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let rec = Recorder::new();
    let base = serve(
        Router::new()
            .route(
                "/login",
                post(reply(rec.clone(), StatusCode::UNAUTHORIZED, r#"{"error":"nope"}"#)),
            )
            .route("/alt/login", post(reply(rec.clone(), StatusCode::OK, "{}"))),
    )
    .await;

    let rejected = AuthClient::new(&base, None)
        .expect("auth client")
        .login("alice", "wrong")
        .await
        .unwrap_err();
    assert_eq!(rejected.to_string(), "Incorrect username or password");

    let tokenless = AuthClient::new(&format!("{base}/alt/"), None)
        .expect("auth client")
        .login("alice", "pw")
        .await
        .unwrap_err();
    assert_eq!(tokenless.to_string(), "Incorrect username or password");
}

#[tokio::test]
async fn register_failure_carries_server_reason() {
    let rec = Recorder::new();
    let base = serve(Router::new().route(
        "/register",
        post(reply(
            rec.clone(),
            StatusCode::CONFLICT,
            r#"{"error":"username taken"}"#,
        )),
    ))
    .await;

    let err = AuthClient::new(&base, None)
        .expect("auth client")
        .register("alice", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Registration failed. username taken");
}
