use axum::http::{Method, StatusCode};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use crate::db::types::{ClassRole, SubmissionStatus};
use crate::test_support;

fn task_payload() -> serde_json::Value {
    let now = OffsetDateTime::now_utc().replace_nanosecond(0).expect("nanoseconds");
    let due_date = (now + Duration::days(7)).format(&Rfc3339).unwrap();

    json!({
        "title": "Algebra homework",
        "description": "Weekly practice set",
        "due_date": due_date,
        "questions": [
            {
                "position": 1,
                "kind": "multiple_choice",
                "prompt": "What is 2 + 2?",
                "points": 10.0,
                "options": [
                    {"text": "3"},
                    {"text": "4", "is_correct": true}
                ]
            },
            {
                "position": 2,
                "kind": "essay",
                "prompt": "Explain your reasoning",
                "points": 10.0
            }
        ]
    })
}

async fn create_published_task(
    app: axum::Router,
    token: &str,
    class_id: &str,
) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/classes/{class_id}/tasks"),
            Some(token),
            Some(task_payload()),
        ))
        .await
        .expect("create task");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let task_id = created["id"].as_str().expect("task id");

    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/publish"),
            Some(token),
            None,
        ))
        .await
        .expect("publish task");

    let status = response.status();
    let published = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {published}");
    published
}

fn question_id(task: &serde_json::Value, kind: &str) -> String {
    task["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .find(|question| question["kind"] == kind)
        .expect("question by kind")["id"]
        .as_str()
        .expect("question id")
        .to_string()
}

fn option_id(task: &serde_json::Value, text: &str) -> String {
    task["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .filter_map(|question| question["options"].as_array())
        .flatten()
        .find(|option| option["text"] == text)
        .expect("option by text")["id"]
        .as_str()
        .expect("option id")
        .to_string()
}

async fn start_submission(app: axum::Router, token: &str, task_id: &str) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(token),
            None,
        ))
        .await
        .expect("start submission");

    let status = response.status();
    let submission = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {submission}");
    submission
}

async fn record_answer(
    app: axum::Router,
    token: &str,
    submission_id: &str,
    question_id: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{question_id}"),
            Some(token),
            Some(body),
        ))
        .await
        .expect("record answer");

    let status = response.status();
    let answer = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {answer}");
    answer
}

async fn submit_submission(
    app: axum::Router,
    token: &str,
    submission_id: &str,
) -> serde_json::Value {
    let response = app
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(token),
            Some(json!({"status": "submitted"})),
        ))
        .await
        .expect("submit submission");

    let status = response.status();
    let submission = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {submission}");
    submission
}

#[tokio::test]
async fn start_submission_is_idempotent_per_student() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("first start");

    let status = response.status();
    let first = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {first}");
    assert_eq!(first["status"], "in_progress");
    assert_eq!(first["task_id"], task_id);
    assert_eq!(first["student_id"], student.id);
    let submission_id = first["id"].as_str().expect("submission id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("second start");

    let status = response.status();
    let second = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {second}");
    assert_eq!(second["id"], submission_id);

    let stored: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE task_id = $1 AND student_id = $2",
    )
    .bind(task_id)
    .bind(&student.id)
    .fetch_one(ctx.state.db())
    .await
    .expect("count submissions");
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn start_submission_requires_active_enrollment() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let outsider = test_support::insert_user(
        ctx.state.db(),
        "outsider@example.com",
        "Outsider User",
        "outsider-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "physics-8c",
        "Physics 8C",
        &teacher.id,
    )
    .await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let outsider_token = test_support::bearer_token(&outsider.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&outsider_token),
            None,
        ))
        .await
        .expect("outsider start");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {error}");
    assert_eq!(error["error"], "forbidden");
    assert_eq!(error["detail"], "Only enrolled students can work on this task");

    // The teacher role grants no access to the student surface either.
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("teacher start");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {error}");
}

#[tokio::test]
async fn unpublished_task_stays_hidden_from_students() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "history-9b",
        "History 9B",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/classes/{}/tasks", class.id),
            Some(&teacher_token),
            Some(task_payload()),
        ))
        .await
        .expect("create task");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let task_id = created["id"].as_str().expect("task id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("start before publish");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "response: {error}");
    assert_eq!(error["detail"], "Task not found");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/publish"),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("publish task");

    let status = response.status();
    let published = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {published}");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("start after publish");

    let status = response.status();
    let submission = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {submission}");
}

#[tokio::test]
async fn record_answer_replaces_previous_choice() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let wrong_option = option_id(&task, "3");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    let first = record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": wrong_option}),
    )
    .await;
    assert_eq!(first["chosen_option_id"], wrong_option);

    let second = record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    assert_eq!(second["chosen_option_id"], right_option);
    assert_eq!(second["id"], first["id"]);

    let answer_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM answers WHERE submission_id = $1 AND question_id = $2",
    )
    .bind(submission_id)
    .bind(&choice_question)
    .fetch_one(ctx.state.db())
    .await
    .expect("count answers");
    assert_eq!(answer_rows, 1);

    let stored_choice: Option<String> = sqlx::query_scalar(
        "SELECT chosen_option_id FROM answers WHERE submission_id = $1 AND question_id = $2",
    )
    .bind(submission_id)
    .bind(&choice_question)
    .fetch_one(ctx.state.db())
    .await
    .expect("stored choice");
    assert_eq!(stored_choice.as_deref(), Some(right_option.as_str()));
}

#[tokio::test]
async fn record_answer_rejects_mismatched_payloads() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "chemistry-10a",
        "Chemistry 10A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{essay_question}"),
            Some(&student_token),
            Some(json!({"chosen_option_id": option_id(&task, "4")})),
        ))
        .await
        .expect("option on essay");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert_eq!(error["detail"], "Essay answers carry exactly a non-empty response_text");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{choice_question}"),
            Some(&student_token),
            Some(json!({"response_text": "four"})),
        ))
        .await
        .expect("text on multiple choice");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert_eq!(error["detail"], "Multiple choice answers carry exactly a chosen_option_id");

    let foreign_option = Uuid::new_v4().to_string();
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{choice_question}"),
            Some(&student_token),
            Some(json!({"chosen_option_id": foreign_option})),
        ))
        .await
        .expect("foreign option");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert_eq!(error["detail"], "Option does not belong to this question");

    let unknown_question = Uuid::new_v4().to_string();
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{unknown_question}"),
            Some(&student_token),
            Some(json!({"response_text": "four"})),
        ))
        .await
        .expect("unknown question");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "response: {error}");
    assert_eq!(error["detail"], "Question not found in this task");
}

#[tokio::test]
async fn submitted_work_is_frozen() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &essay_question,
        json!({"response_text": "Two plus two gives four"}),
    )
    .await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(&student_token),
            Some(json!({"status": "graded"})),
        ))
        .await
        .expect("self grade attempt");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert_eq!(error["detail"], "The only accepted status change is to 'submitted'");

    let submitted = submit_submission(ctx.app.clone(), &student_token, submission_id).await;
    assert_eq!(submitted["status"], "submitted");
    assert!(submitted["submitted_at"].is_string(), "response: {submitted}");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/submissions/{submission_id}/answers/{choice_question}"),
            Some(&student_token),
            Some(json!({"chosen_option_id": option_id(&task, "3")})),
        ))
        .await
        .expect("edit after submit");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {error}");
    assert_eq!(error["error"], "conflict");
    assert_eq!(
        error["detail"],
        "answers can only be recorded while the submission is in progress"
    );

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(&student_token),
            Some(json!({"status": "submitted"})),
        ))
        .await
        .expect("second submit");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {error}");
    assert_eq!(error["detail"], "submission has already been submitted");
}

#[tokio::test]
async fn submit_reports_unanswered_positions() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/submissions/{submission_id}"),
            Some(&student_token),
            Some(json!({"status": "submitted"})),
        ))
        .await
        .expect("incomplete submit");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "response: {error}");
    assert_eq!(error["error"], "incomplete");
    assert_eq!(error["detail"], "Unanswered questions at positions: 2");

    let stored: SubmissionStatus = sqlx::query_scalar("SELECT status FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("submission status");
    assert_eq!(stored, SubmissionStatus::InProgress);
}

#[tokio::test]
async fn submission_after_due_date_lands_late() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "geometry-8a",
        "Geometry 8A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &essay_question,
        json!({"response_text": "Two plus two gives four"}),
    )
    .await;

    let past_offset = OffsetDateTime::now_utc() - Duration::hours(2);
    let past = PrimitiveDateTime::new(past_offset.date(), past_offset.time());
    sqlx::query("UPDATE tasks SET due_date = $1 WHERE id = $2")
        .bind(past)
        .bind(task_id)
        .execute(ctx.state.db())
        .await
        .expect("backdate due date");

    let submitted = submit_submission(ctx.app, &student_token, submission_id).await;
    assert_eq!(submitted["status"], "submitted_late");

    let stored: SubmissionStatus = sqlx::query_scalar("SELECT status FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("submission status");
    assert_eq!(stored, SubmissionStatus::SubmittedLate);
}

#[tokio::test]
async fn grading_requires_submitted_work() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/grade"),
            Some(&teacher_token),
            Some(json!({"scores": {}})),
        ))
        .await
        .expect("grade in progress");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {error}");
    assert_eq!(error["error"], "conflict");
    assert_eq!(error["detail"], "only submitted work can be graded");
}

#[tokio::test]
async fn grade_rejects_invalid_manual_scores() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &essay_question,
        json!({"response_text": "Two plus two gives four"}),
    )
    .await;
    submit_submission(ctx.app.clone(), &student_token, submission_id).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/grade"),
            Some(&teacher_token),
            Some(json!({"scores": {essay_question.as_str(): 15.0}})),
        ))
        .await
        .expect("score above points");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert!(error["detail"].as_str().unwrap_or("").contains("is outside 0..=10"));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/grade"),
            Some(&teacher_token),
            Some(json!({
                "scores": {
                    choice_question.as_str(): 5.0,
                    essay_question.as_str(): 7.0
                }
            })),
        ))
        .await
        .expect("manual score for choice question");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert!(error["detail"].as_str().unwrap_or("").contains("scored automatically"));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/grade"),
            Some(&teacher_token),
            Some(json!({"scores": {}})),
        ))
        .await
        .expect("missing essay score");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert!(error["detail"].as_str().unwrap_or("").contains("requires a manual score"));

    let stored: SubmissionStatus = sqlx::query_scalar("SELECT status FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("submission status");
    assert_eq!(stored, SubmissionStatus::Submitted);

    let total: Option<f64> = sqlx::query_scalar("SELECT total_score FROM submissions WHERE id = $1")
        .bind(submission_id)
        .fetch_one(ctx.state.db())
        .await
        .expect("total score");
    assert_eq!(total, None);
}

#[tokio::test]
async fn regrade_requires_graded_work() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "biology-11b",
        "Biology 11B",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &essay_question,
        json!({"response_text": "Two plus two gives four"}),
    )
    .await;
    submit_submission(ctx.app.clone(), &student_token, submission_id).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/regrade"),
            Some(&teacher_token),
            Some(json!({"scores": {essay_question.as_str(): 9.0}})),
        ))
        .await
        .expect("regrade before grade");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {error}");
    assert_eq!(error["detail"], "only graded work can be regraded");
}

#[tokio::test]
async fn full_flow_start_answer_submit_grade_regrade() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@example.com",
        "Student User",
        "student-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "algebra-7a",
        "Algebra 7A",
        &teacher.id,
    )
    .await;
    test_support::add_class_role(ctx.state.db(), &class.id, &student.id, ClassRole::Student).await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");
    let choice_question = question_id(&task, "multiple_choice");
    let essay_question = question_id(&task, "essay");
    let right_option = option_id(&task, "4");

    let submission = start_submission(ctx.app.clone(), &student_token, task_id).await;
    let submission_id = submission["id"].as_str().expect("submission id");

    let choice_answer = record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &choice_question,
        json!({"chosen_option_id": right_option}),
    )
    .await;
    assert_eq!(choice_answer["chosen_option_id"], right_option);

    record_answer(
        ctx.app.clone(),
        &student_token,
        submission_id,
        &essay_question,
        json!({"response_text": "Two plus two gives four"}),
    )
    .await;

    let submitted = submit_submission(ctx.app.clone(), &student_token, submission_id).await;
    assert_eq!(submitted["status"], "submitted");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/grade"),
            Some(&teacher_token),
            Some(json!({
                "scores": {essay_question.as_str(): 7.0},
                "question_feedback": {essay_question.as_str(): "Solid reasoning"},
                "teacher_feedback": "Good work"
            })),
        ))
        .await
        .expect("grade submission");

    let status = response.status();
    let graded = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {graded}");
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["total_score"], 17.0);
    assert_eq!(graded["graded_by"], teacher.id);
    assert_eq!(graded["teacher_feedback"], "Good work");
    assert_eq!(graded["outcome"]["total_score"], 17.0);
    assert_eq!(graded["outcome"]["correct_count"], 1);
    assert_eq!(graded["outcome"]["per_question_scores"][choice_question.as_str()], 10.0);
    assert_eq!(graded["outcome"]["per_question_scores"][essay_question.as_str()], 7.0);

    let answers = graded["answers"].as_array().expect("answers");
    let essay_answer = answers
        .iter()
        .find(|answer| answer["question_id"].as_str() == Some(essay_question.as_str()))
        .expect("essay answer");
    assert_eq!(essay_answer["score"], 7.0);
    assert_eq!(essay_answer["feedback"], "Solid reasoning");

    let events = graded["grade_events"].as_array().expect("grade events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["previous_status"], "submitted");
    assert!(events[0]["previous_total"].is_null());
    assert_eq!(events[0]["new_total"], 17.0);
    assert_eq!(events[0]["actor_id"], teacher.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/submissions/{submission_id}/regrade"),
            Some(&teacher_token),
            Some(json!({"scores": {essay_question.as_str(): 9.0}})),
        ))
        .await
        .expect("regrade submission");

    let status = response.status();
    let regraded = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {regraded}");
    assert_eq!(regraded["status"], "graded");
    assert_eq!(regraded["total_score"], 19.0);

    let events = regraded["grade_events"].as_array().expect("grade events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["previous_status"], "graded");
    assert_eq!(events[1]["previous_total"], 17.0);
    assert_eq!(events[1]["new_total"], 19.0);

    let recorded: Vec<f64> = sqlx::query_scalar(
        "SELECT new_total FROM grade_events WHERE submission_id = $1 ORDER BY created_at, id",
    )
    .bind(submission_id)
    .fetch_all(ctx.state.db())
    .await
    .expect("grade event totals");
    assert_eq!(recorded, vec![17.0, 19.0]);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/tasks/{task_id}/submissions/mine"),
            Some(&student_token),
            None,
        ))
        .await
        .expect("student view");

    let status = response.status();
    let mine = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {mine}");
    assert_eq!(mine["status"], "graded");
    assert_eq!(mine["total_score"], 19.0);
    assert_eq!(mine["outcome"]["total_score"], 19.0);
    assert!(mine["grade_events"].is_null(), "response: {mine}");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/tasks/{task_id}/report"),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("task report");

    let status = response.status();
    let report = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {report}");
    assert_eq!(report["graded_count"], 1);
    assert_eq!(report["points"], 20.0);
    assert_eq!(report["average_score"], 19.0);

    let rows = report["submissions"].as_array().expect("report rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["student_email"], "student@example.com");
    assert_eq!(rows[0]["total_score"], 19.0);
    assert_eq!(rows[0]["correct_count"], 1);
    assert_eq!(rows[0]["percent"], 95.0);
}

#[tokio::test]
async fn invite_code_join_unlocks_task_access() {
    let Some(ctx) = test_support::setup_test_context().await else { return };

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@example.com",
        "Teacher User",
        "teacher-pass",
    )
    .await;
    let newcomer = test_support::insert_user(
        ctx.state.db(),
        "newcomer@example.com",
        "Newcomer User",
        "newcomer-pass",
    )
    .await;
    let class = test_support::create_class_with_teacher(
        ctx.state.db(),
        "literature-7b",
        "Literature 7B",
        &teacher.id,
    )
    .await;

    let teacher_token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let newcomer_token = test_support::bearer_token(&newcomer.id, ctx.state.settings());

    let task = create_published_task(ctx.app.clone(), &teacher_token, &class.id).await;
    let task_id = task["id"].as_str().expect("task id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/tasks/{task_id}/submissions"),
            Some(&newcomer_token),
            None,
        ))
        .await
        .expect("start before join");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {error}");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/classes/{}/invite-code", class.id),
            Some(&teacher_token),
            None,
        ))
        .await
        .expect("rotate invite code");

    let status = response.status();
    let invite = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {invite}");
    let code = invite["code"].as_str().expect("invite code").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/classes/join",
            Some(&newcomer_token),
            Some(json!({"code": "not-a-real-code"})),
        ))
        .await
        .expect("join with bad code");

    let status = response.status();
    let error = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {error}");
    assert_eq!(error["detail"], "Invalid invite code");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/classes/join",
            Some(&newcomer_token),
            Some(json!({"code": code})),
        ))
        .await
        .expect("join with invite code");

    let status = response.status();
    let joined = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {joined}");
    assert_eq!(joined["class_id"], class.id);
    assert_eq!(joined["role"], "student");

    let submission = start_submission(ctx.app.clone(), &newcomer_token, task_id).await;
    assert_eq!(submission["status"], "in_progress");
    assert_eq!(submission["student_id"], newcomer.id);
}
