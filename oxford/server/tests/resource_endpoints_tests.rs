use axum::http::StatusCode;

mod common;

use common::{form, get, send, sign_in, test_app};

const MEMBER: &[(&str, &str)] = &[
    ("name", "Jordan Smith"),
    ("phone", "555-0100"),
    ("clean_date", "2024-03-01"),
    ("move_in_date", "2024-06-15"),
    ("role", "Treasurer"),
    ("status", "Active"),
    ("form_of_pay", "Cash"),
    ("dues_paid", "true"),
];

#[tokio::test]
async fn member_with_missing_fields_is_sent_back_to_the_form() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(
        &app,
        form("POST", "/members", &cookie, &[("name", "Jordan Smith")]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("hx-retarget"), Some("#modal"));
    assert!(response.body.contains("Phone Number is required"));
    assert!(response.body.contains("Move-in Date is required"));
    assert!(response.body.contains("value=\"Jordan Smith\""));

    let list = send(&app, get("/members/table", &cookie)).await;
    assert!(!list.body.contains("Jordan Smith"));
}

#[tokio::test]
async fn members_can_be_added_edited_and_deleted() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let created = send(&app, form("POST", "/members", &cookie, MEMBER)).await;
    assert_eq!(created.status, StatusCode::OK);
    assert!(created.body.contains("Jordan Smith"));
    assert!(created.body.contains("Member added"));
    assert!(created.body.contains("id=\"modal\" hx-swap-oob"));

    let edit_form = send(&app, get("/members/1/edit", &cookie)).await;
    assert_eq!(edit_form.status, StatusCode::OK);
    assert!(edit_form.body.contains("hx-put=\"/members/1\""));
    assert!(edit_form.body.contains("value=\"Treasurer\" selected"));

    let mut renamed = MEMBER.to_vec();
    renamed[0] = ("name", "Jordan Smith-Lee");
    let updated = send(&app, form("PUT", "/members/1", &cookie, &renamed)).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert!(updated.body.contains("Jordan Smith-Lee"));
    assert!(updated.body.contains("Member updated"));

    let declined = send(&app, form("DELETE", "/members/1", &cookie, &[])).await;
    assert_eq!(declined.status, StatusCode::NO_CONTENT);
    let list = send(&app, get("/members/table", &cookie)).await;
    assert!(list.body.contains("Jordan Smith-Lee"));

    let deleted = send(
        &app,
        form("DELETE", "/members/1?confirmed=true", &cookie, &[]),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert!(deleted.body.contains("Member deleted"));
    assert!(!deleted.body.contains("Jordan Smith-Lee"));
}

#[tokio::test]
async fn editing_an_unknown_row_is_not_found() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(&app, get("/members/42/edit", &cookie)).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.header("hx-retarget"), Some("#notice"));
}

#[tokio::test]
async fn president_tasks_toggle_between_open_and_done() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let created = send(
        &app,
        form(
            "POST",
            "/president",
            &cookie,
            &[("title", "Call the landlord"), ("due_date", "2025-02-01")],
        ),
    )
    .await;
    assert!(created.body.contains("Call the landlord"));
    assert!(created.body.contains("Task added"));

    let toggled = send(
        &app,
        form("POST", "/president/1/toggle?show=all", &cookie, &[]),
    )
    .await;
    assert_eq!(toggled.status, StatusCode::OK);
    assert!(toggled.body.contains("Marked complete"));
    assert!(toggled.body.contains("class=\"done\""));

    // Done tasks are hidden from the default view.
    let open = send(&app, get("/president/table", &cookie)).await;
    assert!(!open.body.contains("Call the landlord"));
    let done = send(&app, get("/president/table?show=done", &cookie)).await;
    assert!(done.body.contains("Call the landlord"));
}

#[tokio::test]
async fn tasks_need_a_title_and_due_date() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(
        &app,
        form("POST", "/hsr", &cookie, &[("title", "Visit the chapter")]),
    )
    .await;

    assert_eq!(response.header("hx-retarget"), Some("#modal"));
    assert!(response.body.contains("Title and due date are required"));
}

#[tokio::test]
async fn finalized_minutes_cannot_be_changed() {
    let app = test_app();
    let cookie = sign_in(&app).await;
    let minutes = [
        ("meeting_date", "2025-01-12"),
        ("secretary_name", "Sam Rivera"),
        ("tradition_read", "true"),
        ("finalized", "true"),
    ];

    let created = send(&app, form("POST", "/secretary", &cookie, &minutes)).await;
    assert!(created.body.contains("Meeting added"));

    let edit_form = send(&app, get("/secretary/1/edit", &cookie)).await;
    assert!(edit_form.body.contains("finalized and can no longer be edited"));

    let update = send(
        &app,
        form(
            "PUT",
            "/secretary/1",
            &cookie,
            &[("meeting_date", "2025-01-19"), ("secretary_name", "Sam Rivera")],
        ),
    )
    .await;
    assert_eq!(update.status, StatusCode::CONFLICT);
    assert_eq!(update.header("hx-retarget"), Some("#notice"));

    let list = send(&app, get("/secretary/table", &cookie)).await;
    assert!(list.body.contains("2025-01-12"));
    assert!(!list.body.contains("2025-01-19"));
}

#[tokio::test]
async fn minutes_export_as_pdf() {
    let app = test_app();
    let cookie = sign_in(&app).await;
    send(
        &app,
        form(
            "POST",
            "/secretary",
            &cookie,
            &[("meeting_date", "2025-01-12"), ("secretary_name", "Sam Rivera")],
        ),
    )
    .await;

    let saved = send(&app, get("/secretary/1/pdf", &cookie)).await;
    assert_eq!(saved.status, StatusCode::OK);
    assert_eq!(saved.header("content-type"), Some("application/pdf"));
    assert_eq!(
        saved.header("content-disposition"),
        Some("attachment; filename=\"Meeting_Minutes_2025-01-12.pdf\"")
    );
    assert!(saved.body.starts_with("%PDF-1.4"));

    let draft = send(
        &app,
        form("POST", "/secretary/pdf", &cookie, &[("purpose", "Weekly business")]),
    )
    .await;
    assert_eq!(
        draft.header("content-disposition"),
        Some("attachment; filename=\"Meeting_Minutes_Draft.pdf\"")
    );
}

#[tokio::test]
async fn treasurer_reports_stay_within_the_house() {
    let app = test_app();
    let cookie = sign_in(&app).await;
    let report = [
        ("week_start", "2025-01-06"),
        ("week_end", "2025-01-12"),
        ("beginning_balance", "1200.50"),
        ("total_received", "400"),
        ("total_spent", "150.25"),
        ("ending_balance", "1450.25"),
    ];

    let created = send(&app, form("POST", "/treasurer", &cookie, &report)).await;

    assert!(created.body.contains("Report added"));
    assert!(created.body.contains("1200.5"));
    assert!(created.body.contains("2025-01-06"));
}

#[tokio::test]
async fn documentation_lists_documents_by_role() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let page = send(&app, get("/documentation", &cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Comptroller"));
    assert!(page.body.contains("Weekly Financial Report"));

    let search = send(&app, get("/documentation/search?q=audit", &cookie)).await;
    assert!(search.body.contains("Financial Audit Checklist"));
    assert!(!search.body.contains("Meeting Agenda"));
}
