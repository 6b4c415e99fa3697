//! Persona and phishing case management through the admin router.

mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

use mung_integration_tests::FakeBackend;

fn backup_part(body: &Value) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(body.to_string().into_bytes())
            .file_name("backup.json")
            .mime_type("application/json"),
    )
}

// ============================================================================
// Personas
// ============================================================================

#[tokio::test]
async fn test_personas_index_and_search() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let page = server.get("/personas").await;
    assert_eq!(page.status_code(), StatusCode::OK);
    assert!(page.text().contains("Bank Clerk"));

    let none = server.get("/personas?q=pirate").await.text();
    assert!(none.contains("No personas found."));
}

#[tokio::test]
async fn test_create_persona_uploads_image_and_forces_public() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let form = common::text_form(&[
        ("name", "Delivery Driver"),
        ("description", ""),
        ("system_prompt", "You deliver parcels."),
        ("starting_message", "Your parcel is waiting."),
        ("conversation_starters", "Where is my parcel?\n\n  Is there a fee?  \n"),
    ])
    .add_part("image", common::image_part("driver.png"));

    let response = server.post("/personas").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/personas");

    let upload = fake
        .last_request("POST", "/storage/presigned-url/upload")
        .expect("Upload presigned");
    assert_eq!(
        upload.query_pairs().get("category").map(String::as_str),
        Some("personas")
    );

    let body = fake
        .last_request("POST", "/personas/")
        .expect("Persona created")
        .json();
    assert_eq!(body["name"], "Delivery Driver");
    assert_eq!(body["is_public"], true);
    assert!(body["description"].is_null());
    assert_eq!(
        body["conversation_starters"],
        json!(["Where is my parcel?", "Is there a fee?"])
    );
    let key = body["profile_image_key"].as_str().expect("Image key sent");
    assert!(key.starts_with("personas/"));
    assert!(fake.has_object(key));

    let list = common::follow(&server, &response).await;
    assert!(list.contains("Delivery Driver"));
}

#[tokio::test]
async fn test_create_persona_requires_name() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let form = common::text_form(&[("name", "   "), ("system_prompt", "kept text")])
        .add_part("image", common::image_part("unused.png"));
    let response = server.post("/personas").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Name and system prompt are required."));
    assert!(body.contains("kept text"));

    assert!(fake.requests_to("POST", "/personas/").is_empty());
    assert!(
        fake.requests_to("POST", "/storage/presigned-url/upload")
            .is_empty()
    );
}

#[tokio::test]
async fn test_persona_form_requires_system_prompt() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let form = common::text_form(&[("name", "Courier"), ("system_prompt", "  \n ")])
        .add_part("image", common::image_part("courier.png"));
    let response = server.post("/personas").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Name and system prompt are required."));
    assert!(body.contains("Courier"));
    assert!(fake.requests_to("POST", "/personas/").is_empty());
    assert!(
        fake.requests_to("POST", "/storage/presigned-url/upload")
            .is_empty()
    );

    let update = common::text_form(&[("name", "Senior Bank Clerk"), ("system_prompt", "")]);
    let response = server.post("/personas/1").multipart(update).await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/personas/1/edit");
    let edit = common::follow(&server, &response).await;
    assert!(edit.contains("Name and system prompt are required."));
    assert!(fake.requests_to("PUT", "/personas/1").is_empty());
    assert_eq!(fake.personas()[0]["name"], "Bank Clerk");
}

#[tokio::test]
async fn test_failed_persona_create_removes_uploaded_image() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;
    fake.fail("POST", "/personas/", 500, "persona store offline");

    let form = common::text_form(&[("name", "Tax Officer"), ("system_prompt", "p")])
        .add_part("image", common::image_part("tax.png"));
    let response = server.post("/personas").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(
        response
            .text()
            .contains("Creating the persona failed: persona store offline")
    );

    assert_eq!(fake.requests_to("DELETE", "/storage/object").len(), 1);
    assert_eq!(fake.objects(), vec!["users/alice.png".to_string()]);
}

#[tokio::test]
async fn test_update_persona_reads_public_checkbox() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let edit = server.get("/personas/1/edit").await;
    assert_eq!(edit.status_code(), StatusCode::OK);
    assert!(edit.text().contains("Bank Clerk"));

    let form = common::text_form(&[
        ("name", "Senior Bank Clerk"),
        ("system_prompt", "You work at a bank."),
        ("conversation_starters", "Is my account safe?"),
    ]);
    let response = server.post("/personas/1").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/personas/1/edit");

    let body = fake
        .last_request("PUT", "/personas/1")
        .expect("Update sent")
        .json();
    assert_eq!(body["name"], "Senior Bank Clerk");
    assert_eq!(body["is_public"], false);
    assert_eq!(fake.personas()[0]["name"], "Senior Bank Clerk");
}

#[tokio::test]
async fn test_delete_persona() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.post("/personas/1/delete").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/personas");
    assert!(fake.personas().is_empty());
    assert!(fake.requests_to("DELETE", "/storage/object").is_empty());
}

#[tokio::test]
async fn test_unknown_persona_redirects() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.get("/personas/404/edit").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert!(
        common::follow(&server, &response)
            .await
            .contains("Persona 404 was not found.")
    );
}

#[tokio::test]
async fn test_export_personas_downloads_json() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.get("/personas/export").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let disposition = response.header("content-disposition");
    assert!(
        disposition
            .to_str()
            .is_ok_and(|d| d.contains("mung_personas_backup.json"))
    );

    let exported: Value = response.json();
    assert_eq!(exported[0]["name"], "Bank Clerk");
}

#[tokio::test]
async fn test_import_personas_reports_partial_failure() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let backup = json!([
        {"id": 7, "name": "Restored", "is_public": false, "profile_image_key": "personas/old.png"},
        {"name": ""}
    ]);
    let response = server
        .post("/personas/import")
        .multipart(backup_part(&backup))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/personas");

    let posted = fake.requests_to("POST", "/personas/");
    assert_eq!(posted.len(), 2);
    let first = posted[0].json();
    assert_eq!(first["name"], "Restored");
    assert_eq!(first["is_public"], true);
    assert!(first["profile_image_key"].is_null());
    assert!(first.get("id").is_none());

    let page = common::follow(&server, &response).await;
    assert!(page.contains("Restore finished: 1 succeeded, 1 failed (of 2)."));
}

#[tokio::test]
async fn test_import_personas_skips_non_object_entries() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server
        .post("/personas/import")
        .multipart(backup_part(&json!([{"name": "A"}, 42])))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

    assert_eq!(fake.requests_to("POST", "/personas/").len(), 1);
    assert_eq!(fake.personas().len(), 2);

    let page = common::follow(&server, &response).await;
    assert!(page.contains("Restore finished: 1 succeeded, 1 failed (of 2)."));
    assert!(page.contains("#2: entry is not a JSON object"));
}

#[tokio::test]
async fn test_import_rejects_non_array_backup() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server
        .post("/personas/import")
        .multipart(backup_part(&json!({"name": "solo"})))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert!(fake.requests_to("POST", "/personas/").is_empty());
}

// ============================================================================
// Phishing cases
// ============================================================================

#[tokio::test]
async fn test_cases_grouped_by_category() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let page = server.get("/phishing").await;
    assert_eq!(page.status_code(), StatusCode::OK);
    let body = page.text();
    assert!(body.contains("Text message phishing"));
    assert!(body.contains("Parcel redelivery fee"));
    assert!(body.contains("Prosecutor impersonation"));
}

#[tokio::test]
async fn test_category_load_failure_is_shown_with_cases() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;
    fake.fail("GET", "/phishing/categories", 500, "category list offline");

    let page = server.get("/phishing").await;
    assert_eq!(page.status_code(), StatusCode::OK);
    let body = page.text();
    assert!(body.contains("Failed to load categories: category list offline"));
    assert!(body.contains("Parcel redelivery fee"));
    assert!(body.contains("unknown category"));
}

#[tokio::test]
async fn test_create_case_sends_nulls_for_empty_fields() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let form = server.get("/phishing/new").await;
    assert!(form.text().contains("Voice phishing"));

    let response = server
        .post("/phishing")
        .form(&[
            ("category_code", "VOICE"),
            ("title", "Loan offer"),
            ("content", "Cheap loan if you pay a fee first."),
            ("case_date", ""),
            ("reference_url", ""),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/phishing");

    let body = fake
        .last_request("POST", "/admin/phishing-cases")
        .expect("Case created")
        .json();
    assert_eq!(body["category_code"], "VOICE");
    assert!(body["case_date"].is_null());
    assert!(body["reference_url"].is_null());
    assert_eq!(fake.cases().len(), 3);

    let list = common::follow(&server, &response).await;
    assert!(list.contains("Loan offer"));
}

#[tokio::test]
async fn test_create_case_rejects_bad_date() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server
        .post("/phishing")
        .form(&[
            ("category_code", "SMS"),
            ("title", "Fine notice"),
            ("content", "Pay your traffic fine."),
            ("case_date", "31/12/2024"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Invalid case date"));
    assert!(body.contains("expected YYYY-MM-DD."));
    assert!(
        fake.requests_to("POST", "/admin/phishing-cases")
            .is_empty()
    );
}

#[tokio::test]
async fn test_update_case() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let edit = server.get("/phishing/1/edit").await;
    assert_eq!(edit.status_code(), StatusCode::OK);
    assert!(edit.text().contains("2024-05-01"));

    let response = server
        .post("/phishing/1")
        .form(&[
            ("category_code", "SMS"),
            ("title", "Parcel customs fee"),
            ("content", "Pay customs to release the parcel."),
            ("case_date", "2024-06-01"),
            ("reference_url", "https://news.example.com/a"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/phishing");

    let body = fake
        .last_request("PUT", "/admin/phishing-cases/1")
        .expect("Update sent")
        .json();
    assert_eq!(body["case_date"], "2024-06-01");
    assert_eq!(body["reference_url"], "https://news.example.com/a");
}

#[tokio::test]
async fn test_missing_case_redirects_to_list() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.get("/phishing/999/edit").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/phishing");
    assert!(
        common::follow(&server, &response)
            .await
            .contains("Phishing case 999 was not found.")
    );
}

#[tokio::test]
async fn test_delete_case() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.post("/phishing/2/delete").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/phishing");
    assert_eq!(fake.cases().len(), 1);
}

#[tokio::test]
async fn test_case_backup_roundtrip() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let export = server.get("/phishing/export").await;
    assert_eq!(export.status_code(), StatusCode::OK);
    assert!(
        export
            .header("content-disposition")
            .to_str()
            .is_ok_and(|d| d.contains("mung_phishing_cases_backup.json"))
    );
    let exported: Value = export.json();
    assert_eq!(exported.as_array().map(Vec::len), Some(2));

    let response = server
        .post("/phishing/import")
        .multipart(backup_part(&exported))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(fake.cases().len(), 4);

    let page = common::follow(&server, &response).await;
    assert!(page.contains("Restore finished: 2 succeeded, 0 failed (of 2)."));
}
