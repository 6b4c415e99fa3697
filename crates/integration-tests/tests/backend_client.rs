//! Integration tests for `BackendClient` against the fake backend.
//!
//! Checks the wire contract: paths (trailing slashes included), methods,
//! query strings, bearer headers, form vs JSON bodies, and error details.

use serde_json::json;

use mung_admin::backend::{AccessToken, BackendError, NewConversation, ScenarioMethod};
use mung_core::{
    ConversationId, PersonaId, PersonaInput, PhishingCaseId, PhishingCaseInput, UserId, UserUpdate,
};
use mung_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, FakeBackend, TOKEN};

fn bearer() -> Option<String> {
    Some(format!("Bearer {TOKEN}"))
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_login_sends_password_form_without_bearer() {
    let fake = FakeBackend::start().await;
    let client = fake.client();

    let token = client
        .login_for_token(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .expect("Login should succeed");
    assert_eq!(
        secrecy::ExposeSecret::expose_secret(token.secret()),
        TOKEN
    );

    let request = fake
        .last_request("POST", "/auth/token")
        .expect("Token request recorded");
    assert!(request.authorization.is_none());
    assert!(
        request
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    );
    let form = request.form();
    assert_eq!(form.get("username").map(String::as_str), Some(ADMIN_EMAIL));
    assert_eq!(form.get("password").map(String::as_str), Some(ADMIN_PASSWORD));
}

#[tokio::test]
async fn test_login_rejected_carries_detail() {
    let fake = FakeBackend::start().await;

    let err = fake
        .client()
        .login_for_token(ADMIN_EMAIL, "wrong")
        .await
        .expect_err("Bad password must fail");
    assert!(err.is_unauthorized());
    assert_eq!(err.detail(), "Incorrect username or password");
}

#[tokio::test]
async fn test_superuser_check_fails_closed() {
    let fake = FakeBackend::start().await;
    let client = fake.client();

    fake.set_superuser_exists(json!(false));
    assert!(!client.check_superuser_exists().await);

    fake.set_superuser_exists(json!({ "exists": false }));
    assert!(client.check_superuser_exists().await);

    fake.fail("GET", "/admin/superuser-exists", 500, "database down");
    assert!(client.check_superuser_exists().await);
}

#[tokio::test]
async fn test_superuser_check_unreachable_backend_counts_as_exists() {
    let client = mung_admin::backend::BackendClient::new("http://127.0.0.1:9/api/v1")
        .expect("Valid URL");
    assert!(client.check_superuser_exists().await);
}

#[tokio::test]
async fn test_create_initial_superuser_sends_json() {
    let fake = FakeBackend::start().await;
    fake.set_superuser_exists(json!(false));

    let user = fake
        .client()
        .create_initial_superuser("root@example.com", "s3cret")
        .await
        .expect("Setup should succeed");
    assert_eq!(user.email.as_deref(), Some("root@example.com"));
    assert!(user.is_superuser);

    let request = fake
        .last_request("POST", "/admin/initial-superuser")
        .expect("Setup request recorded");
    assert!(request.authorization.is_none());
    assert_eq!(
        request.json(),
        json!({ "email": "root@example.com", "password": "s3cret" })
    );

    let err = fake
        .client()
        .create_initial_superuser("again@example.com", "pw")
        .await
        .expect_err("Second superuser must be refused");
    assert_eq!(err.detail(), "A superuser already exists");
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_users_require_bearer() {
    let fake = FakeBackend::start().await;
    let client = fake.client();

    let users = client
        .get_all_users(&FakeBackend::token())
        .await
        .expect("Users should load");
    assert_eq!(users.len(), 2);
    assert_eq!(
        fake.last_request("GET", "/admin/users")
            .expect("recorded")
            .authorization,
        bearer()
    );

    let err = client
        .get_all_users(&AccessToken::new("expired"))
        .await
        .expect_err("Unknown token must be rejected");
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_update_user_sends_explicit_null_image() {
    let fake = FakeBackend::start().await;
    let update = UserUpdate {
        username: "alice2".into(),
        is_active: false,
        is_superuser: false,
        profile_image_key: None,
    };

    fake.client()
        .update_user(&FakeBackend::token(), UserId::new(2), &update)
        .await
        .expect("Update should succeed");

    let request = fake
        .last_request("PUT", "/admin/users/2")
        .expect("Update recorded");
    assert_eq!(
        request.json(),
        json!({
            "username": "alice2",
            "is_active": false,
            "is_superuser": false,
            "profile_image_key": null
        })
    );
    assert_eq!(fake.users()[1]["username"], "alice2");
}

#[tokio::test]
async fn test_delete_missing_user_is_not_found() {
    let fake = FakeBackend::start().await;

    let err = fake
        .client()
        .delete_user(&FakeBackend::token(), UserId::new(999))
        .await
        .expect_err("Missing user");
    assert!(err.is_not_found());
    assert_eq!(err.detail(), "User not found");
}

// ============================================================================
// Personas
// ============================================================================

#[tokio::test]
async fn test_persona_paths_keep_trailing_slash() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();

    let personas = client.get_personas(&token).await.expect("Personas load");
    assert_eq!(personas.len(), 1);
    assert_eq!(personas[0].starters().len(), 2);
    assert_eq!(fake.requests_to("GET", "/personas/").len(), 1);

    let input = PersonaInput {
        name: "Courier".into(),
        description: None,
        system_prompt: "You deliver parcels.".into(),
        is_public: false,
        profile_image_key: None,
        starting_message: None,
        conversation_starters: vec!["Where is my parcel?".into()],
    };
    let created = client
        .create_persona(&token, &input)
        .await
        .expect("Create persona");
    assert_eq!(created.name, "Courier");

    let body = fake
        .last_request("POST", "/personas/")
        .expect("Create recorded")
        .json();
    assert_eq!(body["is_public"], true);
    assert_eq!(body["conversation_starters"], json!(["Where is my parcel?"]));

    client
        .update_persona(&token, created.id, &input)
        .await
        .expect("Update persona");
    assert_eq!(
        fake.requests_to("PUT", &format!("/personas/{}", created.id))
            .len(),
        1
    );

    client
        .delete_persona(&token, PersonaId::new(1))
        .await
        .expect("Delete persona");
    assert_eq!(fake.personas().len(), 1);
}

#[tokio::test]
async fn test_validation_errors_are_joined() {
    let fake = FakeBackend::start().await;
    fake.fail_with(
        "POST",
        "/personas/",
        422,
        json!({ "detail": [{ "msg": "name too short" }, { "msg": "prompt missing" }] }),
    );

    let input = PersonaInput {
        name: "X".into(),
        description: None,
        system_prompt: String::new(),
        is_public: true,
        profile_image_key: None,
        starting_message: None,
        conversation_starters: Vec::new(),
    };
    let err = fake
        .client()
        .create_persona(&FakeBackend::token(), &input)
        .await
        .expect_err("Validation failure");
    assert!(matches!(err, BackendError::Api { status: 422, .. }));
    assert_eq!(err.detail(), "name too short; prompt missing");
}

// ============================================================================
// Conversations
// ============================================================================

#[tokio::test]
async fn test_conversation_listing_query() {
    let fake = FakeBackend::start().await;

    let conversations = fake
        .client()
        .get_all_conversations_admin(&FakeBackend::token(), 0, 1000)
        .await
        .expect("Conversations load");
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].persona.name, "Bank Clerk");

    let query = fake
        .last_request("GET", "/admin/conversations")
        .expect("recorded")
        .query_pairs();
    assert_eq!(query.get("skip").map(String::as_str), Some("0"));
    assert_eq!(query.get("limit").map(String::as_str), Some("1000"));
}

#[tokio::test]
async fn test_scenario_methods_hit_their_endpoints() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();

    let random = NewConversation::new(UserId::new(2), PersonaId::new(1), Some("  "));
    client
        .create_conversation_by(&token, ScenarioMethod::Random, &random)
        .await
        .expect("Random scenario");
    let body = fake
        .last_request("POST", "/admin/conversations")
        .expect("recorded")
        .json();
    assert_eq!(body["title"], serde_json::Value::Null);
    assert!(body.get("category_code").is_none());

    let by_category = random.clone().with_category("SMS");
    client
        .create_conversation_by(&token, ScenarioMethod::Category, &by_category)
        .await
        .expect("Category scenario");
    assert_eq!(
        fake.last_request("POST", "/admin/conversations/with-category")
            .expect("recorded")
            .json()["category_code"],
        "SMS"
    );

    let created = client
        .create_conversation_by(&token, ScenarioMethod::Ai, &by_category)
        .await
        .expect("AI scenario");
    assert_eq!(
        fake.requests_to("POST", "/admin/conversations/with-ai-case")
            .len(),
        1
    );
    assert!(
        fake.conversations()
            .iter()
            .any(|c| c["id"].as_i64() == Some(created.id.as_i64()))
    );
}

#[tokio::test]
async fn test_named_admin_creators_post_to_their_own_endpoints() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();
    let conversation = NewConversation::new(UserId::new(2), PersonaId::new(1), Some("Named"))
        .with_category("VOICE");

    client
        .create_conversation_admin(&token, &conversation)
        .await
        .expect("random");
    client
        .create_conversation_with_category_admin(&token, &conversation)
        .await
        .expect("category");
    client
        .create_conversation_with_ai_case_admin(&token, &conversation)
        .await
        .expect("ai");

    for path in [
        "/admin/conversations",
        "/admin/conversations/with-category",
        "/admin/conversations/with-ai-case",
    ] {
        assert_eq!(fake.requests_to("POST", path).len(), 1, "{path}");
    }
    let with_category = fake
        .last_request("POST", "/admin/conversations/with-category")
        .expect("recorded")
        .json();
    assert_eq!(with_category["category_code"], "VOICE");
    assert_eq!(with_category["title"], "Named");
}

#[tokio::test]
async fn test_self_service_conversation_omits_empty_title() {
    let fake = FakeBackend::start().await;

    fake.client()
        .create_conversation(&FakeBackend::token(), PersonaId::new(1), Some(""))
        .await
        .expect("Create conversation");

    let body = fake
        .last_request("POST", "/conversations/")
        .expect("recorded")
        .json();
    assert_eq!(body, json!({ "persona_id": 1 }));
}

#[tokio::test]
async fn test_send_message_and_read_back() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();
    let id = ConversationId::new(1);

    let response = client
        .send_message(&token, id, "Who are you?", None)
        .await
        .expect("Send message");
    assert_eq!(response.suggestions().len(), 2);

    let body = fake
        .last_request("POST", "/conversations/1/messages/")
        .expect("recorded")
        .json();
    assert_eq!(body, json!({ "content": "Who are you?" }));

    let messages = client
        .get_messages_for_conversation_admin(&token, id)
        .await
        .expect("Messages load");
    assert_eq!(messages.len(), 4);

    client
        .delete_conversation_admin(&token, id)
        .await
        .expect("Delete conversation");
    assert!(fake.conversations().is_empty());
}

// ============================================================================
// Phishing
// ============================================================================

#[tokio::test]
async fn test_categories_are_public() {
    let fake = FakeBackend::start().await;

    let categories = fake
        .client()
        .get_phishing_categories()
        .await
        .expect("Categories load");
    assert_eq!(categories.len(), 2);
    assert!(
        fake.last_request("GET", "/phishing/categories")
            .expect("recorded")
            .authorization
            .is_none()
    );
}

#[tokio::test]
async fn test_case_crud() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();

    let cases = client.get_all_phishing_cases(&token).await.expect("Cases");
    assert_eq!(cases.len(), 2);
    assert_eq!(
        fake.last_request("GET", "/phishing/cases")
            .expect("recorded")
            .query_pairs()
            .get("limit")
            .map(String::as_str),
        Some("200")
    );

    let input = PhishingCaseInput {
        category_code: "SMS".into(),
        title: "Fake toll notice".into(),
        content: "Unpaid highway toll.".into(),
        case_date: None,
        reference_url: None,
    };
    let created = client
        .create_phishing_case(&token, &input)
        .await
        .expect("Create case");
    let body = fake
        .last_request("POST", "/admin/phishing-cases")
        .expect("recorded")
        .json();
    assert_eq!(body["case_date"], serde_json::Value::Null);
    assert_eq!(body["reference_url"], serde_json::Value::Null);

    let fetched = client
        .get_phishing_case_by_id(&token, created.id)
        .await
        .expect("Fetch case");
    assert_eq!(fetched.title, "Fake toll notice");

    let updated = client
        .update_phishing_case(
            &token,
            created.id,
            &PhishingCaseInput {
                title: "Fake toll notice v2".into(),
                ..input
            },
        )
        .await
        .expect("Update case");
    assert_eq!(updated.title, "Fake toll notice v2");

    client
        .delete_phishing_case(&token, created.id)
        .await
        .expect("Delete case");
    let err = client
        .get_phishing_case_by_id(&token, created.id)
        .await
        .expect_err("Deleted case is gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_raw_case_is_posted_as_is() {
    let fake = FakeBackend::start().await;
    let raw = json!({
        "category_code": "VOICE",
        "title": "Restored",
        "content": "From backup",
        "id": 77,
        "created_at": "2024-01-01T00:00:00"
    });

    fake.client()
        .create_phishing_case_raw(&FakeBackend::token(), &raw)
        .await
        .expect("Raw create");
    assert_eq!(
        fake.last_request("POST", "/admin/phishing-cases")
            .expect("recorded")
            .json(),
        raw
    );
}

#[tokio::test]
async fn test_image_analysis() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();

    let analysis = client
        .analyze_image_for_phishing(&token, "aW1hZ2U=")
        .await
        .expect("Analysis");
    assert!((analysis.phishing_score - 82.5).abs() < f64::EPSILON);
    assert_eq!(
        fake.last_request("POST", "/phishing/analyze-image")
            .expect("recorded")
            .json(),
        json!({ "image_base64": "aW1hZ2U=" })
    );

    let err = client
        .analyze_image_for_phishing(&token, "")
        .await
        .expect_err("No score in body");
    assert_eq!(err.detail(), "No image supplied");
}

#[tokio::test]
async fn test_get_case_by_id_path() {
    let fake = FakeBackend::start().await;

    let case = fake
        .client()
        .get_phishing_case_by_id(&FakeBackend::token(), PhishingCaseId::new(2))
        .await
        .expect("Case 2");
    assert_eq!(case.category_code, "VOICE");
    assert_eq!(fake.requests_to("GET", "/phishing/cases/2").len(), 1);
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test]
async fn test_upload_roundtrip_through_presigned_url() {
    let fake = FakeBackend::start().await;
    let client = fake.client();
    let token = FakeBackend::token();

    let presigned = client
        .get_presigned_url_for_upload(&token, "avatar.png", "users")
        .await
        .expect("Presign upload");
    assert!(presigned.object_key.starts_with("users/"));
    let request = fake
        .last_request("POST", "/storage/presigned-url/upload")
        .expect("recorded");
    assert_eq!(
        request.query_pairs().get("category").map(String::as_str),
        Some("users")
    );
    assert_eq!(request.json(), json!({ "filename": "avatar.png" }));

    client
        .upload_file_to_storage(&presigned.url, b"png".to_vec(), "image/png")
        .await
        .expect("Upload");
    assert!(fake.has_object(&presigned.object_key));
    let put = fake
        .requests()
        .into_iter()
        .find(|r| r.method == "PUT")
        .expect("PUT recorded");
    assert!(put.authorization.is_none());
    assert_eq!(put.content_type.as_deref(), Some("image/png"));

    let url = client
        .get_presigned_url_for_download(&token, &presigned.object_key)
        .await
        .expect("Presign download");
    assert_eq!(url, presigned.url);

    client
        .delete_storage_object(&token, &presigned.object_key)
        .await
        .expect("Delete object");
    assert!(!fake.has_object(&presigned.object_key));
    assert_eq!(
        fake.last_request("DELETE", "/storage/object")
            .expect("recorded")
            .authorization,
        bearer()
    );
}

#[tokio::test]
async fn test_malformed_presigned_url() {
    let fake = FakeBackend::start().await;

    let err = fake
        .client()
        .upload_file_to_storage("not a url", Vec::new(), "image/png")
        .await
        .expect_err("Malformed URL");
    assert!(matches!(err, BackendError::InvalidUrl(_)));
}
