use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::routes::test_support::TestApp;

async fn create_survey(app: &TestApp, token: &str, title: &str) -> (StatusCode, Value) {
    app.send(
        Method::POST,
        "/surveys",
        Some(token),
        Some(json!({ "title": title })),
    )
    .await
}

async fn survey_id(app: &TestApp, token: &str) -> String {
    let (status, body) = create_survey(app, token, "Team pulse").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn share_collect_and_unshare() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com").await;
    let id = survey_id(&app, &owner).await;

    let (status, questions) = app
        .send(
            Method::PUT,
            &format!("/surveys/{id}/questions"),
            Some(&owner),
            Some(json!({ "questions": [
                { "title": "Your name", "required": true, "type": "short_text" },
                { "title": "Mood", "type": "rating", "scale": 5 }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{questions}");
    let name_id = questions[0]["id"].as_str().unwrap().to_string();
    let mood_id = questions[1]["id"].as_str().unwrap().to_string();

    let (status, shared) = app
        .send(Method::POST, &format!("/surveys/{id}/share"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = shared["share_url"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 12);
    assert_eq!(
        shared["public_url"],
        json!(format!("https://surveys.test/s/{code}"))
    );

    // ! sharing again keeps the code
    let (_, again) = app
        .send(Method::POST, &format!("/surveys/{id}/share"), Some(&owner), None)
        .await;
    assert_eq!(again["share_url"], json!(code));

    let (status, public) = app
        .send(Method::GET, &format!("/public/surveys/{code}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["title"], json!("Team pulse"));
    assert_eq!(public["questions"].as_array().unwrap().len(), 2);
    assert!(public.get("owner_id").is_none());

    let submit = format!("/public/surveys/{code}/responses");
    let (status, body) = app
        .send(
            Method::POST,
            &submit,
            None,
            Some(json!({ "answers": [{ "question_id": mood_id, "value": 9 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][&name_id].is_array());
    assert!(body["errors"][&mood_id].is_array());

    let (status, _) = app
        .send(
            Method::POST,
            &submit,
            None,
            Some(json!({ "answers": [
                { "question_id": name_id, "value": "Ada" },
                { "question_id": mood_id, "value": 4 }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, responses) = app
        .send(Method::GET, &format!("/surveys/{id}/responses"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(responses.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/surveys/{id}/share"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(Method::GET, &format!("/public/surveys/{code}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, detail) = app
        .send(Method::GET, &format!("/surveys/{id}"), Some(&owner), None)
        .await;
    assert_eq!(detail["survey"]["status"], json!("DRAFT"));
    assert!(detail["survey"]["share_url"].is_null());
}

#[tokio::test]
async fn collaborators_get_what_their_grant_allows() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com").await;
    let (viewer_id, viewer) = app.user("viewer@example.com").await;
    let id = survey_id(&app, &owner).await;
    let survey = format!("/surveys/{id}");

    // ! strangers cannot tell the survey exists
    let (status, _) = app.send(Method::GET, &survey, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(
            Method::PATCH,
            &survey,
            Some(&viewer),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, access) = app
        .send(Method::GET, &format!("{survey}/permissions"), Some(&viewer), None)
        .await;
    assert_eq!(access["can_view"], json!(false));

    let collaborators = format!("{survey}/collaborators");
    let (status, _) = app
        .send(
            Method::POST,
            &collaborators,
            Some(&owner),
            Some(json!({ "email": "viewer@example.com", "permission": "VIEW" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, detail) = app.send(Method::GET, &survey, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["access"]["can_edit"], json!(false));
    let (status, _) = app
        .send(
            Method::PATCH,
            &survey,
            Some(&viewer),
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::POST, &format!("{survey}/share"), Some(&viewer), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(Method::GET, &collaborators, Some(&viewer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = app.send(Method::GET, "/surveys", Some(&viewer), None).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["access"]["is_owner"], json!(false));

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("{collaborators}/{viewer_id}"),
            Some(&owner),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &survey, Some(&viewer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grants_to_owner_or_unknown_email_are_rejected() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com").await;
    let id = survey_id(&app, &owner).await;
    let collaborators = format!("/surveys/{id}/collaborators");

    for email in ["owner@example.com", "nobody@example.com"] {
        let (status, _) = app
            .send(
                Method::POST,
                &collaborators,
                Some(&owner),
                Some(json!({ "email": email, "permission": "EDIT" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email}");
    }
}

#[tokio::test]
async fn update_rejects_unknown_fields_and_delete_is_owner_only() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com").await;
    let (_, editor) = app.user("editor@example.com").await;
    let id = survey_id(&app, &owner).await;
    let survey = format!("/surveys/{id}");

    let (status, _) = app
        .send(
            Method::PATCH,
            &survey,
            Some(&owner),
            Some(json!({ "owner_id": "someone-else" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.send(
        Method::POST,
        &format!("{survey}/collaborators"),
        Some(&owner),
        Some(json!({ "email": "editor@example.com", "permission": "EDIT" })),
    )
    .await;
    let (status, body) = app
        .send(
            Method::PATCH,
            &survey,
            Some(&editor),
            Some(json!({ "title": "Renamed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("Renamed"));

    let (status, _) = app.send(Method::DELETE, &survey, Some(&editor), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &survey, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &survey, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creation_spends_free_tickets_then_paid_ones() {
    let app = TestApp::new();
    let (user_id, token) = app.user("maker@example.com").await;
    let (_, admin) = app.admin().await;

    for n in 0..3 {
        let (status, _) = create_survey(&app, &token, &format!("Survey {n}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = create_survey(&app, &token, "One too many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Insufficient tickets"));

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/admin/users/{user_id}/tickets"),
            Some(&admin),
            Some(json!({ "ticket_type": "BASIC", "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = create_survey(&app, &token, "Paid for").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, tickets) = app.send(Method::GET, "/user/tickets", Some(&token), None).await;
    let tickets = tickets.as_array().unwrap();
    assert_eq!(tickets[0]["ticket_type"], json!("FREE"));
    assert_eq!(tickets[0]["remaining_tickets"], json!(0));
    let basic = tickets
        .iter()
        .find(|t| t["ticket_type"] == json!("BASIC"))
        .unwrap();
    assert_eq!(basic["used_tickets"], json!(1));
}
