mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use common::app::spawn_test_app;
use common::fixtures::{add_cards_via_api, create_deck_via_api, reviewed_state, seed_deck};
use common::http::{assert_json_error, assert_status_ok_json, call};

#[tokio::test]
async fn it_deck_crud() {
    let app = spawn_test_app().await;
    let deck_id = create_deck_via_api(&app.app, "Portuguese basics").await;

    let (status, body) = call(&app.app, Method::GET, &format!("/api/decks/{deck_id}"), None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["name"], "Portuguese basics");
    assert_eq!(body["data"]["srsEnabled"], true);
    assert_eq!(body["data"]["cardCount"], 0);

    let (status, body) = call(
        &app.app,
        Method::PUT,
        &format!("/api/decks/{deck_id}"),
        Some(json!({ "name": "Portuguese A1", "description": "first steps" })),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["name"], "Portuguese A1");
    assert_eq!(body["data"]["description"], "first steps");

    let (status, body) = call(&app.app, Method::GET, "/api/decks", None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = call(&app.app, Method::DELETE, &format!("/api/decks/{deck_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app.app, Method::GET, &format!("/api/decks/{deck_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn it_deck_validation_errors() {
    let app = spawn_test_app().await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/decks",
        Some(json!({ "name": "  ", "languageCode": "es" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "DECK_INVALID_NAME");

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/decks",
        Some(json!({ "name": "Spanish", "languageCode": "Spanish" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "DECK_INVALID_LANGUAGE");

    let (status, body) = call(&app.app, Method::POST, "/api/decks", Some(json!({ "name": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn it_cards_keep_insertion_order_and_get_initialized_view() {
    let app = spawn_test_app().await;
    let deck_id = create_deck_via_api(&app.app, "Colors").await;
    add_cards_via_api(
        &app.app,
        &deck_id,
        &[("vermelho", "red"), ("azul", "blue"), ("verde", "green")],
    )
    .await;

    let (status, body) = call(&app.app, Method::GET, &format!("/api/decks/{deck_id}/cards"), None).await;
    assert_status_ok_json(status, &body);
    let cards = body["data"].as_array().unwrap();
    let fronts: Vec<&str> = cards.iter().map(|c| c["front"].as_str().unwrap()).collect();
    assert_eq!(fronts, vec!["vermelho", "azul", "verde"]);
    for card in cards {
        assert_eq!(card["srsData"]["isNew"], true);
        assert_eq!(card["srsData"]["easeFactor"], 2.5);
        assert_eq!(card["deckId"], deck_id.as_str());
    }

    // The initialized state only exists in the response.
    let stored = app
        .state
        .store()
        .require_card(cards[0]["id"].as_str().unwrap())
        .unwrap();
    assert!(stored.card.srs_data.is_none());

    let (_, body) = call(&app.app, Method::GET, &format!("/api/decks/{deck_id}"), None).await;
    assert_eq!(body["data"]["cardCount"], 3);
}

#[tokio::test]
async fn it_card_update_and_delete() {
    let app = spawn_test_app().await;
    let deck_id = create_deck_via_api(&app.app, "Food").await;
    let added = add_cards_via_api(&app.app, &deck_id, &[("pão", "bread")]).await;
    let card_id = added[0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app.app,
        Method::PUT,
        &format!("/api/cards/{card_id}"),
        Some(json!({ "back": "bread (loaf)", "difficulty": "easy" })),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["front"], "pão");
    assert_eq!(body["data"]["back"], "bread (loaf)");
    assert_eq!(body["data"]["difficulty"], "easy");

    let (status, body) = call(
        &app.app,
        Method::PUT,
        &format!("/api/cards/{card_id}"),
        Some(json!({ "front": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "CARD_INVALID_TEXT");

    let (status, _) = call(&app.app, Method::DELETE, &format!("/api/cards/{card_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app.app, Method::DELETE, &format!("/api/cards/{card_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app.app, Method::GET, &format!("/api/decks/{deck_id}"), None).await;
    assert_eq!(body["data"]["cardCount"], 0);
}

#[tokio::test]
async fn it_due_partition_respects_caps_and_query_override() {
    let app = spawn_test_app().await;
    let store = app.state.store();
    let (deck, cards) = seed_deck(store, "Verbs", 6);
    let now = Utc::now();

    // 0,1 overdue reviews; 2 reviewed but not due; 3..6 never studied.
    for card in &cards[..2] {
        store
            .set_card_schedule(&card.card.id, Some(reviewed_state(3, 2, now - Duration::days(1))), now)
            .unwrap();
    }
    store
        .set_card_schedule(&cards[2].card.id, Some(reviewed_state(10, 3, now + Duration::days(5))), now)
        .unwrap();

    let (status, body) = call(&app.app, Method::GET, &format!("/api/decks/{}/due", deck.id), None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["newCount"], 3);
    assert_eq!(body["data"]["reviewCount"], 2);

    let (status, body) = call(
        &app.app,
        Method::GET,
        &format!("/api/decks/{}/due?maxNewCardsPerDay=1&maxReviewsPerDay=1", deck.id),
        None,
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["newCount"], 1);
    assert_eq!(body["data"]["reviewCount"], 1);
    assert_eq!(body["data"]["newCards"][0]["id"], cards[3].card.id.as_str());
    assert_eq!(body["data"]["reviewCards"][0]["id"], cards[0].card.id.as_str());

    let (status, body) = call(
        &app.app,
        Method::GET,
        &format!("/api/decks/{}/due?minimumInterval=0", deck.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_SETTINGS");
}

#[tokio::test]
async fn it_deck_stats() {
    let app = spawn_test_app().await;
    let store = app.state.store();
    let (deck, cards) = seed_deck(store, "Numbers", 4);
    let now = Utc::now();

    store
        .set_card_schedule(&cards[0].card.id, Some(reviewed_state(30, 5, now + Duration::days(30))), now)
        .unwrap();
    store
        .set_card_schedule(&cards[1].card.id, Some(reviewed_state(6, 2, now - Duration::hours(1))), now)
        .unwrap();

    let (status, body) = call(&app.app, Method::GET, &format!("/api/decks/{}/stats", deck.id), None).await;
    assert_status_ok_json(status, &body);
    let stats = &body["data"];
    assert_eq!(stats["totalCards"], 4);
    assert_eq!(stats["newCards"], 2);
    assert_eq!(stats["reviewCards"], 1);
    assert_eq!(stats["masteredCards"], 1);
    assert_eq!(stats["retentionRate"], 100.0);
    assert_eq!(stats["streakDays"], 0);
}

#[tokio::test]
async fn it_missing_deck_routes_are_404() {
    let app = spawn_test_app().await;
    for path in [
        "/api/decks/nope/cards",
        "/api/decks/nope/due",
        "/api/decks/nope/stats",
        "/api/decks/nope/srs-export",
    ] {
        let (status, body) = call(&app.app, Method::GET, path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_json_error(&body, "NOT_FOUND");
    }
}
