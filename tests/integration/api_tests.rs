//! API integration tests
//!
//! Require a running server on localhost:8080 with a fresh database and the
//! bootstrap staff account admin/admin (see config/development.toml).

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Unique suffix so reruns against the same database do not collide
fn unique(prefix: &str) -> String {
    format!("{}{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn login(client: &Client, username: &str, password: &str) -> (String, i64) {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse login response");
    (
        body["token"].as_str().expect("No token in response").to_string(),
        body["user"]["id"].as_i64().expect("No user id in response"),
    )
}

async fn admin_token(client: &Client) -> String {
    login(client, "admin", "admin").await.0
}

/// Register a member and return (token, user id)
async fn new_member(client: &Client) -> (String, i64) {
    let username = unique("reader");
    let response = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({ "username": username, "password": "secret" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    login(client, &username, "secret").await
}

async fn post(client: &Client, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

/// GET `path`; an empty token sends the request anonymously
async fn get(client: &Client, token: &str, path: &str) -> (StatusCode, Value) {
    let mut request = client.get(format!("{}{}", BASE_URL, path));
    if !token.is_empty() {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

/// Create an author, a category and a book with `copies` copies; returns ids
async fn seed_book(client: &Client, admin: &str, copies: i32) -> (i64, i64, i64) {
    let (status, author) = post(client, admin, "/authors", json!({ "name": "Ursula", "bio": "Writer" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, category) = post(client, admin, "/categories", json!({ "name": unique("Fiction") })).await;
    assert_eq!(status, StatusCode::CREATED);

    let author_id = author["id"].as_i64().unwrap();
    let category_id = category["id"].as_i64().unwrap();
    let (status, book) = post(
        client,
        admin,
        "/books",
        json!({
            "title": "The Dispossessed",
            "description": "An ambiguous utopia",
            "author": author_id,
            "category": category_id,
            "total_copies": copies,
            "available_copies": copies
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (author_id, category_id, book["id"].as_i64().unwrap())
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();
    let (status, body) = get(&client, "", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": "admin", "password": "admin" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "staff");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_registration() {
    let client = Client::new();
    let username = unique("dup");
    let payload = json!({ "username": username, "email": "dup@example.com", "password": "secret" });

    let first = client.post(format!("{}/register", BASE_URL)).json(&payload).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["message"], "User registered successfully");

    let second = client.post(format!("{}/register", BASE_URL)).json(&payload).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.unwrap();
    assert!(body["errors"]["username"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_username_case_insensitive() {
    let client = Client::new();
    let username = unique("MixedCase");

    let first = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({ "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({ "username": username.to_lowercase(), "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.unwrap();
    assert!(body["errors"]["username"].is_array());

    login(&client, &username.to_lowercase(), "secret").await;
}

#[tokio::test]
#[ignore]
async fn test_new_member_has_no_penalties() {
    let client = Client::new();
    let (token, user_id) = new_member(&client).await;

    let (status, profile) = get(&client, &token, &format!("/users/{}/penalties", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["penalty_points"], 0);
    assert_eq!(profile["user"]["id"], user_id);
}

#[tokio::test]
#[ignore]
async fn test_penalties_access_rules() {
    let client = Client::new();
    let (alice, _) = new_member(&client).await;
    let (_, bob_id) = new_member(&client).await;
    let admin = admin_token(&client).await;

    let (status, _) = get(&client, &alice, &format!("/users/{}/penalties", bob_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&client, &admin, &format!("/users/{}/penalties", bob_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&client, &alice, "/users/999999999/penalties").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_book_validation() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (author_id, category_id, _) = seed_book(&client, &admin, 1).await;

    let (status, body) = post(
        &client,
        &admin,
        "/books",
        json!({
            "title": "Ghost",
            "description": "No such author",
            "author": 999999999,
            "category": category_id,
            "total_copies": 1,
            "available_copies": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["author"].is_array());

    let (status, body) = post(
        &client,
        &admin,
        "/books",
        json!({
            "title": "Overbooked",
            "description": "Too many",
            "author": author_id,
            "category": category_id,
            "total_copies": 1,
            "available_copies": 2
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["available_copies"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_duplicate_category_name() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let name = unique("Poetry");

    let (status, _) = post(&client, &admin, "/categories", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = post(&client, &admin, "/categories", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["name"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_book_filters() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (author_id, category_id, book_id) = seed_book(&client, &admin, 1).await;

    let (status, books) = get(&client, "", &format!("/books?author={}&category={}", author_id, category_id)).await;
    assert_eq!(status, StatusCode::OK);
    let books = books.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["id"], book_id);
    assert_eq!(books[0]["author_name"], "Ursula");
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, _, book_id) = seed_book(&client, &admin, 1).await;
    let (member, _) = new_member(&client).await;

    let (status, borrow) = post(&client, &member, "/borrow", json!({ "book_id": book_id })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(borrow["book"]["id"], book_id);
    assert_eq!(borrow["book"]["available_copies"], 0);
    assert!(borrow["return_date"].is_null());

    let (_, active) = get(&client, &member, "/borrow/active").await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    // Last copy is out
    let (other, _) = new_member(&client).await;
    let (status, body) = post(&client, &other, "/borrow", json!({ "book_id": book_id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No available copies for this book.");

    let borrow_id = borrow["id"].as_i64().unwrap();

    // Another member cannot return it
    let (status, _) = post(&client, &other, "/return", json!({ "borrow_id": borrow_id })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(&client, &member, "/return", json!({ "borrow_id": borrow_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book returned successfully.");
    assert_eq!(body["days_late"], 0);

    let (status, body) = post(&client, &member, "/return", json!({ "borrow_id": borrow_id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This book has already been returned.");

    let (_, book) = get(&client, "", &format!("/books/{}", book_id)).await;
    assert_eq!(book["available_copies"], 1);

    let (_, active) = get(&client, &member, "/borrow/active").await;
    assert!(active.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_borrow_unknown_book() {
    let client = Client::new();
    let (member, _) = new_member(&client).await;

    let (status, body) = post(&client, &member, "/borrow", json!({ "book_id": 999999999 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["book_id"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_borrow_limit() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, _, book_id) = seed_book(&client, &admin, 5).await;
    let (member, _) = new_member(&client).await;

    for _ in 0..3 {
        let (status, _) = post(&client, &member, "/borrow", json!({ "book_id": book_id })).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = post(&client, &member, "/borrow", json!({ "book_id": book_id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have reached your borrowing limit (3 books).");

    let (_, book) = get(&client, "", &format!("/books/{}", book_id)).await;
    assert_eq!(book["available_copies"], 2);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_borrow_of_last_copy() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, _, book_id) = seed_book(&client, &admin, 1).await;
    let (first, _) = new_member(&client).await;
    let (second, _) = new_member(&client).await;

    let ((a, _), (b, _)) = tokio::join!(
        post(&client, &first, "/borrow", json!({ "book_id": book_id })),
        post(&client, &second, "/borrow", json!({ "book_id": book_id })),
    );

    let mut statuses = [a, b];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);

    let (_, book) = get(&client, "", &format!("/books/{}", book_id)).await;
    assert_eq!(book["available_copies"], 0);
}

#[tokio::test]
#[ignore]
async fn test_author_delete_cascades() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (author_id, _, book_id) = seed_book(&client, &admin, 1).await;
    let (member, _) = new_member(&client).await;

    let (status, _) = post(&client, &member, "/borrow", json!({ "book_id": book_id })).await;
    assert_eq!(status, StatusCode::CREATED);

    let response = client
        .delete(format!("{}/authors/{}", BASE_URL, author_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = get(&client, "", &format!("/books/{}", book_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, active) = get(&client, &member, "/borrow/active").await;
    assert!(active.as_array().unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_member_cannot_create_book() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (author_id, category_id, _) = seed_book(&client, &admin, 1).await;
    let (member, _) = new_member(&client).await;

    let title = unique("Forbidden");
    let (status, _) = post(
        &client,
        &member,
        "/books",
        json!({
            "title": title,
            "description": "Should not exist",
            "author": author_id,
            "category": category_id,
            "total_copies": 1,
            "available_copies": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, books) = get(&client, "", &format!("/books?author={}", author_id)).await;
    assert!(books.as_array().unwrap().iter().all(|b| b["title"] != title.as_str()));
}
