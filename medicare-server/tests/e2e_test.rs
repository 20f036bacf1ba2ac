//! End-to-end integration tests
//!
//! Runs the full router on a random port and drives it over HTTP and
//! WebSocket: account sessions, password reset, patient and supply CRUD,
//! appointment transitions, presence and realtime refresh with actor
//! exclusion.

use chrono::{Datelike, Duration as ChronoDuration, Weekday};
use futures_util::{SinkExt, StreamExt};
use medicare_core::{Account, AccountKind};
use medicare_server::{build_router, config::ServerConfig, AppState};
use medicare_store::{document_store, HistoryLog, SqliteDocumentStore};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_tungstenite::{connect_async, tungstenite::Message};

struct TestServer {
    base_url: String,
    ws_url: String,
    state: Arc<AppState>,
    _dir: TempDir,
}

/// Start a test server on a random port
async fn start_test_server() -> TestServer {
    let temp_dir = TempDir::new().unwrap();
    let mut config = ServerConfig::default();
    config.auth.session_secret = Some("e2e-secret".to_string());
    config.storage.data_dir = temp_dir.path().to_path_buf();

    let store = SqliteDocumentStore::open(config.documents_db_path()).unwrap();
    let history = HistoryLog::open(config.history_db_path()).unwrap();
    let state = Arc::new(AppState::new(config, Arc::new(store), history).unwrap());

    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        ws_url: format!("ws://{}/ws", addr),
        state,
        _dir: temp_dir,
    }
}

/// Store an account with one live session and return the Authorization value.
fn seed_account(state: &AppState, kind: AccountKind, id: &str) -> String {
    let token = state.signer.issue(id).unwrap();
    let mut account = Account::new(
        id.to_string(),
        format!("{}@example.com", id),
        format!("Account {}", id),
        "unused".to_string(),
    );
    account.add_session(token.clone());
    document_store::save(state.store.as_ref(), kind.collection(), id, &account).unwrap();
    format!("{} {}", id, token)
}

/// Next weekday strictly after today that falls on `weekday`.
fn next(weekday: Weekday) -> String {
    let mut day = chrono::Local::now().date_naive() + ChronoDuration::days(1);
    while day.weekday() != weekday {
        day += ChronoDuration::days(1);
    }
    day.format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_account_session_lifecycle() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let staffs = format!("{}/api/staffs", server.base_url);

    // Sign up
    let resp = client
        .put(&staffs)
        .json(&json!({ "email": "nurse@example.com", "name": "Nurse", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["account"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["account"]["type"], "staff");
    assert!(body["account"].get("credentials").is_none());

    // Same email in another collection
    let resp = client
        .put(format!("{}/api/doctors", server.base_url))
        .json(&json!({ "email": "nurse@example.com", "name": "Doc", "password": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Wrong password
    let resp = client
        .post(&staffs)
        .json(&json!({ "email": "nurse@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Sign in
    let resp = client
        .post(&staffs)
        .json(&json!({ "email": "nurse@example.com", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["credentials"]["type"], "staff");
    assert_eq!(body["credentials"]["id"], id.as_str());
    let session_key = body["credentials"]["sessionKey"].as_str().unwrap().to_string();

    // Authenticate
    let session = json!({ "id": id, "sessionKey": session_key });
    let resp = client
        .post(format!("{}/authenticate", staffs))
        .json(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["account"]["email"], "nurse@example.com");

    // The staff collection does not know a user id
    let resp = client
        .post(format!("{}/api/users/authenticate", server.base_url))
        .json(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Sign out, then the same key is rejected
    let resp = client
        .post(format!("{}/deauthenticate", staffs))
        .json(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/authenticate", staffs))
        .json(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid sessionKey");
}

#[tokio::test]
async fn test_account_patch_and_membership() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let staff = seed_account(&server.state, AccountKind::Staff, "s1");
    let user = seed_account(&server.state, AccountKind::User, "u1");
    seed_account(&server.state, AccountKind::User, "u2");
    let users = format!("{}/api/users", server.base_url);

    // A user may not patch someone else
    let resp = client
        .patch(format!("{}/u2", users))
        .header("Authorization", &user)
        .json(&json!({ "name": "Mallory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Email taken by the staff account
    let resp = client
        .patch(format!("{}/u1", users))
        .header("Authorization", &user)
        .json(&json!({ "email": "s1@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Staff grants a membership
    let resp = client
        .patch(format!("{}/u1", users))
        .header("Authorization", &staff)
        .json(&json!({ "membership": { "rfid": "RF-001", "until": "2099-12-31" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["account"]["membership"]["rfid"], "RF-001");
    let since = body["account"]["membership"]["since"].clone();

    // The same card cannot go to another user
    let resp = client
        .patch(format!("{}/u2", users))
        .header("Authorization", &staff)
        .json(&json!({ "membership": { "rfid": "RF-001", "until": "2099-12-31" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // A patch without the key leaves the membership alone
    let resp = client
        .patch(format!("{}/u1", users))
        .header("Authorization", &user)
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["account"]["name"], "Renamed");
    assert_eq!(body["account"]["membership"]["since"], since);

    // RFID lookup
    let resp = client
        .post(format!("{}/rfid", users))
        .json(&json!({ "rfid": "RF-001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "u1");
    assert_eq!(body["type"], "user");

    // Cancel
    let resp = client
        .patch(format!("{}/u1", users))
        .header("Authorization", &staff)
        .json(&json!({ "membership": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["account"].get("membership").is_none());

    // Bulk lookup skips unknown ids
    let resp = client
        .post(format!("{}/bulk", users))
        .json(&json!({ "ids": ["u1", "u2", "ghost"] }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_patient_crud() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let doctor = seed_account(&server.state, AccountKind::Doctor, "d1");
    let user = seed_account(&server.state, AccountKind::User, "u1");
    let patients = format!("{}/api/patients", server.base_url);

    // Users cannot register patients
    let resp = client
        .put(&patients)
        .header("Authorization", &user)
        .json(&json!({ "name": "Juan", "email": "juan@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Missing email
    let resp = client
        .put(&patients)
        .header("Authorization", &doctor)
        .json(&json!({ "name": "Juan" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .put(&patients)
        .header("Authorization", &doctor)
        .json(&json!({ "name": "Juan", "email": "juan@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["patient"]["id"].as_str().unwrap().to_string();
    assert!(body["patient"]["info"]["profilePicture"].is_string());

    // Medical record
    let resp = client
        .put(format!("{}/{}/medicalRecords", patients, id))
        .header("Authorization", &doctor)
        .json(&json!({ "notes": "Fever", "medications": "Paracetamol" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let record_id = body["record"]["id"].as_str().unwrap().to_string();

    let resp = client
        .patch(format!("{}/{}/medicalRecords/{}", patients, id, record_id))
        .header("Authorization", &doctor)
        .json(&json!({ "notes": "Recovered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/{}/medicalRecords", patients, id))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body[record_id.as_str()]["notes"], "Recovered");

    // Delete, then it is gone
    let resp = client
        .delete(format!("{}/{}", patients, id))
        .header("Authorization", &doctor)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/{}", patients, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_supply_inventory() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let staff = seed_account(&server.state, AccountKind::Staff, "s1");
    let supply = format!("{}/api/supply", server.base_url);

    let resp = client
        .post(format!("{}/categories", supply))
        .header("Authorization", &staff)
        .json(&json!({ "name": "Medicine", "image": "https://cdn.example.com/med.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    let item = json!({
        "name": "Paracetamol",
        "price": 5.5,
        "categoryID": category_id,
        "stock": 10,
        "barcode": "4800001",
    });
    let resp = client
        .post(format!("{}/items", supply))
        .header("Authorization", &staff)
        .json(&item)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Barcodes are unique
    let resp = client
        .post(format!("{}/items", supply))
        .header("Authorization", &staff)
        .json(&item)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Items without a barcode share the placeholder
    for name in ["Gauze", "Tape"] {
        let resp = client
            .post(format!("{}/items", supply))
            .header("Authorization", &staff)
            .json(&json!({ "name": name, "price": 1.0, "categoryID": category_id, "stock": 3 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = client
        .get(format!("{}/barcode?barcode=4800001", supply))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "Paracetamol");

    let resp = client
        .get(format!("{}/barcode", supply))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{}/api/prices", server.base_url))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body[0]["name"], "Medicine");
    assert_eq!(body[0]["items"].as_array().unwrap().len(), 3);

    // Deleting the category removes its items
    let resp = client
        .delete(format!("{}/categories/{}", supply, category_id))
        .header("Authorization", &staff)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{}/items", supply))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_appointment_transitions() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let user = seed_account(&server.state, AccountKind::User, "u1");
    let doctor = seed_account(&server.state, AccountKind::Doctor, "d1");
    let appointments = format!("{}/api/appointments", server.base_url);

    let booking = |service: &str, date: String| {
        json!({
            "patient": { "name": "Ana", "gender": "female", "age": 30, "phone": "0917" },
            "appointment": { "service": service, "date": date, "time": "10:00" },
            "user": { "id": "u1" },
        })
    };

    // Dental is Tuesday only
    let resp = client
        .put(&appointments)
        .header("Authorization", &user)
        .json(&booking("dental", next(Weekday::Wed)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Anonymous booking
    let resp = client
        .put(&appointments)
        .json(&booking("dental", next(Weekday::Tue)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .put(&appointments)
        .header("Authorization", &user)
        .json(&booking("dental", next(Weekday::Tue)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["appointment"]["appointment"]["status"], "pending");
    let id = body["appointment"]["id"].as_str().unwrap().to_string();

    // Users cannot approve
    let resp = client
        .post(format!("{}/approve/{}", appointments, id))
        .header("Authorization", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .post(format!("{}/approve/{}", appointments, id))
        .header("Authorization", &doctor)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Approved is terminal
    let resp = client
        .post(format!("{}/cancel/{}", appointments, id))
        .header("Authorization", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .get(format!("{}/{}", appointments, id))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["appointment"]["status"], "approved");
}

#[tokio::test]
async fn test_history_records_mutations() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let staff = seed_account(&server.state, AccountKind::Staff, "s1");

    let resp = client
        .put(format!("{}/api/patients", server.base_url))
        .header("Authorization", &staff)
        .json(&json!({ "name": "Juan", "email": "juan@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // The append runs in the background
    let mut records = Value::Null;
    for _ in 0..50 {
        records = client
            .get(format!("{}/api/history/patients/profile", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if records.as_array().is_some_and(|r| !r.is_empty()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(records[0]["action"], "create");
    assert_eq!(records[0]["actor"]["id"], "s1");
    assert_eq!(records[0]["actor"]["type"], "staff");

    let routes: Value = client
        .get(format!("{}/api/routes", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(routes[0]["name"], "patients");
    assert_eq!(routes[0]["subroutes"], json!(["profile"]));
}

#[tokio::test]
async fn test_realtime_refresh_skips_causing_session() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let author = seed_account(&server.state, AccountKind::Staff, "s1");
    let watcher = seed_account(&server.state, AccountKind::Staff, "s2");

    let (mut author_ws, _) = connect_async(server.ws_url.as_str()).await.unwrap();
    let (mut watcher_ws, _) = connect_async(server.ws_url.as_str()).await.unwrap();

    for (ws, authorization) in [(&mut author_ws, &author), (&mut watcher_ws, &watcher)] {
        let (id, key) = authorization.split_once(' ').unwrap();
        let credentials = json!({ "type": "credentials", "credentials": { "id": id, "sessionKey": key } });
        ws.send(Message::Text(credentials.to_string().into())).await.unwrap();
        let subscribe = json!({ "type": "subscribe", "page": "patients" });
        ws.send(Message::Text(subscribe.to_string().into())).await.unwrap();
    }

    // Wait until both connections are registered
    for _ in 0..50 {
        let health: Value = client
            .get(format!("{}/health", server.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if health["connections"] == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let active: Value = client
        .get(format!("{}/api/active", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active.as_array().unwrap().len(), 2);

    let resp = client
        .put(format!("{}/api/patients", server.base_url))
        .header("Authorization", &author)
        .json(&json!({ "name": "Juan", "email": "juan@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let frame = tokio::time::timeout(Duration::from_secs(2), watcher_ws.next())
        .await
        .expect("watcher should be notified")
        .unwrap()
        .unwrap();
    let notice: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(notice, json!({ "type": "refresh", "from": "patients" }));

    // The author's own page is not refreshed
    let silent = tokio::time::timeout(Duration::from_millis(300), author_ws.next()).await;
    assert!(silent.is_err());
}

#[tokio::test]
async fn test_user_appointments() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let user = seed_account(&server.state, AccountKind::User, "u1");
    seed_account(&server.state, AccountKind::User, "u2");
    let appointments = format!("{}/api/appointments", server.base_url);

    let resp = client
        .put(&appointments)
        .header("Authorization", &user)
        .json(&json!({
            "patient": { "name": "Ana", "gender": "female", "age": 30, "phone": "0917" },
            "appointment": { "service": "checkup", "date": next(Weekday::Wed), "time": "10:00" },
            "user": { "id": "u1" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let mine: Value = client
        .get(format!("{}/user/u1", appointments))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["user"]["id"], "u1");

    let theirs: Value = client
        .get(format!("{}/user/u2", appointments))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(theirs, json!([]));

    let resp = client
        .get(format!("{}/user/nobody", appointments))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_forgot_password_flow() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let old_session = seed_account(&server.state, AccountKind::User, "u1");
    let forgot = format!("{}/api/forgotPassword", server.base_url);

    let resp = client.post(&forgot).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(&forgot)
        .json(&json!({ "email": "ghost@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(&forgot)
        .json(&json!({ "email": "u1@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "OTP sent to your email");

    let codes = server
        .state
        .store
        .find_by("OTP", "email", &json!("u1@example.com"))
        .unwrap();
    assert_eq!(codes.len(), 1);
    let code = codes[0].1["OTP"].as_str().unwrap().to_string();

    // No proof yet
    let resp = client
        .post(format!("{}/reset", forgot))
        .json(&json!({ "email": "u1@example.com", "password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/verify", forgot))
        .json(&json!({ "email": "u1@example.com", "OTP": "000-000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/verify", forgot))
        .json(&json!({ "email": "u1@example.com", "OTP": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/reset", forgot))
        .json(&json!({ "email": "u1@example.com", "password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Password updated");

    // Codes are spent and every session is gone
    assert!(server
        .state
        .store
        .find_by("OTP", "email", &json!("u1@example.com"))
        .unwrap()
        .is_empty());
    let account: Account = document_store::load(server.state.store.as_ref(), "users", "u1")
        .unwrap()
        .unwrap();
    assert!(account.credentials.sessions.is_empty());

    let resp = client
        .delete(format!("{}/api/users/u1", server.base_url))
        .header("Authorization", &old_session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({ "email": "u1@example.com", "password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_active_by_id_and_collection() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let staff = seed_account(&server.state, AccountKind::Staff, "s1");
    seed_account(&server.state, AccountKind::User, "u1");

    let (mut ws, _) = connect_async(server.ws_url.as_str()).await.unwrap();
    let (id, key) = staff.split_once(' ').unwrap();
    let credentials = json!({ "type": "credentials", "credentials": { "id": id, "sessionKey": key } });
    ws.send(Message::Text(credentials.to_string().into())).await.unwrap();

    for _ in 0..50 {
        if server.state.hub.connection_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let one: Value = client
        .get(format!("{}/api/active/s1", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(one["id"], "s1");
    assert_eq!(one["type"], "staff");
    assert!(one.get("credentials").is_none());
    assert!(one.get("sessionKey").is_none());

    let staffs: Value = client
        .get(format!("{}/api/active/staffs", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(staffs.as_array().unwrap().len(), 1);

    let users: Value = client
        .get(format!("{}/api/active/users", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users, json!([]));

    // Stored but not connected
    let resp = client
        .get(format!("{}/api/active/u1", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
