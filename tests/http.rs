use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct CountResponse {
    date: String,
    count: u32,
    goal: u32,
}

#[derive(Debug, Deserialize)]
struct HistoryCell {
    day: u32,
    count: u32,
    goal_met: bool,
}

#[derive(Debug, Deserialize)]
struct HistorySeries {
    goal: u32,
    days: Vec<HistoryCell>,
}

struct TestServer {
    base_url: String,
    data_path: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static USER_SEQ: AtomicU32 = AtomicU32::new(0);

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("water_log_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_water_log"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", &data_path)
        .env("APP_EXPOSE_TOKENS", "1")
        .env("APP_MAX_FAILED_LOGINS", "3")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer {
        base_url,
        data_path,
        child,
    }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

fn unique_email(prefix: &str) -> String {
    let seq = USER_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}{seq}.{}@example.com", std::process::id())
}

fn registration(email: &str) -> Value {
    json!({
        "name": "Sofia",
        "surname": "Lopez",
        "email": email,
        "password": "hydrate42",
        "password_confirm": "hydrate42",
        "country": "AR",
        "goal": 8
    })
}

/// Registers, verifies and signs in a fresh user; returns (token, user_id).
async fn signed_in_user(client: &Client, server: &TestServer, prefix: &str) -> (String, String) {
    sign_up_and_in(client, server, &unique_email(prefix)).await
}

async fn sign_up_and_in(client: &Client, server: &TestServer, email: &str) -> (String, String) {
    let registered: Value = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&registration(&email))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let verification = registered["verification_token"].as_str().expect("token exposed");

    let verified = client
        .post(format!("{}/api/auth/verify", server.base_url))
        .json(&json!({ "token": verification }))
        .send()
        .await
        .unwrap();
    assert!(verified.status().is_success());

    let login: Value = client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": "hydrate42" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    (
        login["token"].as_str().unwrap().to_string(),
        login["user_id"].as_str().unwrap().to_string(),
    )
}

async fn login(client: &Client, server: &TestServer, email: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn change(client: &Client, server: &TestServer, token: &str, date: &str, delta: i64) -> CountResponse {
    client
        .post(format!("{}/api/count", server.base_url))
        .bearer_auth(token)
        .json(&json!({ "date": date, "delta": delta }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_gate_shows_login_without_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let page = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Sign up"));

    let response = client
        .get(format!("{}/api/count", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_registration_rejects_password_equal_to_name() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let email = unique_email("namepass");

    let mut form = registration(&email);
    form["name"] = json!("Valeria");
    form["password"] = json!("VALERIA");
    form["password_confirm"] = json!("VALERIA");
    let response = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["fields"]["password"].is_string());

    // nothing was written, so the email is still free
    let response = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&registration(&email))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn http_unverified_login_is_refused() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let email = unique_email("unverified");

    let response = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&registration(&email))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/api/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": "hydrate42" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let duplicate = client
        .post(format!("{}/api/auth/register", server.base_url))
        .json(&registration(&email))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn http_counter_floors_at_zero_and_resets() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let (token, _) = signed_in_user(&client, &server, "counter").await;

    let today: CountResponse = client
        .get(format!("{}/api/count", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(today.count, 0);
    assert_eq!(today.goal, 8);

    let date = "2026-01-15";
    assert_eq!(change(&client, &server, &token, date, -1).await.count, 0);
    for expected in 1..=3 {
        assert_eq!(change(&client, &server, &token, date, 1).await.count, expected);
    }
    assert_eq!(change(&client, &server, &token, date, -5).await.count, 0);
    assert_eq!(change(&client, &server, &token, date, 4).await.count, 4);

    let unconfirmed = client
        .post(format!("{}/api/count/reset", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "date": date }))
        .send()
        .await
        .unwrap();
    assert_eq!(unconfirmed.status(), StatusCode::BAD_REQUEST);

    let reset: CountResponse = client
        .post(format!("{}/api/count/reset", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "date": date, "confirm": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset.count, 0);
    assert_eq!(reset.date, date);

    let bad_date = client
        .get(format!("{}/api/count?date=15-01-2026", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(bad_date.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_history_and_preferences() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let (token, _) = signed_in_user(&client, &server, "history").await;

    change(&client, &server, &token, "2026-02-10", 9).await;
    change(&client, &server, &token, "2026-02-11", 3).await;

    let month: HistorySeries = client
        .get(format!("{}/api/history?view=month&date=2026-02-15", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(month.days.len(), 28);
    assert_eq!(month.goal, 8);
    assert_eq!(month.days[9].day, 10);
    assert_eq!(month.days[9].count, 9);
    assert!(month.days[9].goal_met);
    assert!(!month.days[10].goal_met);

    let week: HistorySeries = client
        .get(format!("{}/api/history?view=week&date=2026-02-10", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(week.days.len(), 7);
    assert_eq!(week.days[3].count, 9);

    let too_big = client
        .put(format!("{}/api/preferences", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "goal": 25 }))
        .send()
        .await
        .unwrap();
    assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

    let prefs: Value = client
        .put(format!("{}/api/preferences", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "goal": 10, "theme": "dark" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prefs["goal"], 10);
    assert_eq!(prefs["theme"], "dark");

    let month: HistorySeries = client
        .get(format!("{}/api/history?view=month&date=2026-02-15", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(month.goal, 10);
    assert!(!month.days[9].goal_met);

    let records: Value = client
        .get(format!("{}/api/history/records", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = records["records"].as_array().unwrap();
    assert!(records.len() >= 2);
    let dates: Vec<&str> = records.iter().map(|r| r["date"].as_str().unwrap()).collect();
    let mut sorted = dates.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
}

#[tokio::test]
async fn http_account_deletion_leaves_no_records() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let (token, user_id) = signed_in_user(&client, &server, "delete").await;

    for day in 1..=5 {
        change(&client, &server, &token, &format!("2026-03-{day:02}"), 2).await;
    }

    let wrong = client
        .delete(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "password": "not-it", "confirm": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let deleted = client
        .delete(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "password": "hydrate42", "confirm": true }))
        .send()
        .await
        .unwrap();
    assert!(deleted.status().is_success());

    let after = client
        .get(format!("{}/api/count", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    let stored: Value = serde_json::from_slice(&std::fs::read(&server.data_path).unwrap()).unwrap();
    assert!(stored["records"].get(&user_id).is_none());
    assert!(stored["profiles"].get(&user_id).is_none());
    assert!(stored["accounts"].get(&user_id).is_none());
}

#[tokio::test]
async fn http_session_reports_profile_and_goal() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let email = unique_email("session");
    let (token, user_id) = sign_up_and_in(&client, &server, &email).await;

    let session: Value = client
        .get(format!("{}/api/session", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["user_id"], user_id.as_str());
    assert_eq!(session["name"], "Sofia");
    assert_eq!(session["email"], email.as_str());
    assert_eq!(session["goal"], 8);
    assert_eq!(session["theme"], "light");
    assert_eq!(session["today"].as_str().unwrap().len(), 10);
}

#[tokio::test]
async fn http_logout_revokes_the_token() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let (token, _) = signed_in_user(&client, &server, "logout").await;

    let response = client
        .post(format!("{}/api/auth/logout", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let cookie = response.headers()[reqwest::header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let after = client
        .get(format!("{}/api/session", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_password_reset_signs_out_everywhere() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let email = unique_email("reset");
    let (old_token, _) = sign_up_and_in(&client, &server, &email).await;

    let forgot: Value = client
        .post(format!("{}/api/auth/password/forgot", server.base_url))
        .json(&json!({ "email": email }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let reset_token = forgot["token"].as_str().expect("token exposed");

    let reset = client
        .post(format!("{}/api/auth/password/reset", server.base_url))
        .json(&json!({ "token": reset_token, "password": "fresh-water" }))
        .send()
        .await
        .unwrap();
    assert!(reset.status().is_success());

    let stale = client
        .get(format!("{}/api/count", server.base_url))
        .bearer_auth(&old_token)
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let reused = client
        .post(format!("{}/api/auth/password/reset", server.base_url))
        .json(&json!({ "token": reset_token, "password": "another-one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reused.status(), StatusCode::BAD_REQUEST);

    assert_eq!(login(&client, &server, &email, "hydrate42").await.status(), StatusCode::UNAUTHORIZED);
    assert!(login(&client, &server, &email, "fresh-water").await.status().is_success());
}

#[tokio::test]
async fn http_form_buttons_redirect_home() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let (token, _) = signed_in_user(&client, &server, "form").await;
    let cookie = format!("session={token}");

    for _ in 0..2 {
        let response = client
            .post(format!("{}/count/increment", server.base_url))
            .header(reqwest::header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[reqwest::header::LOCATION], "/");
    }

    let response = client
        .post(format!("{}/count/decrement", server.base_url))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[reqwest::header::LOCATION], "/");

    let today: CountResponse = client
        .get(format!("{}/api/count", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(today.count, 1);

    let page = client
        .get(format!("{}/", server.base_url))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Sofia"));
}

#[tokio::test]
async fn http_account_update_checks_fields_and_email() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let taken = unique_email("taken");
    sign_up_and_in(&client, &server, &taken).await;
    let email = unique_email("update");
    let (token, _) = sign_up_and_in(&client, &server, &email).await;

    let incomplete = client
        .put(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Sofia", "surname": "", "email": email }))
        .send()
        .await
        .unwrap();
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    let body: Value = incomplete.json().await.unwrap();
    assert_eq!(body["fields"]["form"], "Fill in all fields");

    let conflict = client
        .put(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Sofia", "surname": "Lopez", "email": taken.to_uppercase() }))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let moved = unique_email("moved");
    let updated: Value = client
        .put(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Sofía", "surname": "Lopez Paz", "email": moved }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["surname"], "Lopez Paz");
    assert_eq!(updated["email"], moved.as_str());

    assert_eq!(login(&client, &server, &email, "hydrate42").await.status(), StatusCode::UNAUTHORIZED);
    assert!(login(&client, &server, &moved, "hydrate42").await.status().is_success());
}

#[tokio::test]
async fn http_repeated_failures_lock_login_and_deletion() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let email = unique_email("lockout");
    sign_up_and_in(&client, &server, &email).await;
    for _ in 0..2 {
        assert_eq!(login(&client, &server, &email, "guess123").await.status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(login(&client, &server, &email, "guess123").await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(login(&client, &server, &email, "hydrate42").await.status(), StatusCode::TOO_MANY_REQUESTS);

    let (token, _) = signed_in_user(&client, &server, "lockdel").await;
    let delete = |password: &'static str| {
        client
            .delete(format!("{}/api/account", server.base_url))
            .bearer_auth(&token)
            .json(&json!({ "password": password, "confirm": true }))
            .send()
    };
    for _ in 0..2 {
        assert_eq!(delete("guess123").await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }
    assert_eq!(delete("guess123").await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(delete("hydrate42").await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);

    let account = client
        .get(format!("{}/api/account", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(account.status().is_success());
}
