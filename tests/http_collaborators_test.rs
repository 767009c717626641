use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use popauth::models::auth::Login;
use popauth::oauth::{AuthAction, OAuthError, ProfileFetcher, ProfileSource};
use popauth::popup::AccessToken;
use popauth::session::backend::{AuthBackend, BackendError, FederatedLoginRequest, HttpAuthBackend};
use popauth::session::store::{current_user, FileStore};
use popauth::session::SessionReconciler;
use popauth::testing::mock::RecordingFeedback;
use popauth::testing::TestFixtures;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GOOD_TOKEN: &str = "good-token";
const TAKEN_EMAIL: &str = "taken@x.com";

/// Stand-in for both the identity provider and the application backend
#[derive(Default)]
struct FakeUpstream {
    posted: Mutex<Vec<Value>>,
}

async fn google_userinfo(req: HttpRequest) -> HttpResponse {
    let authorized = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {GOOD_TOKEN}").as_str());
    if authorized {
        HttpResponse::Ok().json(TestFixtures::google_userinfo())
    } else {
        HttpResponse::Unauthorized().json(json!({"error": {"message": "Invalid Credentials"}}))
    }
}

async fn facebook_me(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let token_ok = query.get("access_token").map(String::as_str) == Some(GOOD_TOKEN);
    let fields_ok = query.get("fields").map(String::as_str) == Some("id,name,email");
    if token_ok && fields_ok {
        HttpResponse::Ok().json(TestFixtures::facebook_userinfo())
    } else {
        HttpResponse::BadRequest().json(json!({"error": {"message": "Invalid OAuth access token"}}))
    }
}

async fn federated_login(
    upstream: web::Data<FakeUpstream>,
    body: web::Json<Value>,
) -> HttpResponse {
    let body = body.into_inner();
    upstream.posted.lock().unwrap().push(body.clone());
    if body["email"] == TAKEN_EMAIL {
        return HttpResponse::Conflict().json(json!({"message": "duplicate email"}));
    }
    HttpResponse::Ok().json(json!({
        "user": {"id": 1, "name": body["name"], "email": body["email"]},
        "token": "session-token"
    }))
}

async fn password_login(body: web::Json<Value>) -> HttpResponse {
    if body["password"] == "correct horse" {
        HttpResponse::Ok().json(json!({"user": {"id": 2, "email": body["email"]}}))
    } else {
        HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}))
    }
}

async fn broken_gateway() -> HttpResponse {
    HttpResponse::BadGateway().body("<html>502</html>")
}

/// Serve the fake upstream on an ephemeral port and return its base URL
fn spawn_upstream(upstream: Arc<FakeUpstream>) -> String {
    let data = web::Data::from(upstream);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/oauth2/v2/userinfo", web::get().to(google_userinfo))
            .route("/me", web::get().to(facebook_me))
            .route("/auth/google", web::post().to(federated_login))
            .route("/auth/login", web::post().to(password_login))
            .route("/auth/register", web::post().to(broken_gateway))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let address = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{address}")
}

fn fetcher(base: &str) -> ProfileFetcher {
    ProfileFetcher::new(Arc::new(TestFixtures::settings_against(base)))
}

fn backend(base: &str) -> HttpAuthBackend {
    HttpAuthBackend::from_settings(&TestFixtures::settings_against(base).backend).unwrap()
}

#[actix_web::test]
async fn test_google_profile_uses_bearer_header() {
    let base = spawn_upstream(Arc::default());

    let profile = fetcher(&base)
        .fetch(AuthAction::Google, &AccessToken::new(GOOD_TOKEN))
        .await
        .unwrap();

    assert_eq!(profile, TestFixtures::google_profile());
    assert_eq!(profile.photo_url.as_deref(), Some("http://p"));
}

#[actix_web::test]
async fn test_facebook_profile_uses_query_token() {
    let base = spawn_upstream(Arc::default());

    let profile = fetcher(&base)
        .fetch_profile(AuthAction::Facebook, &AccessToken::new(GOOD_TOKEN))
        .await
        .unwrap();

    assert_eq!(profile, TestFixtures::facebook_profile());
    assert_eq!(profile.photo_url, None);
}

#[actix_web::test]
async fn test_rejected_token_is_a_status_error() {
    let base = spawn_upstream(Arc::default());

    let err = fetcher(&base)
        .fetch(AuthAction::Google, &AccessToken::new("expired"))
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthError::Status(401)));
}

#[actix_web::test]
async fn test_unreachable_provider_is_a_network_error() {
    let closed_port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = format!("http://127.0.0.1:{closed_port}");

    let err = fetcher(&base)
        .fetch(AuthAction::Facebook, &AccessToken::new(GOOD_TOKEN))
        .await
        .unwrap_err();

    assert!(matches!(err, OAuthError::Network(_)));
}

#[actix_web::test]
async fn test_federated_login_posts_provider_scoped_id() {
    let upstream = Arc::new(FakeUpstream::default());
    let base = spawn_upstream(Arc::clone(&upstream));

    let response = backend(&base)
        .federated_login(&FederatedLoginRequest::new(
            AuthAction::Google,
            TestFixtures::google_profile(),
        ))
        .await
        .unwrap();

    assert_eq!(response.user.email(), Some("a@x.com"));
    assert_eq!(response.extra["token"], "session-token");
    assert_eq!(
        upstream.posted.lock().unwrap()[0],
        json!({"name": "Ada", "googleId": "42", "email": "a@x.com", "photoUrl": "http://p"})
    );
}

#[actix_web::test]
async fn test_backend_error_message_is_surfaced() {
    let base = spawn_upstream(Arc::default());
    let mut profile = TestFixtures::facebook_profile();
    profile.email = Some(TAKEN_EMAIL.to_string());

    let err = backend(&base)
        .federated_login(&FederatedLoginRequest::new(AuthAction::Facebook, profile))
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        BackendError::Rejected { status: 409, message } if message == "duplicate email"
    ));
    assert_eq!(err.user_message(), "duplicate email");
}

#[actix_web::test]
async fn test_password_login_and_non_json_failures() {
    let base = spawn_upstream(Arc::default());
    let backend = backend(&base);

    let wrong = Login {
        email: "a@x.com".to_string(),
        password: "nope".to_string(),
    };
    let err = backend.login(&wrong).await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid credentials");

    let err = backend.register(&TestFixtures::signup()).await.unwrap_err();
    assert!(matches!(
        &err,
        BackendError::Rejected { status: 502, message }
            if message == "Request failed with status 502"
    ));
}

#[actix_web::test]
async fn test_reconcile_over_http_persists_to_disk() {
    let base = spawn_upstream(Arc::default());
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("session")));
    let recorder = RecordingFeedback::new();
    let reconciler = SessionReconciler::new(
        Arc::new(backend(&base)),
        store.clone(),
        recorder.feedback(),
        Duration::ZERO,
        "/",
    );

    let record = reconciler
        .reconcile(AuthAction::Google, TestFixtures::google_profile())
        .await
        .unwrap();

    assert_eq!(current_user(store.as_ref()).unwrap(), Some(record));
    let on_disk = std::fs::read_to_string(dir.path().join("session").join("user.json")).unwrap();
    assert_eq!(on_disk, r#"{"id":1,"name":"Ada","email":"a@x.com"}"#);
}
