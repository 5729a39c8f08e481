//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use admission_guard::config::GuardConfig;
use admission_guard::http::{AppState, Collaborators, HttpServer, LogOtpProvider};
use admission_guard::lifecycle::Shutdown;
use admission_guard::store::MemoryPersistence;
use tokio::net::TcpListener;

pub const SECRET: &str = "integration-test-secret";

/// A guard running on an ephemeral port with in-process collaborators.
pub struct TestGuard {
    pub base_url: String,
    pub client: reqwest::Client,
    pub otp: Arc<LogOtpProvider>,
    pub persistence: Arc<MemoryPersistence>,
    pub shutdown: Arc<Shutdown>,
}

impl TestGuard {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and return the access and refresh tokens.
    pub async fn login(&self, user_id: &str, password: &str) -> (String, String) {
        let res = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "user_id": user_id, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "login for {user_id} failed");
        let body: serde_json::Value = res.json().await.unwrap();
        (
            body["data"]["access_token"].as_str().unwrap().to_string(),
            body["data"]["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.tokens.secret = SECRET.to_string();
    config
}

/// Start a guard with `alice` (user), `root` (admin) and `bob` (inactive).
pub async fn start_guard(config: GuardConfig) -> TestGuard {
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.insert_account("alice", "user", true, "alice-pw");
    persistence.insert_account("root", "admin", true, "root-pw");
    persistence.insert_account("bob", "user", false, "bob-pw");
    let otp = Arc::new(LogOtpProvider::new());

    let state = AppState::new(
        &config,
        Collaborators {
            persistence: persistence.clone(),
            credentials: persistence.clone(),
            otp_provider: otp.clone(),
            store: None,
        },
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config.listener.clone(), state);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    TestGuard {
        base_url: format!("http://{addr}"),
        client,
        otp,
        persistence,
        shutdown,
    }
}
