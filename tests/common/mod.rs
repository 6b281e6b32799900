//! Shared fixtures for the integration tests.
//!
//! Every test app runs on a [`ManualClock`] so expiry can be tested to the
//! second, and on a [`RecordingMailer`] so tests can read the codes that
//! would have been emailed.

#![allow(dead_code)]

pub mod mocks;

use axum_test::TestServer;
use cvault::{
    api,
    auth::clock::ManualClock,
    db::{MemoryUserStore, NewUser, User, UserStore},
    types::{Identity, Role},
    utils::toml_config::{AppConfig, PasswordConfig},
    AppState,
};
use mocks::RecordingMailer;
use std::sync::{Arc, Once};

pub const TEST_SECRET_ENV: &str = "CVAULT_TEST_JWT_SECRET";
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Config with cheap Argon2 parameters and the standard access table.
pub fn test_config() -> AppConfig {
    static SECRET: Once = Once::new();
    SECRET.call_once(|| std::env::set_var(TEST_SECRET_ENV, TEST_SECRET));

    let mut config = AppConfig::default();
    config.auth.jwt_secret_env = TEST_SECRET_ENV.to_string();
    config.auth.password = PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };
    config
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_mailer(config, Arc::new(RecordingMailer::new()))
    }

    pub fn with_mailer(config: AppConfig, mailer: Arc<RecordingMailer>) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let state = AppState::new(
            config,
            Arc::new(MemoryUserStore::new()),
            mailer.clone(),
            clock.clone(),
        )
        .expect("test state should build");

        let server =
            TestServer::new(api::create_router(state.clone())).expect("Failed to create test server");

        Self {
            server,
            state,
            clock,
            mailer,
        }
    }

    /// Inserts an account directly into the store.
    pub async fn seed_user(&self, email: &str, password: &str, role: Role, enabled: bool) -> User {
        let password_hash = self
            .state
            .passwords
            .hash(password)
            .expect("should hash password");

        self.state
            .users
            .create_user(NewUser {
                email: email.to_string(),
                name: format!("{} user", role),
                password_hash,
                role,
                enabled,
                must_change_password: false,
            })
            .await
            .expect("should seed user")
    }

    /// A valid session token minted directly by the authority.
    pub fn token_for(&self, email: &str, role: Role) -> String {
        self.state
            .tokens
            .issue(&Identity::new(email, role))
            .expect("should issue token")
            .token
    }
}
