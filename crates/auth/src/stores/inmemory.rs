//! In-memory flow and code storage for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use gatehouse_core::auth::{
    attempts_exhausted, auth_flow_ttl, is_code_expired, is_flow_expired, AuthFlowRepository,
    AuthFlowState, Result, VerificationCode, VerificationCodeRepository,
};

/// In-memory store for auth flows and verification codes.
///
/// Stores entries in HashMaps wrapped in `Arc<RwLock<_>>`. Data is not
/// persisted and will be lost when the store is dropped. Expired flows and
/// codes are swept whenever a new one is stored.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthStore {
    auth_flows: Arc<RwLock<HashMap<String, AuthFlowState>>>,
    codes: Arc<RwLock<HashMap<String, StoredCode>>>,
}

#[derive(Debug, Clone)]
struct StoredCode {
    code: VerificationCode,
    failed_attempts: u32,
}

impl MemoryAuthStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthFlowRepository for MemoryAuthStore {
    async fn store_auth_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        let now = Utc::now();
        let mut flows = self.auth_flows.write().await;
        flows.retain(|_, stored| !is_flow_expired(stored, now, auth_flow_ttl()));
        flows.insert(state.to_string(), flow.clone());
        Ok(())
    }

    async fn take_auth_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        let mut flows = self.auth_flows.write().await;
        Ok(flows
            .remove(state)
            .filter(|flow| !is_flow_expired(flow, Utc::now(), auth_flow_ttl())))
    }
}

#[async_trait]
impl VerificationCodeRepository for MemoryAuthStore {
    async fn store_code(&self, code: &VerificationCode) -> Result<()> {
        let now = Utc::now();
        let mut codes = self.codes.write().await;
        codes.retain(|_, stored| !is_code_expired(&stored.code, now));
        codes.insert(
            code.email.clone(),
            StoredCode {
                code: code.clone(),
                failed_attempts: 0,
            },
        );
        Ok(())
    }

    async fn take_code(&self, email: &str, code: &str) -> Result<Option<VerificationCode>> {
        let mut codes = self.codes.write().await;
        let Some(stored) = codes.get_mut(email) else {
            return Ok(None);
        };

        if stored.code.code == code {
            return Ok(codes.remove(email).map(|stored| stored.code));
        }

        stored.failed_attempts += 1;
        if attempts_exhausted(stored.failed_attempts) {
            codes.remove(email);
        }
        Ok(None)
    }
}
