// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use baggo_ledger::application::{TransferRequest, WalletService};
use baggo_ledger::payments::{Charge, ChargeRequest, GatewayError, PaymentProcessor};
use tempfile::TempDir;

/// Scripted outcome for charge attempts.
#[derive(Debug, Clone)]
pub enum ChargeScript {
    Succeed,
    Decline(String),
    Ambiguous(String),
}

/// Test double for the payment processor: records every request and answers
/// according to the current script.
pub struct ScriptedProcessor {
    script: Mutex<ChargeScript>,
    requests: Mutex<Vec<ChargeRequest>>,
    charges_created: Mutex<u64>,
}

impl ScriptedProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(ChargeScript::Succeed),
            requests: Mutex::new(Vec::new()),
            charges_created: Mutex::new(0),
        })
    }

    pub fn set_script(&self, script: ChargeScript) {
        *self.script.lock().unwrap() = script;
    }

    /// All charge requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        match self.script.lock().unwrap().clone() {
            ChargeScript::Succeed => {
                let mut counter = self.charges_created.lock().unwrap();
                *counter += 1;
                Ok(Charge {
                    id: format!("pi_test_{counter}"),
                    client_secret: format!("pi_test_{counter}_secret"),
                })
            }
            ChargeScript::Decline(message) => Err(GatewayError::Declined(message)),
            ChargeScript::Ambiguous(message) => Err(GatewayError::Ambiguous(message)),
        }
    }
}

/// Helper to create a test service with a temporary database and a scripted
/// payment processor.
pub async fn test_service() -> Result<(WalletService, Arc<ScriptedProcessor>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let processor = ScriptedProcessor::new();
    let service = WalletService::init(db_path.to_str().unwrap(), processor.clone()).await?;
    Ok((service, processor, temp_dir))
}

/// Build a transfer request with attempt 1.
pub fn transfer_request(from: &str, to: &str, amount_cents: i64, trip: &str) -> TransferRequest {
    TransferRequest {
        sender_id: from.to_string(),
        recipient_id: to.to_string(),
        amount_cents,
        trip_id: trip.to_string(),
        attempt: 1,
    }
}
