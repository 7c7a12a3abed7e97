/*!
 * Method Channel
 * Maps inbound method calls onto the bonding service
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bluetooth::{validate, BondResult, BondingService};
use crate::config::ChannelConfig;

pub const CREATE_BOND: &str = "createBond";

pub const MALFORMED_CALL: &str = "MALFORMED_CALL";
pub const BOND_FAILED: &str = "BOND_FAILED";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    /// A string argument by name. Absent, null and non-string values all read as `None`.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MethodResponse {
    Success { result: Value },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        MethodResponse::Success {
            result: result.into(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        MethodResponse::Error {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

pub struct BondChannel {
    bonding: BondingService,
    surface_adapter_faults: bool,
}

impl BondChannel {
    pub fn new(bonding: BondingService, config: &ChannelConfig) -> Self {
        Self {
            bonding,
            surface_adapter_faults: config.surface_adapter_faults,
        }
    }

    pub async fn handle(&self, call: &MethodCall) -> MethodResponse {
        match call.method.as_str() {
            CREATE_BOND => self.create_bond(call).await,
            other => {
                tracing::debug!("Method not implemented: {}", other);
                MethodResponse::NotImplemented
            }
        }
    }

    async fn create_bond(&self, call: &MethodCall) -> MethodResponse {
        let address = match validate(call.argument_str("address")) {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("Rejected {}: {}", CREATE_BOND, e);
                return MethodResponse::error(e.code(), e.to_string());
            }
        };

        match self.bonding.request_bond(&address).await {
            BondResult::Bonded => MethodResponse::success(true),
            BondResult::NotBonded => MethodResponse::success(false),
            BondResult::Failed(reason) if self.surface_adapter_faults => {
                MethodResponse::error(BOND_FAILED, reason)
            }
            BondResult::Failed(_) => MethodResponse::success(false),
        }
    }
}
