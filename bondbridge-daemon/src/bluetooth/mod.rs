/*!
 * Bluetooth Bonding
 * Ask the host stack to bond with a remote device and classify the outcome
 */

pub mod bluez;
mod validator;

#[cfg(test)]
pub mod fake;

pub use bluez::BluezAdapter;
pub use validator::validate;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Handle to a remote device, resolved from its hardware address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    pub address: String,
    pub object_path: String,
}

/// Outcome of a single bond request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondResult {
    /// The host stack accepted the request and started pairing.
    Bonded,
    /// The host stack declined to start pairing (already bonded, busy, rejected).
    NotBonded,
    /// Resolving the adapter or device, or invoking the primitive, faulted.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum AdapterFault {
    #[error("bluetooth adapter unavailable: {0}")]
    Unavailable(String),
    #[error("bluetooth adapter {0} is powered off")]
    PoweredOff(String),
    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),
    #[error("{name}: {message}")]
    Bus { name: String, message: String },
}

/// The host's default Bluetooth adapter.
///
/// Implementations report every failure as an [`AdapterFault`] value.
#[async_trait]
pub trait BluetoothAdapter: Send + Sync {
    /// Resolve a remote device reference for `address` on the default adapter.
    async fn remote_device(&self, address: &str) -> Result<RemoteDevice, AdapterFault>;

    /// Ask the host stack to start bonding with `device`.
    ///
    /// `Ok(true)` means the request was initiated, not that pairing finished.
    async fn create_bond(&self, device: &RemoteDevice) -> Result<bool, AdapterFault>;
}

#[derive(Clone)]
pub struct BondingService {
    adapter: Arc<dyn BluetoothAdapter>,
}

impl BondingService {
    pub fn new(adapter: Arc<dyn BluetoothAdapter>) -> Self {
        Self { adapter }
    }

    /// Make one bonding attempt for `address`. Never fails: every fault,
    /// including a panic inside the adapter, is folded into [`BondResult::Failed`].
    pub async fn request_bond(&self, address: &str) -> BondResult {
        let adapter = Arc::clone(&self.adapter);
        let target = address.to_string();

        let attempt = tokio::spawn(async move {
            let device = adapter.remote_device(&target).await?;
            tracing::debug!("Resolved {} to {}", device.address, device.object_path);
            adapter.create_bond(&device).await
        });

        match attempt.await {
            Ok(Ok(true)) => {
                tracing::info!("Bonding initiated with {}", address);
                BondResult::Bonded
            }
            Ok(Ok(false)) => {
                tracing::info!("Bonding not initiated with {}", address);
                BondResult::NotBonded
            }
            Ok(Err(fault)) => {
                tracing::warn!("Bonding with {} failed: {}", address, fault);
                BondResult::Failed(fault.to_string())
            }
            Err(e) => {
                tracing::error!("Bonding task for {} aborted: {}", address, e);
                BondResult::Failed(format!("bond attempt aborted: {}", e))
            }
        }
    }
}
