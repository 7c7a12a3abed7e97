//! In-memory adapter for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{AdapterFault, BluetoothAdapter, RemoteDevice};

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Starts pairing once, then reports the device as already bonded.
    Accept,
    Decline,
    BusError,
    Panic,
}

pub struct FakeAdapter {
    present: bool,
    outcomes: HashMap<String, Outcome>,
    delays: HashMap<String, Duration>,
    paired: Mutex<HashSet<String>>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self {
            present: true,
            outcomes: HashMap::new(),
            delays: HashMap::new(),
            paired: Mutex::new(HashSet::new()),
        }
    }

    pub fn without_adapter() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn with(mut self, address: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(address.to_string(), outcome);
        self
    }

    pub fn with_delay(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(address.to_string(), delay);
        self
    }
}

#[async_trait]
impl BluetoothAdapter for FakeAdapter {
    async fn remote_device(&self, address: &str) -> Result<RemoteDevice, AdapterFault> {
        if !self.present {
            return Err(AdapterFault::Unavailable("no adapter".to_string()));
        }
        if !self.outcomes.contains_key(address) {
            return Err(AdapterFault::InvalidAddress(address.to_string()));
        }
        Ok(RemoteDevice {
            address: address.to_string(),
            object_path: format!("/fake/dev_{}", address.replace(':', "_")),
        })
    }

    async fn create_bond(&self, device: &RemoteDevice) -> Result<bool, AdapterFault> {
        if let Some(delay) = self.delays.get(&device.address) {
            tokio::time::sleep(*delay).await;
        }

        match self.outcomes[&device.address] {
            Outcome::Accept => Ok(self.paired.lock().unwrap().insert(device.address.clone())),
            Outcome::Decline => Ok(false),
            Outcome::BusError => Err(AdapterFault::Bus {
                name: "org.bluez.Error.AuthenticationFailed".to_string(),
                message: "Authentication Failed".to_string(),
            }),
            Outcome::Panic => panic!("adapter blew up"),
        }
    }
}
