/*!
 * BlueZ Adapter
 * Device bonding via the org.bluez D-Bus API
 */

use async_trait::async_trait;
use dbus::nonblock::stdintf::org_freedesktop_dbus::Properties;
use dbus::nonblock::{Proxy, SyncConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{AdapterFault, BluetoothAdapter, RemoteDevice};
use crate::config::BluetoothConfig;

const BLUEZ_SERVICE: &str = "org.bluez";
const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
const DEVICE_INTERFACE: &str = "org.bluez.Device1";

const ERROR_ALREADY_EXISTS: &str = "org.bluez.Error.AlreadyExists";
const ERROR_IN_PROGRESS: &str = "org.bluez.Error.InProgress";
const ERROR_NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
const ERROR_TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";

// Property reads answer immediately; only Pair may wait on the remote side.
const PROPERTY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct BluezAdapter {
    adapter: String,
    pair_timeout: Duration,
    connection: OnceCell<Arc<SyncConnection>>,
}

impl BluezAdapter {
    /// The system bus is not touched until the first bond request.
    pub fn new(config: &BluetoothConfig) -> Self {
        Self {
            adapter: config.adapter.clone(),
            pair_timeout: config.pair_timeout(),
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<Arc<SyncConnection>, AdapterFault> {
        self.connection
            .get_or_try_init(|| async {
                let (resource, connection) = dbus_tokio::connection::new_system_sync()
                    .map_err(|e| AdapterFault::Unavailable(describe(&e)))?;

                tokio::spawn(async move {
                    let err = resource.await;
                    tracing::error!("Lost connection to the system bus: {}", err);
                });

                tracing::info!("Connected to BlueZ on the system bus");
                Ok::<_, AdapterFault>(connection)
            })
            .await
            .cloned()
    }

    /// Resolve the default adapter and make sure it can take requests.
    async fn default_adapter(&self) -> Result<(), AdapterFault> {
        let connection = self.connection().await?;
        let path = adapter_path(&self.adapter);
        let proxy = Proxy::new(BLUEZ_SERVICE, path.clone(), PROPERTY_TIMEOUT, connection);

        let powered: bool = proxy
            .get(ADAPTER_INTERFACE, "Powered")
            .await
            .map_err(|e| AdapterFault::Unavailable(format!("{}: {}", path, describe(&e))))?;

        if !powered {
            return Err(AdapterFault::PoweredOff(self.adapter.clone()));
        }

        Ok(())
    }
}

#[async_trait]
impl BluetoothAdapter for BluezAdapter {
    async fn remote_device(&self, address: &str) -> Result<RemoteDevice, AdapterFault> {
        self.default_adapter().await?;
        let address = normalize_address(address)?;

        Ok(RemoteDevice {
            object_path: device_path(&self.adapter, &address),
            address,
        })
    }

    async fn create_bond(&self, device: &RemoteDevice) -> Result<bool, AdapterFault> {
        let connection = self.connection().await?;

        let properties = Proxy::new(
            BLUEZ_SERVICE,
            device.object_path.clone(),
            PROPERTY_TIMEOUT,
            connection.clone(),
        );
        let paired: bool = properties.get(DEVICE_INTERFACE, "Paired").await?;
        if paired {
            tracing::debug!("{} is already paired", device.address);
            return Ok(false);
        }

        let device_proxy = Proxy::new(
            BLUEZ_SERVICE,
            device.object_path.clone(),
            self.pair_timeout,
            connection,
        );
        let reply: Result<(), dbus::Error> =
            device_proxy.method_call(DEVICE_INTERFACE, "Pair", ()).await;

        classify_pair_reply(reply)
    }
}

/// Map the reply of `Device1.Pair` onto "request initiated or not".
///
/// A timeout means BlueZ is still running the handshake (usually waiting on a
/// PIN confirmation), so the request counts as submitted.
fn classify_pair_reply(reply: Result<(), dbus::Error>) -> Result<bool, AdapterFault> {
    match reply {
        Ok(()) => Ok(true),
        Err(e) => match e.name() {
            Some(ERROR_ALREADY_EXISTS) | Some(ERROR_IN_PROGRESS) => {
                tracing::debug!("Pair declined: {}", describe(&e));
                Ok(false)
            }
            Some(ERROR_NO_REPLY) | Some(ERROR_TIMEOUT) => {
                tracing::debug!("Pair still pending on the host");
                Ok(true)
            }
            _ => Err(e.into()),
        },
    }
}

/// Canonical upper-case `XX:XX:XX:XX:XX:XX` form of a hardware address.
fn normalize_address(address: &str) -> Result<String, AdapterFault> {
    let octets: Vec<&str> = address.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

    if !well_formed {
        return Err(AdapterFault::InvalidAddress(address.to_string()));
    }

    Ok(address.to_ascii_uppercase())
}

fn adapter_path(adapter: &str) -> String {
    format!("/org/bluez/{}", adapter)
}

fn device_path(adapter: &str, address: &str) -> String {
    format!("{}/dev_{}", adapter_path(adapter), address.replace(':', "_"))
}

fn describe(err: &dbus::Error) -> String {
    match (err.name(), err.message()) {
        (Some(name), Some(message)) => format!("{}: {}", name, message),
        (Some(name), None) => name.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => "unknown D-Bus error".to_string(),
    }
}

impl From<dbus::Error> for AdapterFault {
    fn from(err: dbus::Error) -> Self {
        AdapterFault::Bus {
            name: err
                .name()
                .unwrap_or("org.freedesktop.DBus.Error.Failed")
                .to_string(),
            message: err.message().unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_error(name: &str) -> dbus::Error {
        dbus::Error::new_custom(name, "from test")
    }

    #[test]
    fn address_is_normalized() {
        assert_eq!(
            normalize_address("dc:2c:26:0f:44:a1").unwrap(),
            "DC:2C:26:0F:44:A1"
        );
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        for address in [
            "",
            "DC:2C:26:0F:44",
            "DC:2C:26:0F:44:A1:00",
            "DC-2C-26-0F-44-A1",
            "DC:2C:26:0F:44:G1",
            "DC:2C:26:0F:4:A1",
        ] {
            assert!(
                matches!(normalize_address(address), Err(AdapterFault::InvalidAddress(_))),
                "{:?} should be rejected",
                address
            );
        }
    }

    #[test]
    fn device_path_follows_bluez_layout() {
        assert_eq!(
            device_path("hci0", "00:1A:7D:DA:71:13"),
            "/org/bluez/hci0/dev_00_1A_7D_DA_71_13"
        );
    }

    #[test]
    fn pair_reply_classification() {
        assert!(classify_pair_reply(Ok(())).unwrap());
        assert!(!classify_pair_reply(Err(bus_error(ERROR_ALREADY_EXISTS))).unwrap());
        assert!(!classify_pair_reply(Err(bus_error(ERROR_IN_PROGRESS))).unwrap());
        assert!(classify_pair_reply(Err(bus_error(ERROR_NO_REPLY))).unwrap());
        assert!(classify_pair_reply(Err(dbus::Error::new_custom(
            "org.freedesktop.DBus.Error.Timeout",
            "Timeout waiting for reply"
        )))
        .unwrap());

        match classify_pair_reply(Err(bus_error("org.bluez.Error.AuthenticationRejected"))) {
            Err(AdapterFault::Bus { name, message }) => {
                assert_eq!(name, "org.bluez.Error.AuthenticationRejected");
                assert_eq!(message, "from test");
            }
            other => panic!("expected a bus fault, got {:?}", other),
        }
    }

    #[test]
    fn adapter_is_resolved_lazily() {
        let adapter = BluezAdapter::new(&BluetoothConfig::default());
        assert!(adapter.connection.get().is_none());
        assert_eq!(adapter.pair_timeout, Duration::from_millis(5000));
    }
}
