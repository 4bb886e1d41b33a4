/// Connection Management Module
///
/// This module owns the single driver connection of a handler instance and
/// the lifecycle around it: idempotent connect and disconnect, probe-style
/// health checks, and the borrow-only-what-you-need policy used by query
/// execution and introspection.

use crate::config::ConnectionParams;
use crate::core::db::driver::{Driver, DriverConnection};
use crate::core::{HandlerError, Result, StatusResponse};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Connection state of a handler.
///
/// The handle only exists while connected, so the two can never disagree.
#[derive(Debug)]
pub enum ConnectionState<C> {
    /// No live connection
    Disconnected,
    /// A live connection and the session id used in log events
    Connected { handle: C, session_id: Uuid },
}

impl<C> Default for ConnectionState<C> {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl<C> ConnectionState<C> {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// Connection manager for a single handler instance
pub struct ConnectionManager<D: Driver> {
    driver: D,
    params: ConnectionParams,
    state: ConnectionState<D::Connection>,
}

impl<D: Driver> ConnectionManager<D> {
    /// Creates a disconnected manager. Nothing is opened until first use.
    pub fn new(driver: D, params: ConnectionParams) -> Self {
        ConnectionManager {
            driver,
            params,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn state(&self) -> &ConnectionState<D::Connection> {
        &self.state
    }

    /// Checks if there's an active connection
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Returns the live connection, opening one first if needed.
    ///
    /// Calling this while connected returns the existing handle without
    /// touching the driver. A failed open leaves the manager disconnected.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::Connection` carrying the driver's message.
    pub fn connect(&mut self) -> Result<&mut D::Connection> {
        if !self.is_connected() {
            let handle = self.driver.open(&self.params).map_err(|e| match e {
                HandlerError::Connection(_) => e,
                other => HandlerError::Connection(other.message()),
            })?;
            let session_id = Uuid::new_v4();
            info!(%session_id, url = %self.params.url, "Connected to the Phoenix Query Server");
            self.state = ConnectionState::Connected { handle, session_id };
        }

        match &mut self.state {
            ConnectionState::Connected { handle, .. } => Ok(handle),
            ConnectionState::Disconnected => Err(HandlerError::Connection(
                "connection was not established".to_string(),
            )),
        }
    }

    /// Closes the current connection, if any.
    ///
    /// Returns the resulting connected flag, which is always `false`. When
    /// already disconnected the driver is not called.
    pub fn disconnect(&mut self) -> bool {
        if let ConnectionState::Connected { handle, session_id } =
            std::mem::take(&mut self.state)
        {
            match handle.close() {
                Ok(()) => info!(%session_id, "Disconnected from the Phoenix Query Server"),
                Err(e) => warn!(%session_id, "Error while closing connection: {}", e),
            }
        }
        self.is_connected()
    }

    /// Probes the server by connecting.
    ///
    /// A connection opened only for the probe is closed again; an existing
    /// one is left alone.
    pub fn check_connection(&mut self) -> StatusResponse {
        let need_to_close = !self.is_connected();

        match self.connect().map(|_| ()) {
            Ok(()) => {
                if need_to_close {
                    self.disconnect();
                }
                StatusResponse::ok()
            }
            Err(e) => {
                error!("Error connecting to the Phoenix Query Server, {}!", e);
                // connect() never stores a handle on failure; drop any stale one
                if self.is_connected() {
                    self.state = ConnectionState::Disconnected;
                }
                StatusResponse::failed(e.message())
            }
        }
    }

    /// Runs `f` against a live connection.
    ///
    /// If no connection existed before the call, one is opened for `f` and
    /// closed again afterwards, whatever `f` returned.
    pub fn with_connection<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut D::Connection) -> T,
    {
        let ephemeral = !self.is_connected();
        let connection = self.connect()?;
        let out = f(connection);
        if ephemeral {
            debug!("Closing ephemeral connection");
            self.disconnect();
        }
        Ok(out)
    }
}

impl<D: Driver> Drop for ConnectionManager<D> {
    fn drop(&mut self) {
        if let ConnectionState::Connected { handle, session_id } =
            std::mem::take(&mut self.state)
        {
            if let Err(e) = handle.close() {
                debug!(%session_id, "Ignoring error while closing connection on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DriverEvent, FakeDriver};

    fn manager(driver: &FakeDriver) -> ConnectionManager<FakeDriver> {
        ConnectionManager::new(driver.clone(), ConnectionParams::new("http://pqs:8765"))
    }

    #[test]
    fn test_connect_is_idempotent() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);
        assert!(!conn_mgr.is_connected());

        conn_mgr.connect().unwrap();
        conn_mgr.connect().unwrap();
        assert!(conn_mgr.is_connected());
        assert_eq!(driver.opens(), 1);
    }

    #[test]
    fn test_connect_passes_absent_parameters() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);
        conn_mgr.connect().unwrap();

        let args = match &driver.events()[0] {
            DriverEvent::Open(args) => args.clone(),
            other => panic!("Expected open event, got {:?}", other),
        };
        assert_eq!(args.len(), 9);
        assert_eq!(args[0], ("url", Some("http://pqs:8765".to_string())));
        assert!(args.contains(&("max_retries", None)));
        assert!(args.contains(&("password", None)));
    }

    #[test]
    fn test_connect_failure_leaves_disconnected() {
        let driver = FakeDriver::new();
        driver.fail_open("Connection refused");
        let mut conn_mgr = manager(&driver);

        match conn_mgr.connect() {
            Err(HandlerError::Connection(msg)) => assert_eq!(msg, "Connection refused"),
            Err(other) => panic!("Expected Connection error, got {:?}", other),
            Ok(_) => panic!("Expected connect to fail"),
        }
        assert!(!conn_mgr.is_connected());
    }

    #[test]
    fn test_disconnect_twice() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);
        conn_mgr.connect().unwrap();

        assert!(!conn_mgr.disconnect());
        let events_after_first = driver.events().len();
        assert!(!conn_mgr.disconnect());

        assert_eq!(driver.closes(), 1);
        assert_eq!(driver.events().len(), events_after_first);
    }

    #[test]
    fn test_disconnect_with_failing_close_still_disconnects() {
        let driver = FakeDriver::new();
        driver.fail_close("socket already closed");
        let mut conn_mgr = manager(&driver);
        conn_mgr.connect().unwrap();

        assert!(!conn_mgr.disconnect());
        assert!(!conn_mgr.is_connected());
    }

    #[test]
    fn test_check_connection_probe_from_disconnected() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);

        let status = conn_mgr.check_connection();
        assert!(status.success);
        assert!(status.error_message.is_none());
        assert!(!conn_mgr.is_connected());
        assert_eq!(driver.opens(), 1);
        assert_eq!(driver.closes(), 1);
    }

    #[test]
    fn test_check_connection_keeps_live_session() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);
        conn_mgr.connect().unwrap();

        assert!(conn_mgr.check_connection().success);
        assert!(conn_mgr.is_connected());
        assert_eq!(driver.opens(), 1);
        assert_eq!(driver.closes(), 0);
    }

    #[test]
    fn test_check_connection_failure() {
        let driver = FakeDriver::new();
        driver.fail_open("401 Unauthorized");
        let mut conn_mgr = manager(&driver);

        let status = conn_mgr.check_connection();
        assert!(!status.success);
        assert_eq!(status.error_message.as_deref(), Some("401 Unauthorized"));
        assert!(!conn_mgr.is_connected());
    }

    #[test]
    fn test_with_connection_ephemeral_and_reused() {
        let driver = FakeDriver::new();
        let mut conn_mgr = manager(&driver);

        conn_mgr.with_connection(|_| ()).unwrap();
        assert!(!conn_mgr.is_connected());
        assert_eq!(driver.closes(), 1);

        conn_mgr.connect().unwrap();
        conn_mgr.with_connection(|_| ()).unwrap();
        assert!(conn_mgr.is_connected());
        assert_eq!(driver.closes(), 1);
    }

    #[test]
    fn test_drop_closes_live_connection() {
        let driver = FakeDriver::new();
        {
            let mut conn_mgr = manager(&driver);
            conn_mgr.connect().unwrap();
        }
        assert_eq!(driver.closes(), 1);

        {
            let _conn_mgr = manager(&driver);
        }
        assert_eq!(driver.closes(), 1);
    }

    #[test]
    fn test_drop_swallows_close_errors() {
        let driver = FakeDriver::new();
        driver.fail_close("broken pipe");
        let mut conn_mgr = manager(&driver);
        conn_mgr.connect().unwrap();
        drop(conn_mgr);
        assert_eq!(driver.closes(), 1);
    }
}
