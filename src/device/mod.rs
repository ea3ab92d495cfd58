//! Device-side core: packet codec, threshold alerts, pump control and the
//! controller service that ties them to one remote device.

pub mod activity_log;
pub mod clock;
pub mod controller;
pub mod packet;
pub mod pump;
pub mod state;
pub mod thresholds;

pub use activity_log::{ActivityLog, LogEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{CommandOutcome, CommandPublisher, Controller, PumpRequestResult};
pub use packet::{ActuatorState, Reading};
pub use state::DeviceState;
pub use thresholds::{Range, ThresholdConfig};

#[cfg(test)]
pub(crate) mod test_support {
    use super::CommandPublisher;
    use crate::error::{BridgeError, Result};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory publisher that records every command payload.
    pub struct RecordingPublisher {
        connected: AtomicBool,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl Default for RecordingPublisher {
        fn default() -> Self {
            Self {
                connected: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl RecordingPublisher {
        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().clone()
        }
    }

    impl CommandPublisher for RecordingPublisher {
        fn publish_command(&self, payload: &[u8]) -> Result<()> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(BridgeError::MqttDisconnected);
            }
            self.sent.lock().push(payload.to_vec());
            Ok(())
        }
    }
}
