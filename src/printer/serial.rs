//! Serial output channel for the receipt printer

use super::PrinterChannel;
use crate::error::ActuatorError;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

/// Send-only serial port, 8N1 without flow control
pub struct SerialChannel {
    device: String,
    port: SerialStream,
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("device", &self.device)
            .finish()
    }
}

impl SerialChannel {
    /// Open the serial device. Called once during setup.
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, ActuatorError> {
        let port = tokio_serial::new(device, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;

        info!(device = %device, baud_rate, "Printer serial port opened");
        Ok(Self {
            device: device.to_string(),
            port,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

#[async_trait]
impl PrinterChannel for SerialChannel {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ActuatorError> {
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        debug!(device = %self.device, bytes = bytes.len(), "Serial TX");
        Ok(())
    }
}
