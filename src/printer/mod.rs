//! Receipt printer actuator
//!
//! [`ReceiptPrinter`] renders each command as a receipt with a header and a
//! QR code and writes it to a [`PrinterChannel`] in a single bounded write.
//! Printing is send-only: nothing is read back from the device.

use crate::config::{PrinterSection, QrErrorCorrection};
use crate::dispatch::ExtractedCommand;
use crate::error::ActuatorError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

pub mod commands;
pub mod serial;

pub use commands::{CommandBuffer, DEFAULT_QR_MODULE_SIZE, QR_MAX_DATA_BYTES};
pub use serial::SerialChannel;

/// Performs the physical output action for a decoded command
#[async_trait]
pub trait ActionHandler: Send {
    async fn perform(&mut self, command: ExtractedCommand) -> Result<(), ActuatorError>;
}

/// Raw byte sink in front of the printer
#[async_trait]
pub trait PrinterChannel: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ActuatorError>;
}

/// Receipt layout and timing
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLayout {
    pub header_lines: Vec<String>,
    pub feed_lines: u8,
    pub error_correction: QrErrorCorrection,
    pub module_size: u8,
    pub write_timeout: Duration,
    /// Pause after each job while the mechanism finishes
    pub settle: Duration,
}

impl From<&PrinterSection> for ReceiptLayout {
    fn from(section: &PrinterSection) -> Self {
        Self {
            header_lines: section.header_lines.clone(),
            feed_lines: section.feed_lines,
            error_correction: section.qr_error_correction,
            module_size: DEFAULT_QR_MODULE_SIZE,
            write_timeout: Duration::from_millis(section.write_timeout_ms),
            settle: Duration::from_millis(section.settle_ms),
        }
    }
}

/// Prints each command's target value as a QR code receipt
pub struct ReceiptPrinter<C: PrinterChannel> {
    channel: C,
    layout: ReceiptLayout,
}

impl<C: PrinterChannel> ReceiptPrinter<C> {
    pub fn new(channel: C, layout: ReceiptLayout) -> Self {
        Self { channel, layout }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Encode one receipt (pure function of layout and value)
    pub fn render(&self, target_value: &str) -> Result<CommandBuffer, ActuatorError> {
        let layout = &self.layout;
        let mut job = CommandBuffer::new();

        job.initialize().feed(layout.feed_lines).initialize();
        for line in &layout.header_lines {
            job.text_line(line);
        }
        job.feed(layout.feed_lines)
            .initialize()
            .qr_error_correction(layout.error_correction)
            .qr_code(target_value, layout.module_size)?
            .feed(layout.feed_lines);

        Ok(job)
    }
}

#[async_trait]
impl<C: PrinterChannel> ActionHandler for ReceiptPrinter<C> {
    async fn perform(&mut self, command: ExtractedCommand) -> Result<(), ActuatorError> {
        let job = self.render(&command.target_value)?;

        let write_timeout = self.layout.write_timeout;
        timeout(write_timeout, self.channel.send(job.as_bytes()))
            .await
            .map_err(|_| ActuatorError::Timeout {
                ms: write_timeout.as_millis() as u64,
            })??;

        debug!(bytes = job.len(), "Receipt sent");
        sleep(self.layout.settle).await;
        Ok(())
    }
}
