//! Single-pixel status signal
//!
//! The indicator is best effort: implementations must never fail or block.

use tracing::debug;

/// Enumerated status shown on the device's status pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSignal {
    /// Setup done, nothing attempted yet (blue)
    Idle,
    /// Bringing up the link or the broker session (cyan)
    Connecting,
    /// Link or session up, or a message printed (green)
    Connected,
    /// Connection attempt or actuator failed (red)
    Error,
    /// Inbound payload could not be decoded (yellow)
    DecodeFailure,
}

impl StatusSignal {
    /// 0xRRGGBB color for the status pixel
    pub fn rgb(self) -> u32 {
        match self {
            StatusSignal::Idle => 0x0000ff,
            StatusSignal::Connecting => 0x00ffff,
            StatusSignal::Connected => 0x00ff00,
            StatusSignal::Error => 0xff0000,
            StatusSignal::DecodeFailure => 0xffff00,
        }
    }
}

/// Sink for status signals
pub trait StatusIndicator: Send {
    fn show(&mut self, signal: StatusSignal);
}

/// Indicator for hosts without a status LED: records the last signal and logs changes
#[derive(Debug, Default)]
pub struct LogIndicator {
    current: Option<StatusSignal>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<StatusSignal> {
        self.current
    }
}

impl StatusIndicator for LogIndicator {
    fn show(&mut self, signal: StatusSignal) {
        if self.current != Some(signal) {
            debug!(signal = ?signal, rgb = format!("#{:06x}", signal.rgb()), "Status signal");
            self.current = Some(signal);
        }
    }
}
