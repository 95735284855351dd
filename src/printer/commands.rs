//! ESC/POS command encoding
//!
//! Only the handful of commands a receipt needs: initialize, text lines,
//! blank-line feeds and a QR code (`GS ( k`, function 165 family).

use crate::config::QrErrorCorrection;
use crate::error::ActuatorError;

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const LF: u8 = b'\n';

/// Largest payload a QR symbol can store (byte mode, version 40, level L)
pub const QR_MAX_DATA_BYTES: usize = 7089;

/// Module size in dots, 1..=16
pub const DEFAULT_QR_MODULE_SIZE: u8 = 6;

/// Incrementally built print job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ESC @`: reset the printer to power-on defaults
    pub fn initialize(&mut self) -> &mut Self {
        self.bytes.extend_from_slice(&[ESC, b'@']);
        self
    }

    /// Emit one line of text; non-ASCII characters become '?'
    pub fn text_line(&mut self, line: &str) -> &mut Self {
        self.bytes.extend(line.chars().map(|c| {
            if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            }
        }));
        self.bytes.push(LF);
        self
    }

    /// Emit `lines` blank lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.bytes
            .extend(std::iter::repeat(LF).take(usize::from(lines)));
        self
    }

    /// Select the QR error correction level for following codes
    pub fn qr_error_correction(&mut self, level: QrErrorCorrection) -> &mut Self {
        let n = match level {
            QrErrorCorrection::L => 48,
            QrErrorCorrection::M => 49,
            QrErrorCorrection::Q => 50,
            QrErrorCorrection::H => 51,
        };
        self.bytes
            .extend_from_slice(&[GS, b'(', b'k', 0x03, 0x00, 0x31, 0x45, n]);
        self
    }

    /// Select model 2, set module size, store `data` and print the symbol
    pub fn qr_code(&mut self, data: &str, module_size: u8) -> Result<&mut Self, ActuatorError> {
        let data = data.as_bytes();
        if data.len() > QR_MAX_DATA_BYTES {
            return Err(ActuatorError::ContentTooLong {
                len: data.len(),
                max: QR_MAX_DATA_BYTES,
            });
        }

        // Model 2
        self.bytes
            .extend_from_slice(&[GS, b'(', b'k', 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
        // Module size
        self.bytes.extend_from_slice(&[
            GS,
            b'(',
            b'k',
            0x03,
            0x00,
            0x31,
            0x43,
            module_size.clamp(1, 16),
        ]);

        // Store: parameter length counts the three function bytes
        let stored = data.len() + 3;
        let [p_l, p_h] = (stored as u16).to_le_bytes();
        self.bytes
            .extend_from_slice(&[GS, b'(', b'k', p_l, p_h, 0x31, 0x50, 0x30]);
        self.bytes.extend_from_slice(data);

        // Print
        self.bytes
            .extend_from_slice(&[GS, b'(', b'k', 0x03, 0x00, 0x31, 0x51, 0x30]);
        Ok(self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
