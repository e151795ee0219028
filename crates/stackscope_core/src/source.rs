//! Fonte de bytes consumida pelo decoder.
//!
//! O transporte real (porta serial) vive no binário; aqui fica só a
//! interface mínima e uma implementação em memória.

use std::collections::VecDeque;

/// Erros de transporte. Sempre fatais para a sessão.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Erro de I/O no transporte: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dispositivo desconectado")]
    Disconnected,
}

/// Fonte de bytes com leitura de timeout limitado.
pub trait ByteSource {
    /// Quantidade de bytes já disponíveis para leitura imediata.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Lê até `buf.len()` bytes, bloqueando no máximo pelo timeout do
    /// transporte. Retorna menos bytes (inclusive zero) em caso de timeout.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Lê um único byte; `None` em timeout.
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut byte = [0u8; 1];
        match self.read_into(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Lê exatamente `buf.len()` bytes ou retorna `false` se o timeout
    /// deixou a leitura incompleta. Bytes já lidos não são devolvidos.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<bool, TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_into(&mut buf[filled..])?;
            if n == 0 {
                return Ok(false);
            }
            filled += n;
        }
        Ok(true)
    }
}

// ──────────────────────────────────────────────
// Fonte em memória
// ──────────────────────────────────────────────

/// FIFO de bytes em memória. Usada nos testes e no modo replay.
///
/// Leituras sem bytes disponíveis retornam zero imediatamente, como um
/// timeout instantâneo.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    buf: VecDeque<u8>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buf: bytes.iter().copied().collect(),
        }
    }

    /// Simula a chegada de mais bytes do dispositivo.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

impl ByteSource for MemorySource {
    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        Ok(self.buf.len())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.buf.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
