//! Definição dos frames de telemetria e constantes do protocolo serial.
//!
//! O firmware emite dois formatos que compartilham o mesmo header:
//!
//! ```text
//! Legacy (v1, 3 bytes):
//! ┌───────────┬──────────┬──────────┐
//! │ 0xFE      │ high (1) │ low (1)  │
//! └───────────┴──────────┴──────────┘
//!
//! Extended (v2, 10 bytes):
//! ┌───────────┬───────────┬───────────┬──────────┬──────────┬──────────┐
//! │ 0xFE      │ flags (1) │ stack (2) │ peak (2) │ heap (2) │ free (2) │
//! └───────────┴───────────┴───────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Não existe campo de tamanho nem checksum; todas as words são big-endian.

/// Byte que inicia todo frame.
pub const HEADER_BYTE: u8 = 0xFE;

/// Byte enviado pelo host para pedir que o dispositivo comece a transmitir.
pub const HANDSHAKE_BYTE: u8 = 0xA5;

/// SRAM total do ATmega328P (bytes).
pub const TOTAL_SRAM: u16 = 2048;

/// Tamanho do frame legacy, incluindo o header.
pub const LEGACY_FRAME_SIZE: usize = 3;

/// Tamanho do frame extended, incluindo o header.
pub const EXTENDED_FRAME_SIZE: usize = 10;

/// Flags válidos ficam abaixo deste valor; acima disso o byte é tratado
/// como high byte de um frame legacy.
pub const EXTENDED_FLAGS_LIMIT: u8 = 0x10;

/// Capacidade dos históricos de stack e heap.
pub const HISTORY_SIZE: usize = 60;

// ──────────────────────────────────────────────
// Flags
// ──────────────────────────────────────────────

/// Bitset de flags transmitido pelos frames extended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    /// Memória livre abaixo do threshold do firmware.
    pub const ALERT: Flags = Flags(0x01);
    /// Stack e heap se encontraram.
    pub const COLLISION: Flags = Flags(0x02);
    /// Novo pico de stack registrado neste ciclo.
    pub const PEAK_NEW: Flags = Flags(0x04);
    /// Heap em uso (`__brkval != 0`).
    pub const HEAP_ACTIVE: Flags = Flags(0x08);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

// ──────────────────────────────────────────────
// Frame
// ──────────────────────────────────────────────

/// Um frame completamente decodificado.
///
/// O decoder nunca expõe frames parciais: ou todos os campos foram lidos,
/// ou nenhum frame é emitido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryFrame {
    /// Frame v1: só o uso de stack é transmitido, o resto é derivado.
    Legacy { stack_usage: u16 },
    /// Frame v2: o dispositivo é a fonte de verdade de todos os campos.
    Extended {
        flags: Flags,
        stack_usage: u16,
        peak_usage: u16,
        heap_usage: u16,
        free_memory: u16,
    },
}

impl TelemetryFrame {
    pub fn stack_usage(&self) -> u16 {
        match *self {
            TelemetryFrame::Legacy { stack_usage } => stack_usage,
            TelemetryFrame::Extended { stack_usage, .. } => stack_usage,
        }
    }

    /// Flags do frame. Frames legacy não carregam flags.
    pub fn flags(&self) -> Flags {
        match *self {
            TelemetryFrame::Legacy { .. } => Flags::empty(),
            TelemetryFrame::Extended { flags, .. } => flags,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, TelemetryFrame::Extended { .. })
    }

    /// Tamanho do frame no fio, incluindo o header.
    pub fn wire_size(&self) -> usize {
        match self {
            TelemetryFrame::Legacy { .. } => LEGACY_FRAME_SIZE,
            TelemetryFrame::Extended { .. } => EXTENDED_FRAME_SIZE,
        }
    }

    /// Codifica o frame exatamente como o firmware o transmite.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_size());
        out.push(HEADER_BYTE);
        match *self {
            TelemetryFrame::Legacy { stack_usage } => {
                out.extend_from_slice(&stack_usage.to_be_bytes());
            }
            TelemetryFrame::Extended {
                flags,
                stack_usage,
                peak_usage,
                heap_usage,
                free_memory,
            } => {
                out.push(flags.bits());
                for word in [stack_usage, peak_usage, heap_usage, free_memory] {
                    out.extend_from_slice(&word.to_be_bytes());
                }
            }
        }
        out
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
