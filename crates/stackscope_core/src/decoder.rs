//! Máquina de estados de framing e ressincronização.
//!
//! O stream não tem tamanho nem checksum. O decoder procura o header byte a
//! byte, descartando qualquer outro valor, e decide entre legacy e extended
//! usando apenas o valor do segundo byte e quantos bytes já estão no buffer.
//!
//! Essa heurística é ambígua: um frame legacy com high byte `< 0x10` lido
//! enquanto 8 ou mais bytes já estão no buffer é interpretado como extended.
//! O comportamento é mantido assim para continuar compatível com o firmware.

use crate::frame::{
    EXTENDED_FLAGS_LIMIT, EXTENDED_FRAME_SIZE, Flags, HEADER_BYTE, LEGACY_FRAME_SIZE,
    TelemetryFrame,
};
use crate::source::{ByteSource, TransportError};
use tracing::{debug, trace};

/// Bytes que precisam estar no buffer, após header e flags, para que o
/// frame seja candidato a extended.
const EXTENDED_BODY_SIZE: usize = EXTENDED_FRAME_SIZE - 2;

/// Estado do decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Procurando o header (estado inicial e de ressincronização).
    #[default]
    SeekingHeader,
    /// Header encontrado, lendo o corpo. Só existe durante uma tentativa.
    ReadingBody,
}

/// Contadores de atividade do decoder. Nenhum deles representa erro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Bytes descartados procurando o header.
    pub discarded_bytes: u64,
    /// Tentativas abandonadas por falta de bytes após o header.
    pub abandoned_frames: u64,
    pub legacy_frames: u64,
    pub extended_frames: u64,
}

/// Decoder de frames sobre um [`ByteSource`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: DecoderState,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Tenta decodificar o próximo frame completo.
    ///
    /// Retorna `Ok(None)` quando os bytes atualmente no buffer não formam
    /// mais nenhum frame. Nunca espera por bytes novos além do timeout de
    /// leitura da própria fonte. Só erros de transporte viram `Err`.
    pub fn try_decode<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<TelemetryFrame>, TransportError> {
        self.state = DecoderState::SeekingHeader;

        while source.bytes_available()? >= LEGACY_FRAME_SIZE {
            let Some(byte) = source.read_byte()? else {
                // A fonte anunciou bytes mas não entregou nada
                break;
            };

            if byte != HEADER_BYTE {
                self.stats.discarded_bytes += 1;
                trace!("Descartando 0x{byte:02X} (ressincronizando)");
                continue;
            }

            self.state = DecoderState::ReadingBody;
            let frame = Self::read_body(source);
            self.state = DecoderState::SeekingHeader;

            match frame? {
                Some(frame) => {
                    if frame.is_extended() {
                        self.stats.extended_frames += 1;
                    } else {
                        self.stats.legacy_frames += 1;
                    }
                    trace!(?frame, "Frame decodificado");
                    return Ok(Some(frame));
                }
                None => {
                    self.stats.abandoned_frames += 1;
                    debug!("Frame incompleto após header, descartado");
                }
            }
        }

        Ok(None)
    }

    /// Lê o corpo de um frame cujo header já foi consumido.
    fn read_body<S: ByteSource + ?Sized>(
        source: &mut S,
    ) -> Result<Option<TelemetryFrame>, TransportError> {
        let Some(flags_or_high) = source.read_byte()? else {
            return Ok(None);
        };

        let extended = source.bytes_available()? >= EXTENDED_BODY_SIZE
            && flags_or_high < EXTENDED_FLAGS_LIMIT;

        if extended {
            let mut body = [0u8; EXTENDED_BODY_SIZE];
            if !source.read_full(&mut body)? {
                return Ok(None);
            }
            let word = |i: usize| u16::from_be_bytes([body[i], body[i + 1]]);
            return Ok(Some(TelemetryFrame::Extended {
                flags: Flags::from_bits(flags_or_high),
                stack_usage: word(0),
                peak_usage: word(2),
                heap_usage: word(4),
                free_memory: word(6),
            }));
        }

        let Some(low) = source.read_byte()? else {
            return Ok(None);
        };
        Ok(Some(TelemetryFrame::Legacy {
            stack_usage: u16::from_be_bytes([flags_or_high, low]),
        }))
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
