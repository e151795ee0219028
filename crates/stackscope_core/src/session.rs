//! Sessão de monitoramento: dono único do decoder e do estado.

use crate::decoder::{DecoderStats, FrameDecoder};
use crate::source::{ByteSource, TransportError};
use crate::state::{MemoryLayout, TelemetrySnapshot, TelemetryState};
use std::time::Instant;
use tracing::{info, trace};

/// Decoder + estado de uma conexão. Frames são aplicados na ordem em que
/// chegam; nenhum frame parcial chega ao estado.
#[derive(Debug)]
pub struct Session {
    decoder: FrameDecoder,
    state: TelemetryState,
}

impl Session {
    pub fn new(layout: MemoryLayout, now: Instant) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            state: TelemetryState::new(layout, now),
        }
    }

    /// Decodifica e aplica todos os frames completos já disponíveis.
    /// Retorna quantos frames foram aplicados.
    pub fn drain<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        now: Instant,
    ) -> Result<usize, TransportError> {
        let mut applied = 0;
        while let Some(frame) = self.decoder.try_decode(source)? {
            if self.state.packet_count() == 0 {
                let version = if frame.is_extended() { "v2" } else { "v1" };
                info!("Primeiro frame recebido ({version})");
            }
            trace!(
                stack = frame.stack_usage(),
                flags = frame.flags().bits(),
                "Aplicando frame"
            );
            self.state.apply(&frame, now);
            applied += 1;
        }
        if applied > 0 {
            trace!(applied, total = self.state.packet_count(), "Frames aplicados");
        }
        Ok(applied)
    }

    pub fn state(&self) -> &TelemetryState {
        &self.state
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.snapshot()
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}
