//! # StackScope Core
//!
//! Protocolo serial, decoder de frames e estado de memória do StackScope,
//! o visualizador de stack/heap para ATmega328P.
//!
//! ## Módulos
//! - [`frame`] – Frames legacy/extended e constantes do protocolo
//! - [`source`] – Interface de fonte de bytes e fonte em memória
//! - [`decoder`] – Máquina de estados de framing e ressincronização
//! - [`history`] – Ring buffer de capacidade fixa
//! - [`state`] – Métricas derivadas e snapshots
//! - [`alerts`] – Níveis de alerta e status de memória
//! - [`handshake`] – Handshake inicial e keepalive por ociosidade
//! - [`session`] – Decoder + estado de uma conexão
//! - [`config`] – Configuração unificada via TOML
//! - [`clock`] – Fonte de tempo injetável

pub mod alerts;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod history;
pub mod session;
pub mod source;
pub mod state;

// Re-exports convenientes
pub use config::AppConfig;
pub use decoder::FrameDecoder;
pub use frame::{Flags, TelemetryFrame};
pub use session::Session;
pub use source::{ByteSource, TransportError};
pub use state::{TelemetrySnapshot, TelemetryState};
