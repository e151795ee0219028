//! Estado derivado de memória, alimentado exclusivamente pelos frames.
//!
//! As duas versões de frame seguem regras diferentes:
//! - **Legacy**: pico é mantido localmente, memória livre é calculada a
//!   partir do layout configurado, heap e flags são zerados.
//! - **Extended**: todos os campos vêm do dispositivo, sem derivação local.

use crate::frame::{Flags, TOTAL_SRAM, TelemetryFrame};
use crate::history::MetricHistory;
use std::time::{Duration, Instant};

/// Sem frames por este tempo, o link é considerado parado.
pub const STALE_AFTER: Duration = Duration::from_secs(2);

/// Layout de memória do dispositivo. `static_data` vem da saída do
/// compilador e não pode ser medido a partir do stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub total_sram: u16,
    pub static_data: u16,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            total_sram: TOTAL_SRAM,
            static_data: 0,
        }
    }
}

/// Estado do link visto pelo dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Nenhum frame recebido ainda.
    Waiting,
    Live,
    Stale,
}

// ──────────────────────────────────────────────
// Estado
// ──────────────────────────────────────────────

/// Métricas correntes da sessão. Um único escritor ([`TelemetryState::apply`]).
#[derive(Debug, Clone)]
pub struct TelemetryState {
    layout: MemoryLayout,

    stack_usage: u16,
    peak_usage: u16,
    heap_usage: u16,
    /// Com sinal: um `static_data` mal configurado pode deixar o cálculo
    /// legacy negativo.
    free_memory: i32,
    flags: Flags,

    alert_active: bool,
    collision_detected: bool,
    peak_flash: bool,

    stack_history: MetricHistory,
    heap_history: MetricHistory,

    packet_count: u64,
    last_update: Option<Instant>,
    start_time: Instant,
}

impl TelemetryState {
    pub fn new(layout: MemoryLayout, now: Instant) -> Self {
        Self {
            layout,
            stack_usage: 0,
            peak_usage: 0,
            heap_usage: 0,
            free_memory: i32::from(layout.total_sram),
            flags: Flags::empty(),
            alert_active: false,
            collision_detected: false,
            peak_flash: false,
            stack_history: MetricHistory::new(),
            heap_history: MetricHistory::new(),
            packet_count: 0,
            last_update: None,
            start_time: now,
        }
    }

    /// Aplica um frame decodificado.
    pub fn apply(&mut self, frame: &TelemetryFrame, now: Instant) {
        match *frame {
            TelemetryFrame::Legacy { stack_usage } => {
                self.stack_usage = stack_usage;
                self.peak_usage = self.peak_usage.max(stack_usage);
                self.free_memory = i32::from(self.layout.total_sram)
                    - i32::from(self.layout.static_data)
                    - i32::from(stack_usage);
                self.flags = Flags::empty();
                self.heap_usage = 0;
            }
            TelemetryFrame::Extended {
                flags,
                stack_usage,
                peak_usage,
                heap_usage,
                free_memory,
            } => {
                self.flags = flags;
                self.stack_usage = stack_usage;
                self.peak_usage = peak_usage;
                self.heap_usage = heap_usage;
                self.free_memory = i32::from(free_memory);
            }
        }

        self.alert_active = self.flags.contains(Flags::ALERT);
        self.collision_detected = self.flags.contains(Flags::COLLISION);
        self.peak_flash = self.flags.contains(Flags::PEAK_NEW);

        self.stack_history.push(self.stack_usage);
        self.heap_history.push(self.heap_usage);

        self.packet_count += 1;
        self.last_update = Some(now);
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn peak_usage(&self) -> u16 {
        self.peak_usage
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Cópia imutável do estado para consumidores.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            layout: self.layout,
            stack_usage: self.stack_usage,
            peak_usage: self.peak_usage,
            heap_usage: self.heap_usage,
            free_memory: self.free_memory,
            flags: self.flags,
            alert_active: self.alert_active,
            collision_detected: self.collision_detected,
            peak_flash: self.peak_flash,
            stack_history: self.stack_history.clone(),
            heap_history: self.heap_history.clone(),
            packet_count: self.packet_count,
            last_update: self.last_update,
            start_time: self.start_time,
        }
    }
}

// ──────────────────────────────────────────────
// Snapshot
// ──────────────────────────────────────────────

/// Visão somente-leitura do [`TelemetryState`] num instante.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub layout: MemoryLayout,
    pub stack_usage: u16,
    pub peak_usage: u16,
    pub heap_usage: u16,
    pub free_memory: i32,
    pub flags: Flags,
    pub alert_active: bool,
    pub collision_detected: bool,
    pub peak_flash: bool,
    pub stack_history: MetricHistory,
    pub heap_history: MetricHistory,
    pub packet_count: u64,
    pub last_update: Option<Instant>,
    pub start_time: Instant,
}

impl TelemetrySnapshot {
    /// Live/stale é recalculado a cada leitura, nunca armazenado.
    pub fn link_status(&self, now: Instant, stale_after: Duration) -> LinkStatus {
        match self.last_update {
            _ if self.packet_count == 0 => LinkStatus::Waiting,
            Some(t) if now.saturating_duration_since(t) < stale_after => LinkStatus::Live,
            _ => LinkStatus::Stale,
        }
    }

    /// Static + stack + heap.
    pub fn used_memory(&self) -> u32 {
        u32::from(self.layout.static_data)
            + u32::from(self.stack_usage)
            + u32::from(self.heap_usage)
    }

    pub fn runtime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// Taxa aproximada de atualização, pelo tempo desde o último frame.
    pub fn update_rate_hz(&self, now: Instant) -> f64 {
        let since = self.last_update.unwrap_or(self.start_time);
        1.0 / now.saturating_duration_since(since).as_secs_f64().max(0.1)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
