//! Sistema de alertas – níveis e status de memória.

use crate::config::AlertThresholds;
use crate::state::TelemetrySnapshot;

/// Nível de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Status geral de memória, derivado das flags do último frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    /// Stack e heap colidiram.
    Collision,
    /// Memória livre abaixo do threshold do firmware.
    LowMemory,
    /// Novo pico de stack registrado.
    NewPeak,
    Ok,
}

impl MemoryStatus {
    /// Colisão tem prioridade sobre alerta, que tem prioridade sobre pico.
    pub fn from_snapshot(snap: &TelemetrySnapshot) -> Self {
        if snap.collision_detected {
            MemoryStatus::Collision
        } else if snap.alert_active {
            MemoryStatus::LowMemory
        } else if snap.peak_flash {
            MemoryStatus::NewPeak
        } else {
            MemoryStatus::Ok
        }
    }

    pub fn level(self) -> AlertLevel {
        match self {
            MemoryStatus::Collision => AlertLevel::Critical,
            MemoryStatus::LowMemory => AlertLevel::Warning,
            MemoryStatus::NewPeak | MemoryStatus::Ok => AlertLevel::Normal,
        }
    }

    pub fn message(self, thresholds: &AlertThresholds) -> String {
        match self {
            MemoryStatus::Collision => "⚠ CRÍTICO: COLISÃO STACK/HEAP DETECTADA!".into(),
            MemoryStatus::LowMemory => format!(
                "⚠ ATENÇÃO: memória livre abaixo de {} bytes!",
                thresholds.low_free_memory_bytes
            ),
            MemoryStatus::NewPeak => "↑ Novo pico de stack registrado".into(),
            MemoryStatus::Ok => "✓ Memória OK".into(),
        }
    }
}

/// Retorna o [`AlertLevel`] da memória livre.
pub fn free_memory_level(free_memory: i32, thresholds: &AlertThresholds) -> AlertLevel {
    if free_memory < i32::from(thresholds.low_free_memory_bytes) {
        AlertLevel::Critical
    } else {
        AlertLevel::Normal
    }
}
