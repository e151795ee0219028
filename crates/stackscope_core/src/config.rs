//! Configuração unificada via TOML.
//!
//! Valores de linha de comando (porta, baud, static data) sobrescrevem o
//! arquivo; o que não vier de nenhum dos dois usa o padrão.

use crate::frame::TOTAL_SRAM;
use crate::state::MemoryLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Maior duração aceita em qualquer campo `*_secs`.
pub const MAX_DURATION_SECS: f64 = 3600.0;

/// Finito e dentro de `(0, MAX_DURATION_SECS]` (ou `[0, ...]` com `allow_zero`).
fn valid_secs(value: f64, allow_zero: bool) -> bool {
    let above_min = if allow_zero { value >= 0.0 } else { value > 0.0 };
    value.is_finite() && above_min && value <= MAX_DURATION_SECS
}

/// Erros ao persistir configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de serialização TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar arquivo: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuração da porta serial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Porta serial (vazio = auto-detectar)
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Timeout de cada leitura (segundos)
    pub timeout_secs: f64,
    /// Espera após abrir a porta, enquanto a placa reinicia (segundos)
    pub reset_delay_secs: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: 9600,
            timeout_secs: 0.5,
            reset_delay_secs: 2.0,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_secs_f64(self.reset_delay_secs)
    }
}

/// Layout de memória do dispositivo alvo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Tamanho de .data + .bss (bytes), da saída do compilador
    pub static_data: u16,
    /// SRAM total (bytes)
    pub total_sram: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            static_data: 0,
            total_sram: TOTAL_SRAM,
        }
    }
}

impl DeviceConfig {
    pub fn layout(&self) -> MemoryLayout {
        MemoryLayout {
            total_sram: self.total_sram,
            static_data: self.static_data,
        }
    }
}

/// Handshake e keepalive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Quantos bytes de handshake na conexão
    pub burst_count: u32,
    /// Intervalo entre bytes da rajada (ms)
    pub burst_delay_ms: u64,
    /// Reenvia o handshake após este tempo sem atividade (segundos)
    pub idle_resend_secs: f64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            burst_count: 3,
            burst_delay_ms: 100,
            idle_resend_secs: 2.0,
        }
    }
}

/// Aparência e cadência do dashboard de terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Intervalo do loop principal (ms)
    pub refresh_ms: u64,
    /// Sem frames por este tempo, o link aparece como STALE (segundos)
    pub stale_after_secs: f64,
    /// Largura das barras (caracteres)
    pub bar_width: usize,
    /// Quantas amostras por sparkline
    pub sparkline_width: usize,
    /// Valor que corresponde ao bloco cheio da sparkline (bytes)
    pub sparkline_scale: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 50,
            stale_after_secs: 2.0,
            bar_width: 20,
            sparkline_width: 20,
            sparkline_scale: 500,
        }
    }
}

impl DashboardConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs_f64(self.stale_after_secs)
    }
}

/// Thresholds de alerta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Abaixo disso a memória livre é crítica (mesmo valor do firmware)
    pub low_free_memory_bytes: u16,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            low_free_memory_bytes: 50,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub device: DeviceConfig,
    pub handshake: HandshakeConfig,
    pub dashboard: DashboardConfig,
    pub alerts: AlertThresholds,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("stackscope.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.serial.baud == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if !valid_secs(self.serial.timeout_secs, false) || self.serial.timeout_secs > 10.0 {
            errors.push(format!(
                "Timeout de leitura inválido: {} (0–10.0]",
                self.serial.timeout_secs
            ));
        }
        if !valid_secs(self.serial.reset_delay_secs, true) {
            errors.push(format!(
                "Espera de reset inválida: {} [0–{MAX_DURATION_SECS}]",
                self.serial.reset_delay_secs
            ));
        }
        if self.device.total_sram == 0 {
            errors.push("SRAM total não pode ser 0".into());
        }
        if self.device.static_data > self.device.total_sram {
            errors.push(format!(
                "Static data ({}) maior que a SRAM total ({})",
                self.device.static_data, self.device.total_sram
            ));
        }
        if !valid_secs(self.handshake.idle_resend_secs, false) {
            errors.push(format!(
                "Intervalo de reenvio do handshake inválido: {} (0–{MAX_DURATION_SECS}]",
                self.handshake.idle_resend_secs
            ));
        }
        if self.dashboard.refresh_ms == 0 {
            errors.push("Intervalo de refresh não pode ser 0".into());
        }
        if !valid_secs(self.dashboard.stale_after_secs, false) {
            errors.push(format!(
                "Tempo para STALE inválido: {} (0–{MAX_DURATION_SECS}]",
                self.dashboard.stale_after_secs
            ));
        }
        if self.dashboard.sparkline_scale == 0 {
            errors.push("Escala da sparkline não pode ser 0".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn defaults_match_device_protocol() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.serial.timeout(), Duration::from_millis(500));
        assert_eq!(config.device.layout(), MemoryLayout::default());
        assert_eq!(config.handshake.burst_count, 3);
        assert_eq!(config.dashboard.stale_after(), Duration::from_secs(2));
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.serial.baud, parsed.serial.baud);
        assert_eq!(config.device.total_sram, parsed.device.total_sram);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[device]
static_data = 312
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.device.static_data, 312);
        // Outros campos devem ter valor padrão
        assert_eq!(config.device.total_sram, 2048);
        assert_eq!(config.serial.baud, 9600);
    }

    #[test]
    fn rejects_static_larger_than_sram() {
        let mut config = AppConfig::default();
        config.device.static_data = 4096;
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("4096"));
    }

    #[test]
    fn rejects_nan_durations() {
        let content = "[handshake]\nidle_resend_secs = nan\n[serial]\ntimeout_secs = nan\n";
        let config: AppConfig = toml::from_str(content).unwrap();
        assert!(config.handshake.idle_resend_secs.is_nan());

        let errors = config.validate();
        assert_eq!(errors.len(), 2, "Erros: {:?}", errors);
        assert!(errors.iter().any(|e| e.contains("handshake")));
        assert!(errors.iter().any(|e| e.contains("Timeout")));
    }

    #[test]
    fn rejects_infinite_and_huge_durations() {
        let mut config = AppConfig::default();
        config.dashboard.stale_after_secs = f64::INFINITY;
        config.serial.reset_delay_secs = 1e30;
        config.handshake.idle_resend_secs = -1.0;
        assert_eq!(config.validate().len(), 3);

        config.serial.reset_delay_secs = 0.0;
        config.dashboard.stale_after_secs = MAX_DURATION_SECS;
        config.handshake.idle_resend_secs = 0.5;
        assert!(config.validate().is_empty());
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/stackscope.toml"));
        assert_eq!(config.serial.baud, 9600);
    }
}
