//! Conexão serial com a placa e auto-detecção de porta.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use stackscope_core::config::SerialConfig;
use stackscope_core::source::{ByteSource, TransportError};
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, info};

/// Trechos de descrição que identificam placas Arduino e clones.
const BOARD_HINTS: [&str; 3] = ["Arduino", "CH340", "USB"];

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Nenhuma porta serial encontrada")]
    NoPorts,

    #[error("Várias portas encontradas, use --port para escolher:\n{0}")]
    Ambiguous(String),

    #[error("Erro na porta serial: {0}")]
    Serial(#[from] serialport::Error),
}

/// Porta candidata: nome do device e descrição legível.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    pub description: String,
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut parts = vec!["USB".to_string()];
            parts.extend(info.manufacturer.clone());
            parts.extend(info.product.clone());
            parts.join(" ")
        }
        SerialPortType::PciPort => "PCI".into(),
        SerialPortType::BluetoothPort => "Bluetooth".into(),
        SerialPortType::Unknown => "Desconhecida".into(),
    }
}

fn looks_like_board(description: &str) -> bool {
    BOARD_HINTS.iter().any(|hint| description.contains(hint))
}

/// Escolhe a porta: uma única placa reconhecida, ou a única porta existente.
pub fn select_port(candidates: &[PortCandidate]) -> Result<String, LinkError> {
    if candidates.is_empty() {
        return Err(LinkError::NoPorts);
    }

    let boards: Vec<&PortCandidate> = candidates
        .iter()
        .filter(|c| looks_like_board(&c.description))
        .collect();
    if let [board] = boards.as_slice() {
        return Ok(board.name.clone());
    }
    if let [only] = candidates {
        return Ok(only.name.clone());
    }

    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("  {}. {} - {}", i + 1, c.name, c.description))
        .collect::<Vec<_>>()
        .join("\n");
    Err(LinkError::Ambiguous(list))
}

/// Lista as portas do sistema e escolhe uma.
pub fn find_port() -> Result<String, LinkError> {
    let candidates: Vec<PortCandidate> = serialport::available_ports()?
        .into_iter()
        .map(|p| PortCandidate {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect();
    debug!(?candidates, "Portas disponíveis");
    select_port(&candidates)
}

// ──────────────────────────────────────────────
// Link
// ──────────────────────────────────────────────

/// Porta serial aberta em 8N1, pronta para o handshake.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialLink {
    /// Abre a porta configurada (ou detectada), espera o reset da placa e
    /// limpa o buffer de entrada.
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        let name = if config.port.is_empty() {
            find_port()?
        } else {
            config.port.clone()
        };

        let port = serialport::new(&name, config.baud)
            .timeout(config.timeout())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()?;
        info!("Porta {name} aberta a {} baud", config.baud);

        // Abrir a porta reinicia o Arduino
        std::thread::sleep(config.reset_delay());
        port.clear(ClearBuffer::Input)?;

        Ok(Self { port, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn transport_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::Disconnected,
        _ => TransportError::Io(e.into()),
    }
}

impl ByteSource for SerialLink {
    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let n = self.port.bytes_to_read().map_err(transport_error)?;
        Ok(n as usize)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}
