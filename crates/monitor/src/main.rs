//! # StackScope
//!
//! Visualizador de memória em tempo real para ATmega328P.
//!
//! Lê o stream de telemetria da placa pela serial e mostra stack, heap,
//! pico e memória livre num dashboard de terminal.
//!
//! ## Uso
//! ```bash
//! stackscope                         # Auto-detecta a porta
//! stackscope -p /dev/ttyUSB0 -s 312  # Porta e static data explícitos
//! stackscope --replay captura.bin    # Reproduz uma captura gravada
//! ```

mod app;
mod dashboard;
mod serial_link;

use anyhow::Context;
use app::{Link, Monitor, ReplayLink};
use clap::Parser;
use dashboard::DashboardView;
use serial_link::SerialLink;
use stackscope_core::clock::{Clock, SystemClock};
use stackscope_core::config::AppConfig;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// StackScope - monitor de memória para ATmega328P
#[derive(Parser, Debug)]
#[command(name = "stackscope")]
#[command(version)]
#[command(about = "StackScope - monitor de memória para ATmega328P")]
struct Args {
    /// Porta serial (auto-detecta se omitida)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Static data em bytes (.data + .bss, da saída do compilador)
    #[arg(short, long)]
    static_data: Option<u16>,

    /// Arquivo de configuração (padrão: stackscope.toml ao lado do executável)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reproduz bytes gravados de um arquivo em vez de abrir a serial
    #[arg(long)]
    replay: Option<PathBuf>,
}

impl Args {
    /// Valores da linha de comando têm prioridade sobre o arquivo.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(static_data) = self.static_data {
            config.device.static_data = static_data;
        }
    }
}

fn main() -> anyhow::Result<()> {
    // ── Logging ── (stderr: stdout é do dashboard)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ── Config ──
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    args.apply_overrides(&mut config);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida: {e}");
        }
        anyhow::bail!("{} erro(s) de configuração", errors.len());
    }

    // ── Ctrl+C ──
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Falha ao instalar handler de Ctrl+C")?;

    // ── Link ──
    match &args.replay {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Falha ao ler captura {}", path.display()))?;
            info!("Replay de {} ({} bytes)", path.display(), bytes.len());
            let label = path.display().to_string();
            run_session(ReplayLink::new(&bytes), &label, &config, &shutdown_rx)
        }
        None => {
            let link = SerialLink::open(&config.serial).context("Falha ao conectar")?;
            let label = link.name().to_string();
            info!("Conectado a {label}");
            run_session(link, &label, &config, &shutdown_rx)
        }
    }
}

/// Limpa a tela e escreve um quadro inteiro.
fn draw<W: Write>(out: &mut W, frame: &str) -> std::io::Result<()> {
    write!(out, "{}{frame}", dashboard::CLEAR_SCREEN)?;
    out.flush()
}

fn run_session<L: Link>(
    link: L,
    port_label: &str,
    config: &AppConfig,
    shutdown: &crossbeam_channel::Receiver<()>,
) -> anyhow::Result<()> {
    let mut monitor = Monitor::new(link, SystemClock, config);
    let view = DashboardView {
        port: port_label,
        config: &config.dashboard,
        thresholds: &config.alerts,
    };

    let result = monitor.connect().and_then(|()| {
        let mut stdout = std::io::stdout();
        monitor.run(shutdown, |snap, stats, clock| {
            let frame = dashboard::render(snap, stats, &view, clock.now());
            if let Err(e) = draw(&mut stdout, &frame) {
                debug!("Falha ao desenhar o dashboard: {e}");
            }
        })
    });

    // ── Resumo ──
    let snap = monitor.snapshot();
    let stats = monitor.decoder_stats();
    println!();
    println!(
        "Total de pacotes recebidos: {} (v1: {}, v2: {})",
        snap.packet_count, stats.legacy_frames, stats.extended_frames
    );
    println!("Pico de stack: {} bytes", snap.peak_usage);
    if monitor.handshake_resends() > 0 {
        println!("Handshakes reenviados: {}", monitor.handshake_resends());
    }
    if stats.discarded_bytes > 0 || stats.abandoned_frames > 0 {
        println!(
            "Ressincronização: {} bytes descartados, {} frames abandonados",
            stats.discarded_bytes, stats.abandoned_frames
        );
    }

    if let Err(e) = &result {
        error!("Sessão encerrada: {e}");
    }
    result.context("Erro de transporte")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config_file() {
        let args = Args::parse_from([
            "stackscope", "-p", "/dev/ttyACM0", "-s", "312", "-b", "115200",
        ]);
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud, 115_200);
        assert_eq!(config.device.static_data, 312);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn draw_clears_then_writes_frame() {
        let mut out = Vec::new();
        draw(&mut out, "quadro").unwrap();
        assert_eq!(out, format!("{}quadro", dashboard::CLEAR_SCREEN).into_bytes());
    }

    #[test]
    fn draw_reports_closed_output() {
        let err = draw(&mut ClosedPipe, "quadro").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn missing_flags_keep_file_values() {
        let args = Args::parse_from(["stackscope"]);
        let mut config = AppConfig::default();
        config.device.static_data = 99;
        args.apply_overrides(&mut config);
        assert_eq!(config.device.static_data, 99);
        assert!(config.serial.port.is_empty());
    }
}
