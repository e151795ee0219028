//! Loop principal cooperativo: drena frames, renderiza, espera, keepalive.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use stackscope_core::clock::Clock;
use stackscope_core::config::AppConfig;
use stackscope_core::decoder::DecoderStats;
use stackscope_core::handshake::{ByteSink, Keepalive};
use stackscope_core::session::Session;
use stackscope_core::source::{ByteSource, MemorySource, TransportError};
use stackscope_core::state::TelemetrySnapshot;
use std::io::Write;
use std::time::Duration;
use tracing::{info, trace};

/// Link bidirecional com o dispositivo.
pub trait Link: ByteSource + ByteSink {}

impl<T: ByteSource + ByteSink> Link for T {}

/// Replay de uma captura: lê bytes gravados e ignora o que seria enviado.
pub struct ReplayLink {
    source: MemorySource,
}

impl ReplayLink {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            source: MemorySource::from_bytes(bytes),
        }
    }
}

impl ByteSource for ReplayLink {
    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        self.source.bytes_available()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.source.read_into(buf)
    }
}

impl Write for ReplayLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        trace!("Replay: ignorando envio de {} byte(s)", buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Monitor
// ──────────────────────────────────────────────

/// Sessão + link + keepalive, dirigidos por um único loop.
pub struct Monitor<L: Link, C: Clock> {
    link: L,
    clock: C,
    session: Session,
    keepalive: Keepalive,
    refresh: Duration,
}

impl<L: Link, C: Clock> Monitor<L, C> {
    pub fn new(link: L, clock: C, config: &AppConfig) -> Self {
        let session = Session::new(config.device.layout(), clock.now());
        Self {
            link,
            clock,
            session,
            keepalive: Keepalive::new(&config.handshake),
            refresh: config.dashboard.refresh(),
        }
    }

    /// Rajada de handshake para o dispositivo começar a transmitir.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.keepalive.connect_burst(&mut self.link, &self.clock)?;
        info!("Handshake enviado, aguardando dados...");
        Ok(())
    }

    /// Aplica todos os frames completos disponíveis agora.
    pub fn poll_frames(&mut self) -> Result<usize, TransportError> {
        let now = self.clock.now();
        self.session.drain(&mut self.link, now)
    }

    /// Reenvia o handshake se ainda não houve resposta a ele.
    pub fn keepalive_tick(&mut self) -> Result<bool, TransportError> {
        let last_frame = self.session.state().last_update();
        self.keepalive.poll(&mut self.link, last_frame, self.clock.now())
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.session.snapshot()
    }

    pub fn decoder_stats(&self) -> DecoderStats {
        self.session.decoder_stats()
    }

    /// Handshakes reenviados por falta de resposta.
    pub fn handshake_resends(&self) -> u64 {
        self.keepalive.resends()
    }

    #[cfg(test)]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Roda até chegar um sinal em `shutdown` (ou o sender ser descartado).
    ///
    /// A espera entre iterações é feita no próprio channel, então Ctrl+C
    /// interrompe sem esperar o fim do intervalo.
    pub fn run<F>(&mut self, shutdown: &Receiver<()>, mut render: F) -> Result<(), TransportError>
    where
        F: FnMut(&TelemetrySnapshot, &DecoderStats, &C),
    {
        loop {
            self.poll_frames()?;
            render(&self.session.snapshot(), &self.session.decoder_stats(), &self.clock);

            match shutdown.recv_timeout(self.refresh) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Encerrando loop de monitoramento");
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.keepalive_tick()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackscope_core::clock::ManualClock;
    use stackscope_core::frame::{Flags, HANDSHAKE_BYTE, TelemetryFrame};
    use std::time::Instant;

    /// Link de teste: fonte em memória + bytes enviados gravados.
    #[derive(Default)]
    struct LoopbackLink {
        incoming: MemorySource,
        sent: Vec<u8>,
    }

    impl ByteSource for LoopbackLink {
        fn bytes_available(&mut self) -> Result<usize, TransportError> {
            self.incoming.bytes_available()
        }

        fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            self.incoming.read_into(buf)
        }
    }

    impl Write for LoopbackLink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn monitor() -> Monitor<LoopbackLink, ManualClock> {
        Monitor::new(
            LoopbackLink::default(),
            ManualClock::new(Instant::now()),
            &AppConfig::default(),
        )
    }

    #[test]
    fn handshake_then_idle_resend() {
        let mut m = monitor();
        m.connect().unwrap();
        assert_eq!(m.link.sent, vec![HANDSHAKE_BYTE; 3]);

        m.clock().advance(Duration::from_millis(2100));
        assert_eq!(m.poll_frames().unwrap(), 0);
        assert!(m.keepalive_tick().unwrap());
        assert!(!m.keepalive_tick().unwrap());
        assert_eq!(m.link.sent.len(), 4);
        assert_eq!(m.handshake_resends(), 1);
    }

    #[test]
    fn streaming_device_is_not_nudged() {
        let mut m = monitor();
        m.connect().unwrap();

        for i in 0..5u16 {
            m.clock().advance(Duration::from_millis(900));
            m.link
                .incoming
                .push(&TelemetryFrame::Legacy { stack_usage: 200 + i }.encode());
            assert_eq!(m.poll_frames().unwrap(), 1);
            assert!(!m.keepalive_tick().unwrap());
        }
        assert_eq!(m.link.sent.len(), 3);
        assert_eq!(m.snapshot().packet_count, 5);
        assert_eq!(m.snapshot().peak_usage, 204);
    }

    #[test]
    fn silent_device_after_first_frame_is_left_alone() {
        let mut m = monitor();
        m.connect().unwrap();

        m.clock().advance(Duration::from_millis(500));
        m.link
            .incoming
            .push(&TelemetryFrame::Legacy { stack_usage: 0x0180 }.encode());
        assert_eq!(m.poll_frames().unwrap(), 1);

        m.clock().advance(Duration::from_millis(2100));
        assert!(!m.keepalive_tick().unwrap());
        assert_eq!(m.link.sent.len(), 3);
    }

    #[test]
    fn run_stops_on_shutdown_signal() {
        let mut m = monitor();
        m.link.incoming.push(
            &TelemetryFrame::Extended {
                flags: Flags::PEAK_NEW,
                stack_usage: 300,
                peak_usage: 300,
                heap_usage: 0,
                free_memory: 1748,
            }
            .encode(),
        );

        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut frames_seen = Vec::new();
        m.run(&rx, |snap, _, _| {
            frames_seen.push(snap.packet_count);
            let _ = tx.try_send(());
        })
        .unwrap();

        assert_eq!(frames_seen, vec![1]);
        assert!(m.snapshot().peak_flash);
    }

    #[test]
    fn replay_link_discards_writes() {
        let bytes = TelemetryFrame::Legacy { stack_usage: 0x0123 }.encode();
        let mut m = Monitor::new(
            ReplayLink::new(&bytes),
            ManualClock::new(Instant::now()),
            &AppConfig::default(),
        );
        m.connect().unwrap();
        assert_eq!(m.poll_frames().unwrap(), 1);
        assert_eq!(m.snapshot().stack_usage, 0x0123);
    }
}
