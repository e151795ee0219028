//! Handshake e keepalive do host.
//!
//! O firmware só começa a transmitir depois de receber `0xA5`. Na conexão o
//! byte é enviado em rajada; enquanto nenhum frame responder, um único byte
//! é reenviado a cada intervalo ocioso. Nada aqui afeta o decoder.

use crate::clock::Clock;
use crate::config::HandshakeConfig;
use crate::frame::HANDSHAKE_BYTE;
use crate::source::TransportError;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::debug;

/// Destino dos bytes enviados ao dispositivo.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;
}

impl<W: Write + ?Sized> ByteSink for W {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.write_all(&[byte])?;
        self.flush()?;
        Ok(())
    }
}

/// Agenda de handshake e reenvio por ociosidade.
#[derive(Debug, Clone)]
pub struct Keepalive {
    burst_count: u32,
    burst_delay: Duration,
    idle_resend: Duration,
    last_sent: Option<Instant>,
    resends: u64,
}

impl Keepalive {
    pub fn new(config: &HandshakeConfig) -> Self {
        Self {
            burst_count: config.burst_count,
            burst_delay: Duration::from_millis(config.burst_delay_ms),
            idle_resend: Duration::from_secs_f64(config.idle_resend_secs),
            last_sent: None,
            resends: 0,
        }
    }

    /// Quantos reenvios por ociosidade já foram feitos.
    pub fn resends(&self) -> u64 {
        self.resends
    }

    /// Rajada inicial: `burst_count` bytes com `burst_delay` entre eles.
    pub fn connect_burst<K: ByteSink + ?Sized, C: Clock + ?Sized>(
        &mut self,
        sink: &mut K,
        clock: &C,
    ) -> Result<(), TransportError> {
        for _ in 0..self.burst_count {
            sink.write_byte(HANDSHAKE_BYTE)?;
            clock.sleep(self.burst_delay);
        }
        self.last_sent = Some(clock.now());
        debug!("Handshake enviado ({}x)", self.burst_count);
        Ok(())
    }

    /// Reenvia um byte se nenhum frame chegou depois do último handshake e
    /// o intervalo ocioso já passou. Retorna `true` se reenviou.
    ///
    /// Cada `0xA5` faz o firmware repintar a stack e zerar o pico, então
    /// depois do primeiro frame o link não é mais cutucado.
    pub fn poll<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
        last_frame: Option<Instant>,
        now: Instant,
    ) -> Result<bool, TransportError> {
        let answered = match (last_frame, self.last_sent) {
            (Some(frame), Some(sent)) => frame >= sent,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if answered {
            return Ok(false);
        }

        let idle = self
            .last_sent
            .is_none_or(|t| now.saturating_duration_since(t) > self.idle_resend);
        if !idle {
            return Ok(false);
        }

        sink.write_byte(HANDSHAKE_BYTE)?;
        self.last_sent = Some(now);
        self.resends += 1;
        debug!("Link ocioso, handshake reenviado (#{})", self.resends);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn keepalive() -> Keepalive {
        Keepalive::new(&HandshakeConfig::default())
    }

    #[test]
    fn connect_sends_three_handshakes() {
        let clock = ManualClock::new(Instant::now());
        let start = clock.now();
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();

        ka.connect_burst(&mut sink, &clock).unwrap();
        assert_eq!(sink, vec![0xA5, 0xA5, 0xA5]);
        assert_eq!(clock.now() - start, Duration::from_millis(300));

        // O intervalo ocioso conta a partir do fim da rajada
        clock.advance(Duration::from_millis(2000));
        assert!(!ka.poll(&mut sink, None, clock.now()).unwrap());
    }

    #[test]
    fn idle_link_resends_exactly_once() {
        let clock = ManualClock::new(Instant::now());
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();
        ka.connect_burst(&mut sink, &clock).unwrap();
        sink.clear();

        clock.advance(Duration::from_millis(1500));
        assert!(!ka.poll(&mut sink, None, clock.now()).unwrap());
        assert!(sink.is_empty());

        clock.advance(Duration::from_millis(600));
        assert!(ka.poll(&mut sink, None, clock.now()).unwrap());
        assert!(!ka.poll(&mut sink, None, clock.now()).unwrap());
        assert_eq!(sink, vec![HANDSHAKE_BYTE]);
        assert_eq!(ka.resends(), 1);
    }

    #[test]
    fn recent_frame_suppresses_resend() {
        let clock = ManualClock::new(Instant::now());
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();
        ka.connect_burst(&mut sink, &clock).unwrap();
        sink.clear();

        clock.advance(Duration::from_secs(1));
        let frame_at = clock.now();
        clock.advance(Duration::from_millis(1500));

        assert!(!ka.poll(&mut sink, Some(frame_at), clock.now()).unwrap());
        assert!(sink.is_empty());
    }

    #[test]
    fn answered_handshake_is_never_repeated() {
        let clock = ManualClock::new(Instant::now());
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();
        ka.connect_burst(&mut sink, &clock).unwrap();
        sink.clear();

        clock.advance(Duration::from_millis(500));
        let frame_at = clock.now();

        // Dispositivo parou de mandar: reenviar apagaria o pico medido
        clock.advance(Duration::from_millis(2100));
        assert!(!ka.poll(&mut sink, Some(frame_at), clock.now()).unwrap());
        clock.advance(Duration::from_secs(10));
        assert!(!ka.poll(&mut sink, Some(frame_at), clock.now()).unwrap());
        assert!(sink.is_empty());
        assert_eq!(ka.resends(), 0);
    }

    #[test]
    fn frame_older_than_handshake_does_not_count() {
        let clock = ManualClock::new(Instant::now());
        let frame_at = clock.now();
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();

        clock.advance(Duration::from_secs(1));
        ka.connect_burst(&mut sink, &clock).unwrap();
        sink.clear();

        clock.advance(Duration::from_millis(2100));
        assert!(ka.poll(&mut sink, Some(frame_at), clock.now()).unwrap());
        assert_eq!(sink, vec![HANDSHAKE_BYTE]);
    }

    #[test]
    fn resends_again_after_another_idle_period() {
        let clock = ManualClock::new(Instant::now());
        let mut sink: Vec<u8> = Vec::new();
        let mut ka = keepalive();
        ka.connect_burst(&mut sink, &clock).unwrap();
        sink.clear();

        for _ in 0..3 {
            clock.advance(Duration::from_millis(2100));
            assert!(ka.poll(&mut sink, None, clock.now()).unwrap());
        }
        assert_eq!(sink.len(), 3);
    }
}
