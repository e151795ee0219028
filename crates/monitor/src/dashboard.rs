//! Dashboard de terminal – barras, sparklines e status.

use colored::{ColoredString, Colorize};
use stackscope_core::alerts::{self, AlertLevel, MemoryStatus};
use stackscope_core::config::{AlertThresholds, DashboardConfig};
use stackscope_core::decoder::DecoderStats;
use stackscope_core::state::{LinkStatus, TelemetrySnapshot};
use std::fmt::Write;
use std::time::Instant;

const SPARK_BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PEAK_MARKER: char = '▌';

/// Limpa a tela e volta o cursor para o topo.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Contexto fixo de renderização.
pub struct DashboardView<'a> {
    pub port: &'a str,
    pub config: &'a DashboardConfig,
    pub thresholds: &'a AlertThresholds,
}

// ──────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────

/// Barra de `width` caracteres. `marker` desenha a posição do pico.
pub fn bar(value: i64, max: u32, width: usize, marker: Option<u16>) -> String {
    let ratio = |v: f64| {
        if max == 0 {
            0.0
        } else {
            (v / f64::from(max)).clamp(0.0, 1.0)
        }
    };

    let filled = (ratio(value as f64) * width as f64) as usize;
    let mut cells: Vec<char> = std::iter::repeat_n('█', filled)
        .chain(std::iter::repeat_n('░', width - filled))
        .collect();

    if let Some(pos) = marker.filter(|&p| p > 0) {
        let idx = (ratio(f64::from(pos)) * width as f64) as usize;
        if idx < width {
            cells[idx] = PEAK_MARKER;
        }
    }

    cells.into_iter().collect()
}

/// Sparkline com as últimas `width` amostras; `scale` é o bloco cheio.
pub fn sparkline(samples: impl Iterator<Item = u16>, scale: u16, width: usize) -> String {
    if scale == 0 {
        return "─".repeat(width);
    }
    let mut line: String = samples
        .map(|v| {
            let idx = ((f64::from(v) / f64::from(scale)) * 8.0) as usize;
            SPARK_BLOCKS[idx.min(8)]
        })
        .collect();
    let used = line.chars().count();
    line.push_str(&"─".repeat(width.saturating_sub(used)));
    line
}

fn percent(value: i64, total: u16) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / f64::from(total) * 100.0
    }
}

fn paint(text: &str, level: AlertLevel, normal: fn(&str) -> ColoredString) -> ColoredString {
    match level {
        AlertLevel::Critical => text.red().bold(),
        AlertLevel::Warning => text.yellow().bold(),
        AlertLevel::Normal => normal(text),
    }
}

fn metric_row(
    out: &mut String,
    label: ColoredString,
    value: i64,
    total: u16,
    bar_text: ColoredString,
) {
    let _ = writeln!(
        out,
        "  {:<14} {:>5}B ({:>5.1}%)  {}",
        label,
        value,
        percent(value, total),
        bar_text
    );
}

// ──────────────────────────────────────────
// Render
// ──────────────────────────────────────────

/// Renderiza um quadro completo do dashboard.
pub fn render(
    snap: &TelemetrySnapshot,
    stats: &DecoderStats,
    view: &DashboardView<'_>,
    now: Instant,
) -> String {
    let cfg = view.config;
    let total = snap.layout.total_sram;
    let total_u32 = u32::from(total);
    let width = cfg.bar_width;
    let mut out = String::new();

    // ── Header ──
    let link = match snap.link_status(now, cfg.stale_after()) {
        LinkStatus::Waiting => "○ AGUARDANDO".dimmed(),
        LinkStatus::Live => "● LIVE".green().bold(),
        LinkStatus::Stale => "○ STALE".yellow(),
    };
    let _ = writeln!(
        out,
        "{} │ Porta: {} │ Pacotes: {} │ {}",
        "StackScope".cyan().bold(),
        view.port,
        snap.packet_count,
        link
    );
    let _ = writeln!(out, "{}", "─".repeat(60).as_str().dimmed());

    // ── Barras ──
    let static_data = i64::from(snap.layout.static_data);
    metric_row(
        &mut out,
        "Static Data".blue(),
        static_data,
        total,
        bar(static_data, total_u32, width, None).as_str().blue(),
    );

    let stack = i64::from(snap.stack_usage);
    let stack_bar = bar(stack, total_u32, width, Some(snap.peak_usage));
    let (stack_label, stack_bar) = if snap.alert_active {
        ("Stack".red(), stack_bar.as_str().red())
    } else {
        ("Stack".yellow(), stack_bar.as_str().yellow())
    };
    metric_row(&mut out, stack_label, stack, total, stack_bar);

    let peak = i64::from(snap.peak_usage);
    let peak_label = if snap.peak_flash {
        "Pico Stack".red().bold()
    } else {
        "Pico Stack".red()
    };
    metric_row(
        &mut out,
        peak_label,
        peak,
        total,
        bar(peak, total_u32, width, None).as_str().red(),
    );

    let heap = i64::from(snap.heap_usage);
    let heap_bar = bar(heap, total_u32, width, None);
    let (heap_label, heap_bar) = if heap > 0 {
        ("Heap".magenta(), heap_bar.as_str().magenta())
    } else {
        ("Heap".dimmed(), heap_bar.as_str().dimmed())
    };
    metric_row(&mut out, heap_label, heap, total, heap_bar);

    let free = i64::from(snap.free_memory);
    let free_level = alerts::free_memory_level(snap.free_memory, view.thresholds);
    metric_row(
        &mut out,
        paint("Livre", free_level, |s| s.green()),
        free,
        total,
        paint(&bar(free, total_u32, width, None), free_level, |s| s.green()),
    );

    let used = i64::from(snap.used_memory());
    let _ = writeln!(out);
    metric_row(
        &mut out,
        "Total Usado".white(),
        used,
        total,
        bar(used, total_u32, width, None).as_str().white(),
    );

    // ── Histórico ──
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {} {}",
        "Stack:".yellow(),
        sparkline(
            snap.stack_history.recent(cfg.sparkline_width),
            cfg.sparkline_scale,
            cfg.sparkline_width
        )
    );
    let _ = writeln!(
        out,
        "  {} {}",
        "Heap: ".magenta(),
        sparkline(
            snap.heap_history.recent(cfg.sparkline_width),
            cfg.sparkline_scale,
            cfg.sparkline_width
        )
    );
    let _ = writeln!(
        out,
        "{}",
        format!(
            "  Runtime: {:.0}s │ Update: {:.1}Hz │ v1: {} v2: {} │ Ressinc: {}B │ Abandonados: {}",
            snap.runtime(now).as_secs_f64(),
            snap.update_rate_hz(now),
            stats.legacy_frames,
            stats.extended_frames,
            stats.discarded_bytes,
            stats.abandoned_frames
        )
        .as_str()
        .dimmed()
    );

    // ── Status ──
    let status = MemoryStatus::from_snapshot(snap);
    let message = status.message(view.thresholds);
    let status_line = match status {
        MemoryStatus::Collision => message.as_str().red().bold().on_white(),
        MemoryStatus::NewPeak => message.as_str().cyan(),
        _ => paint(&message, status.level(), |s| s.green()),
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "  {status_line}");
    let _ = writeln!(
        out,
        "  {} [{}|{}{}{}]",
        "Mapa:".dimmed(),
        "STATIC".blue(),
        "HEAP→".magenta(),
        "···LIVRE···".green(),
        "←STACK".yellow()
    );
    let _ = writeln!(out, "{}", "─".repeat(60).as_str().dimmed());
    let _ = write!(out, "{}", "Ctrl+C para sair".dimmed());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackscope_core::frame::{Flags, TelemetryFrame};
    use stackscope_core::state::{MemoryLayout, TelemetryState};

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(1024, 2048, 10, None), "█████░░░░░");
        assert_eq!(bar(0, 2048, 4, None), "░░░░");
        assert_eq!(bar(5000, 2048, 4, None), "████");
        assert_eq!(bar(-30, 2048, 4, None), "░░░░");
        assert_eq!(bar(10, 0, 3, None), "░░░");
    }

    #[test]
    fn bar_draws_peak_marker() {
        assert_eq!(bar(512, 2048, 8, Some(1024)), "██░░▌░░░");
        // Pico no fim da escala cai fora da barra
        assert_eq!(bar(0, 2048, 4, Some(2048)), "░░░░");
        assert_eq!(bar(0, 2048, 4, Some(0)), "░░░░");
    }

    #[test]
    fn sparkline_scales_and_pads() {
        let line = sparkline([0u16, 250, 500, 1000].into_iter(), 500, 6);
        assert_eq!(line, " ▄██──");
        assert_eq!(sparkline(std::iter::empty(), 500, 3), "───");
        assert_eq!(sparkline([1u16].into_iter(), 0, 2), "──");
    }

    #[test]
    fn render_shows_live_state() {
        colored::control::set_override(false);

        let now = Instant::now();
        let mut state = TelemetryState::new(
            MemoryLayout {
                total_sram: 2048,
                static_data: 100,
            },
            now,
        );
        state.apply(
            &TelemetryFrame::Extended {
                flags: Flags::COLLISION,
                stack_usage: 400,
                peak_usage: 450,
                heap_usage: 60,
                free_memory: 20,
            },
            now,
        );

        let config = DashboardConfig::default();
        let thresholds = AlertThresholds::default();
        let view = DashboardView {
            port: "/dev/ttyUSB0",
            config: &config,
            thresholds: &thresholds,
        };
        let text = render(&state.snapshot(), &DecoderStats::default(), &view, now);

        assert!(text.contains("Porta: /dev/ttyUSB0"));
        assert!(text.contains("Pacotes: 1"));
        assert!(text.contains("● LIVE"));
        assert!(text.contains("COLISÃO"));
        assert!(text.contains("  560B"));
    }
}
