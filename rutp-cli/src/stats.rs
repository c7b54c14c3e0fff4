//! Statistics display and formatting

use rutp::StreamReport;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;
    const GBPS: u64 = MBPS * 1000;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps as f64 / GBPS as f64)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Bits per second for `bytes` moved over `elapsed`
pub fn throughput_bps(bytes: u64, elapsed: Duration) -> u64 {
    let micros = elapsed.as_micros();
    if micros == 0 {
        return 0;
    }
    (bytes as u128 * 8 * 1_000_000 / micros) as u64
}

/// One interval line, sender side
pub fn sender_line(report: &StreamReport, elapsed: Duration, interval: Duration) -> String {
    format!(
        "[{:6.1}s] Sent: {} | Rate: {} | Packets: {}",
        elapsed.as_secs_f64(),
        format_bytes(report.bytes.sent_this_interval),
        format_bandwidth(throughput_bps(report.bytes.sent_this_interval, interval)),
        report.packets_sent
    )
}

/// One interval line, receiver side
pub fn receiver_line(report: &StreamReport, elapsed: Duration, interval: Duration) -> String {
    format!(
        "[{:6.1}s] Received: {} | Rate: {} | Jitter: {:.3} ms | Lost: {}/{} ({:.2}%) | Out of order: {}",
        elapsed.as_secs_f64(),
        format_bytes(report.bytes.received_this_interval),
        format_bandwidth(throughput_bps(report.bytes.received_this_interval, interval)),
        report.jitter_ms,
        report.lost,
        report.highest_seen,
        report.loss_percent,
        report.out_of_order
    )
}

/// Display the end-of-test summary
pub fn display_summary(report: &StreamReport, elapsed: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ STREAM SUMMARY                                              │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Duration:     {:.2}s", elapsed.as_secs_f64());
    println!(
        "│ Bytes:        {} sent / {} received",
        format_bytes(report.bytes.sent),
        format_bytes(report.bytes.received)
    );
    println!(
        "│ Throughput:   {} / {}",
        format_bandwidth(throughput_bps(report.bytes.sent, elapsed)),
        format_bandwidth(throughput_bps(report.bytes.received, elapsed))
    );
    println!("│ Packets sent: {}", report.packets_sent);
    println!(
        "│ Lost:         {}/{} ({:.2}%)",
        report.lost, report.highest_seen, report.loss_percent
    );
    println!("│ Out of order: {}", report.out_of_order);
    println!("│ Jitter:       {:.3} ms", report.jitter_ms);
    println!("└─────────────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_format_bandwidth() {
        assert_eq!(format_bandwidth(500), "500 bps");
        assert_eq!(format_bandwidth(10_000), "10.00 Kbps");
        assert_eq!(format_bandwidth(10_000_000), "10.00 Mbps");
    }

    #[test]
    fn test_throughput() {
        assert_eq!(throughput_bps(125_000, Duration::from_secs(1)), 1_000_000);
        assert_eq!(throughput_bps(125_000, Duration::from_millis(500)), 2_000_000);
        assert_eq!(throughput_bps(1, Duration::ZERO), 0);
    }

    #[test]
    fn test_receiver_line() {
        let report = StreamReport {
            highest_seen: 100,
            lost: 2,
            loss_percent: 2.0,
            jitter_ms: 0.25,
            ..Default::default()
        };
        let line = receiver_line(&report, Duration::from_secs(3), Duration::from_secs(1));
        assert!(line.contains("Lost: 2/100 (2.00%)"));
        assert!(line.contains("Jitter: 0.250 ms"));
    }
}
