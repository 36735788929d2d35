//! Connection quality: stats sampling and classification.

use serde::Serialize;
use tokio::time::Instant;

use crate::media::MediaKind;

/// Coarse link quality. Ordered worst to best, so the worst of several
/// classifications is their minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

/// One entry from a transport stats report. Times are in seconds, as
/// reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsReport {
    CandidatePair {
        nominated: bool,
        current_round_trip_time: Option<f64>,
    },
    InboundRtp {
        kind: MediaKind,
        packets_received: u64,
        packets_lost: i64,
        jitter: f64,
        bytes_received: u64,
    },
    OutboundRtp {
        kind: MediaKind,
        bytes_sent: u64,
    },
    RemoteInboundRtp {
        kind: MediaKind,
        round_trip_time: Option<f64>,
        fraction_lost: Option<f64>,
        jitter: Option<f64>,
    },
}

/// Classification bounds. A metric below `excellent` is excellent, below
/// `good` is good, below `fair` is fair, and anything else is poor.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    pub rtt_ms: [f64; 3],
    pub packet_loss: [f64; 3],
    pub jitter_ms: [f64; 3],
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            rtt_ms: [100.0, 200.0, 400.0],
            packet_loss: [0.01, 0.03, 0.08],
            jitter_ms: [20.0, 50.0, 100.0],
        }
    }
}

impl QualityThresholds {
    /// Worst-of classification across round-trip time, loss ratio, and jitter.
    pub fn classify(&self, rtt_ms: f64, packet_loss: f64, jitter_ms: f64) -> ConnectionQuality {
        classify_metric(rtt_ms, &self.rtt_ms)
            .min(classify_metric(packet_loss, &self.packet_loss))
            .min(classify_metric(jitter_ms, &self.jitter_ms))
    }
}

fn classify_metric(value: f64, bounds: &[f64; 3]) -> ConnectionQuality {
    if value < bounds[0] {
        ConnectionQuality::Excellent
    } else if value < bounds[1] {
        ConnectionQuality::Good
    } else if value < bounds[2] {
        ConnectionQuality::Fair
    } else {
        // NaN lands here too.
        ConnectionQuality::Poor
    }
}

/// Derived link metrics from one stats cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySnapshot {
    pub rtt_ms: f64,
    pub packet_loss: f64,
    pub jitter_ms: f64,
    pub audio_bitrate_kbps: f64,
    pub video_bitrate_kbps: f64,
    pub quality: ConnectionQuality,
}

#[derive(Debug, Clone, Copy, Default)]
struct PacketCounters {
    received: u64,
    lost: u64,
}

impl PacketCounters {
    /// Loss ratio over the packets seen since `prev`. Counters that went
    /// backwards belong to a fresh stream, so its totals are the window.
    fn loss_since(&self, prev: Option<&PacketCounters>) -> Option<f64> {
        let (received, lost) = match prev {
            Some(p) if self.received >= p.received && self.lost >= p.lost => {
                (self.received - p.received, self.lost - p.lost)
            }
            _ => (self.received, self.lost),
        };
        let total = received + lost;
        (total > 0).then(|| lost as f64 / total as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    at: Instant,
    audio_bytes: u64,
    video_bytes: u64,
    audio_packets: Option<PacketCounters>,
    video_packets: Option<PacketCounters>,
}

/// Turns successive stats reports into snapshots. Bitrates and packet loss
/// are measured over the window since the previous cycle, so the sampler is
/// stateful.
#[derive(Debug, Clone, Default)]
pub struct QualitySampler {
    thresholds: QualityThresholds,
    previous: Option<Counters>,
}

impl QualitySampler {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self {
            thresholds,
            previous: None,
        }
    }

    /// Forget counters, e.g. after the transport was replaced.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn sample(&mut self, reports: &[StatsReport], now: Instant) -> QualitySnapshot {
        let rtt_ms = round_trip_ms(reports);
        let mut packet_loss: f64 = 0.0;
        let mut jitter_ms: f64 = 0.0;
        let mut counters = Counters {
            at: now,
            audio_bytes: 0,
            video_bytes: 0,
            audio_packets: None,
            video_packets: None,
        };

        for report in reports {
            match report {
                StatsReport::InboundRtp {
                    kind,
                    packets_received,
                    packets_lost,
                    jitter,
                    bytes_received,
                } => {
                    let packets = counters.packets_mut(*kind);
                    packets.received += packets_received;
                    packets.lost += (*packets_lost).max(0) as u64;
                    jitter_ms = jitter_ms.max(jitter * 1000.0);
                    counters.add_bytes(*kind, *bytes_received);
                }
                StatsReport::OutboundRtp { kind, bytes_sent } => {
                    counters.add_bytes(*kind, *bytes_sent);
                }
                StatsReport::RemoteInboundRtp {
                    fraction_lost,
                    jitter,
                    ..
                } => {
                    if let Some(fraction) = fraction_lost {
                        packet_loss = packet_loss.max(*fraction);
                    }
                    if let Some(j) = jitter {
                        jitter_ms = jitter_ms.max(j * 1000.0);
                    }
                }
                StatsReport::CandidatePair { .. } => {}
            }
        }

        let prev = self.previous.as_ref();
        let windowed = [
            (counters.audio_packets, prev.and_then(|p| p.audio_packets)),
            (counters.video_packets, prev.and_then(|p| p.video_packets)),
        ];
        for (current, before) in windowed {
            if let Some(loss) = current.and_then(|c| c.loss_since(before.as_ref())) {
                packet_loss = packet_loss.max(loss);
            }
        }

        let (audio_bitrate_kbps, video_bitrate_kbps) = match prev {
            Some(prev) => {
                let secs = now.saturating_duration_since(prev.at).as_secs_f64();
                if secs > 0.0 {
                    (
                        kbps(counters.audio_bytes.saturating_sub(prev.audio_bytes), secs),
                        kbps(counters.video_bytes.saturating_sub(prev.video_bytes), secs),
                    )
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };
        self.previous = Some(counters);

        QualitySnapshot {
            rtt_ms,
            packet_loss,
            jitter_ms,
            audio_bitrate_kbps,
            video_bitrate_kbps,
            quality: self.thresholds.classify(rtt_ms, packet_loss, jitter_ms),
        }
    }
}

impl Counters {
    fn add_bytes(&mut self, kind: MediaKind, bytes: u64) {
        match kind {
            MediaKind::Audio => self.audio_bytes += bytes,
            MediaKind::Video => self.video_bytes += bytes,
        }
    }

    fn packets_mut(&mut self, kind: MediaKind) -> &mut PacketCounters {
        match kind {
            MediaKind::Audio => self.audio_packets.get_or_insert_with(PacketCounters::default),
            MediaKind::Video => self.video_packets.get_or_insert_with(PacketCounters::default),
        }
    }
}

/// Round-trip time from the nominated candidate pair, falling back to the
/// largest remote-inbound measurement.
fn round_trip_ms(reports: &[StatsReport]) -> f64 {
    let nominated = reports.iter().find_map(|r| match r {
        StatsReport::CandidatePair {
            nominated: true,
            current_round_trip_time: Some(rtt),
        } => Some(*rtt),
        _ => None,
    });
    let secs = nominated.unwrap_or_else(|| {
        reports
            .iter()
            .filter_map(|r| match r {
                StatsReport::RemoteInboundRtp {
                    round_trip_time: Some(rtt),
                    ..
                } => Some(*rtt),
                _ => None,
            })
            .fold(0.0, f64::max)
    });
    secs * 1000.0
}

fn kbps(bytes: u64, secs: f64) -> f64 {
    bytes as f64 * 8.0 / secs / 1000.0
}
