//! Speaking gate: hysteresis plus output rate limiting.

use std::time::Duration;

use tokio::time::Instant;

use super::types::SpeakingConfig;

/// Result of feeding one frame into the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateUpdate {
    pub speaking: bool,
    /// The speaking flag flipped on this frame.
    pub transitioned: bool,
    /// This frame should be reported to observers.
    pub emit: bool,
}

/// Flips to speaking only after the level has stayed above threshold for the
/// activation delay, and back only after it has stayed at or below threshold
/// for the deactivation delay. Output is rate limited, except transitions.
#[derive(Debug, Clone)]
pub struct SpeakingGate {
    threshold: f32,
    activation: Duration,
    deactivation: Duration,
    min_emit_interval: Duration,
    speaking: bool,
    /// Start of the current run of frames that disagree with `speaking`.
    run_start: Option<Instant>,
    last_emit: Option<Instant>,
}

impl SpeakingGate {
    pub fn new(config: &SpeakingConfig) -> Self {
        Self {
            threshold: config.threshold,
            activation: config.activation_delay,
            deactivation: config.deactivation_delay,
            min_emit_interval: config.min_emit_interval(),
            speaking: false,
            run_start: None,
            last_emit: None,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn reset(&mut self) {
        self.speaking = false;
        self.run_start = None;
        self.last_emit = None;
    }

    pub fn update(&mut self, level: f32, now: Instant) -> GateUpdate {
        let above = level > self.threshold;
        let mut transitioned = false;

        if above == self.speaking {
            self.run_start = None;
        } else {
            let start = *self.run_start.get_or_insert(now);
            let required = if above {
                self.activation
            } else {
                self.deactivation
            };
            if now.saturating_duration_since(start) >= required {
                self.speaking = above;
                self.run_start = None;
                transitioned = true;
            }
        }

        let due = self
            .last_emit
            .map_or(true, |t| now.saturating_duration_since(t) >= self.min_emit_interval);
        let emit = transitioned || due;
        if emit {
            self.last_emit = Some(now);
        }

        GateUpdate {
            speaking: self.speaking,
            transitioned,
            emit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn gate() -> SpeakingGate {
        SpeakingGate::new(&SpeakingConfig::default())
    }

    /// Feed `frames` frames of `level`, returning updates.
    fn feed(gate: &mut SpeakingGate, now: &mut Instant, level: f32, frames: usize) -> Vec<GateUpdate> {
        (0..frames)
            .map(|_| {
                let update = gate.update(level, *now);
                *now += FRAME;
                update
            })
            .collect()
    }

    #[test]
    fn short_burst_never_activates() {
        let mut g = gate();
        let mut now = Instant::now();
        // 9 frames = 144ms above threshold.
        let updates = feed(&mut g, &mut now, 0.8, 9);
        assert!(updates.iter().all(|u| !u.speaking));
        feed(&mut g, &mut now, 0.0, 5);
        assert!(!g.is_speaking());
    }

    #[test]
    fn sustained_level_activates_after_delay() {
        let mut g = gate();
        let mut now = Instant::now();
        let updates = feed(&mut g, &mut now, 0.8, 12);
        let first = updates.iter().position(|u| u.speaking).unwrap();
        // Frame 10 is the first at or past 150ms (10 * 16 = 160).
        assert_eq!(first, 10);
        assert!(updates[first].transitioned);
        assert!(updates[first].emit);
        assert_eq!(updates.iter().filter(|u| u.transitioned).count(), 1);
    }

    #[test]
    fn brief_dip_does_not_deactivate() {
        let mut g = gate();
        let mut now = Instant::now();
        feed(&mut g, &mut now, 0.8, 12);
        assert!(g.is_speaking());

        // 224ms of silence is not enough.
        let updates = feed(&mut g, &mut now, 0.0, 15);
        assert!(updates.iter().all(|u| u.speaking));

        // Speech resumes, which restarts the silence run.
        feed(&mut g, &mut now, 0.8, 1);
        let updates = feed(&mut g, &mut now, 0.0, 15);
        assert!(updates.iter().all(|u| u.speaking));
    }

    #[test]
    fn sustained_silence_deactivates() {
        let mut g = gate();
        let mut now = Instant::now();
        feed(&mut g, &mut now, 0.8, 12);
        let updates = feed(&mut g, &mut now, 0.0, 25);
        let off = updates.iter().position(|u| !u.speaking).unwrap();
        // 19 * 16 = 304ms.
        assert_eq!(off, 19);
        assert!(updates[off].transitioned);
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn activation_boundary_is_exact() {
        let mut g = gate();
        let t0 = Instant::now();
        assert!(!g.update(0.8, t0).speaking);
        assert!(!g.update(0.8, t0 + ms(149)).speaking);
        // Dropping at 150ms restarts the run.
        assert!(!g.update(0.0, t0 + ms(150)).speaking);
        assert!(!g.update(0.8, t0 + ms(151)).speaking);

        let mut g = gate();
        g.update(0.8, t0);
        let u = g.update(0.8, t0 + ms(151));
        assert!(u.speaking);
        assert!(u.transitioned);
    }

    #[test]
    fn deactivation_boundary_is_exact() {
        let speaking_gate = |t0: Instant| {
            let mut g = gate();
            g.update(0.8, t0);
            assert!(g.update(0.8, t0 + ms(150)).transitioned);
            g
        };
        let t0 = Instant::now();
        let s0 = t0 + ms(200);

        let mut g = speaking_gate(t0);
        assert!(g.update(0.0, s0).speaking);
        assert!(g.update(0.0, s0 + ms(299)).speaking);
        assert!(g.update(0.8, s0 + ms(300)).speaking);
        assert!(g.update(0.0, s0 + ms(301)).speaking);

        let mut g = speaking_gate(t0);
        g.update(0.0, s0);
        let u = g.update(0.0, s0 + ms(301));
        assert!(!u.speaking);
        assert!(u.transitioned);
    }

    #[test]
    fn level_equal_to_threshold_is_silence() {
        let mut g = gate();
        let mut now = Instant::now();
        let updates = feed(&mut g, &mut now, 0.05, 30);
        assert!(updates.iter().all(|u| !u.speaking));
    }

    #[test]
    fn output_is_rate_limited() {
        let mut g = gate();
        let mut now = Instant::now();
        // One second of steady silence at 16ms frames.
        let updates = feed(&mut g, &mut now, 0.0, 63);
        let emitted = updates.iter().filter(|u| u.emit).count();
        assert!(emitted <= 21, "emitted {emitted}");
        assert!(emitted >= 15, "emitted {emitted}");
    }

    #[test]
    fn transitions_bypass_rate_limit() {
        let mut g = gate();
        let start = Instant::now();
        g.update(0.8, start);
        // Next frame emits only if 50ms passed; force transition at +150ms
        // immediately after a regular emit.
        g.update(0.8, start + Duration::from_millis(140));
        let u = g.update(0.8, start + Duration::from_millis(150));
        assert!(u.transitioned);
        assert!(u.emit);
    }

    #[test]
    fn reset_clears_state() {
        let mut g = gate();
        let mut now = Instant::now();
        feed(&mut g, &mut now, 0.8, 12);
        g.reset();
        assert!(!g.is_speaking());
        assert!(g.update(0.0, now).emit);
    }
}
