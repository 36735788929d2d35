//! Conversion from the on-disk config schema to engine configuration.

use std::time::Duration;

use huddle_call::connection::{IceServer, QualityThresholds};
use huddle_config::schema;

fn ms(value: u32) -> Duration {
    Duration::from_millis(u64::from(value))
}

fn ice_server(server: &schema::IceServerConfig) -> IceServer {
    IceServer {
        urls: server.urls.clone(),
        username: server.username.clone(),
        credential: server.credential.clone(),
    }
}

pub fn connection_config(config: &schema::ConnectionConfig) -> huddle_call::ConnectionConfig {
    let q = &config.quality;
    huddle_call::ConnectionConfig {
        ice_servers: config.ice_servers.iter().map(ice_server).collect(),
        fallback_relays: config.fallback_relays.iter().map(ice_server).collect(),
        max_reconnect_attempts: config.max_reconnect_attempts,
        reconnect_base_delay: ms(config.reconnect_base_delay_ms),
        ice_disconnect_grace: ms(config.ice_disconnect_grace_ms),
        stats_interval: ms(config.stats_interval_ms),
        thresholds: QualityThresholds {
            rtt_ms: [
                f64::from(q.excellent_rtt_ms),
                f64::from(q.good_rtt_ms),
                f64::from(q.fair_rtt_ms),
            ],
            packet_loss: [q.excellent_loss, q.good_loss, q.fair_loss],
            jitter_ms: [
                f64::from(q.excellent_jitter_ms),
                f64::from(q.good_jitter_ms),
                f64::from(q.fair_jitter_ms),
            ],
        },
    }
}

pub fn speaking_config(config: &schema::SpeakingConfig) -> huddle_call::SpeakingConfig {
    huddle_call::SpeakingConfig {
        noise_floor: config.noise_floor as f32,
        level_ceiling: config.level_ceiling as f32,
        threshold: config.threshold as f32,
        activation_delay: ms(config.activation_delay_ms),
        deactivation_delay: ms(config.deactivation_delay_ms),
        max_update_hz: config.max_update_hz,
        fft_size: config.fft_size as usize,
        smoothing: config.smoothing,
        frame_interval: ms(config.frame_interval_ms),
    }
}

pub fn presence_config(config: &schema::PresenceConfig) -> huddle_call::PresenceConfig {
    huddle_call::PresenceConfig {
        heartbeat_interval: ms(config.heartbeat_interval_ms),
        stale_sweep_interval: ms(config.stale_sweep_interval_ms),
        stale_threshold: ms(config.stale_threshold_ms),
        speaking_rate_limit: ms(config.speaking_rate_limit_ms),
    }
}
