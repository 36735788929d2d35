//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[connection]
# max_reconnect_attempts = 3      # 0-10
# reconnect_base_delay_ms = 2000  # delay before attempt N is N x base
# ice_disconnect_grace_ms = 2000  # ICE "disconnected" may self-heal within this window
# stats_interval_ms = 2000        # 250-60000

# [[connection.ice_servers]]
# urls = ["stun:stun.l.google.com:19302"]

# Appended only after the first reconnect attempt. Set to [] to disable.
# [[connection.fallback_relays]]
# urls = ["turn:openrelay.metered.ca:80"]
# username = "openrelayproject"
# credential = "openrelayproject"

[connection.quality]
# excellent_rtt_ms = 100
# good_rtt_ms = 200
# fair_rtt_ms = 400
# excellent_loss = 0.01
# good_loss = 0.03
# fair_loss = 0.08
# excellent_jitter_ms = 20
# good_jitter_ms = 50
# fair_jitter_ms = 100

[speaking]
# noise_floor = 0.005          # RMS below this is silence
# level_ceiling = 0.2          # RMS mapped to level 1.0
# threshold = 0.05             # level that counts as voiced
# activation_delay_ms = 150
# deactivation_delay_ms = 300
# max_update_hz = 20
# fft_size = 512               # power of two
# smoothing = 0.8
# frame_interval_ms = 16

[presence]
# heartbeat_interval_ms = 10000
# stale_sweep_interval_ms = 15000
# stale_threshold_ms = 30000   # must exceed heartbeat_interval_ms
# speaking_rate_limit_ms = 200

[logging]
# level = "info"               # trace, debug, info, warn, error
# log_spans = false
"##
}
