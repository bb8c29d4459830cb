use std::time::Duration;

/// Default percentage a metric may worsen by before an endpoint is flagged as degraded.
pub const DEFAULT_THRESHOLD_PCT: f64 = 10.0;

/// Per-request timeout of the shared worker-pool client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout of each virtual user's private client.
pub const DEFAULT_USER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle-connection timeout of each virtual user's private client.
pub const DEFAULT_USER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval of the worker-pool progress log.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Delay added per user index before a virtual user's first request.
pub const DEFAULT_USER_STAGGER: Duration = Duration::from_millis(100);

/// Lower bound (inclusive) of a virtual user's think-time.
pub const DEFAULT_THINK_TIME_MIN: Duration = Duration::from_millis(100);

/// Upper bound (exclusive) of a virtual user's think-time.
pub const DEFAULT_THINK_TIME_MAX: Duration = Duration::from_millis(1000);

/// Interval of the user-load step monitor.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Pause between user-load steps.
pub const DEFAULT_USER_COOL_DOWN: Duration = Duration::from_secs(5);

/// Pause between data-load steps.
pub const DEFAULT_DATA_COOL_DOWN: Duration = Duration::from_secs(2);

/// Sentinel the running minimum duration starts from.
pub(crate) const MIN_DURATION_SENTINEL: Duration = Duration::from_secs(60 * 60);
