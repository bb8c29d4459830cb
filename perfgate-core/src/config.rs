use crate::*;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Parameters of a fixed worker-pool run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub thread_count: usize,
    /// Repetitions of every task.
    pub request_count: usize,
    pub request_timeout: Duration,
    /// Transmit `Task::body` with the request. Bodies are ignored otherwise.
    pub send_body: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            request_count: 1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            send_body: false,
        }
    }
}

impl RunConfig {
    pub fn new(thread_count: usize, request_count: usize) -> Self {
        Self {
            thread_count,
            request_count,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.request_count == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        Ok(())
    }
}

/// What a virtual user does with a result when the step buffer is full.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Discard the new result.
    #[default]
    DropNewest,
    /// Evict the oldest buffered result to make room.
    DropOldest,
    /// Wait for room. Room only frees up under
    /// [`UserLoadConfig::collect_during_step`], otherwise users stall once the buffer is full.
    Block,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop-newest" => Ok(OverflowPolicy::DropNewest),
            "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            "block" => Ok(OverflowPolicy::Block),
            _ => Err(ConfigError::OverflowPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverflowPolicy::DropNewest => "drop-newest",
            OverflowPolicy::DropOldest => "drop-oldest",
            OverflowPolicy::Block => "block",
        };
        f.write_str(name)
    }
}

/// Parameters of a user-count ramp.
#[derive(Clone, Debug)]
pub struct UserLoadConfig {
    pub start_users: usize,
    pub max_users: usize,
    pub step_users: usize,
    pub duration_per_step: Duration,
    pub cool_down: Duration,
    /// First-request delay per user index.
    pub stagger: Duration,
    pub think_time_min: Duration,
    pub think_time_max: Duration,
    pub monitor_interval: Duration,
    pub request_timeout: Duration,
    /// Step buffer size. Defaults to `users × tasks`.
    pub buffer_capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    /// Drain the step buffer while users run instead of once the step ends. Keeps every
    /// accepted result, so memory grows with the step duration.
    pub collect_during_step: bool,
}

impl Default for UserLoadConfig {
    fn default() -> Self {
        Self {
            start_users: 2,
            max_users: 50,
            step_users: 5,
            duration_per_step: Duration::from_secs(60),
            cool_down: DEFAULT_USER_COOL_DOWN,
            stagger: DEFAULT_USER_STAGGER,
            think_time_min: DEFAULT_THINK_TIME_MIN,
            think_time_max: DEFAULT_THINK_TIME_MAX,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            request_timeout: DEFAULT_USER_REQUEST_TIMEOUT,
            buffer_capacity: None,
            overflow_policy: OverflowPolicy::default(),
            collect_during_step: false,
        }
    }
}

impl UserLoadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_users == 0 {
            return Err(ConfigError::ZeroStartUsers);
        }
        if self.step_users == 0 {
            return Err(ConfigError::ZeroStepUsers);
        }
        if self.start_users > self.max_users {
            return Err(ConfigError::UserRange {
                start: self.start_users,
                max: self.max_users,
            });
        }
        if self.think_time_min >= self.think_time_max {
            return Err(ConfigError::ThinkTime {
                min: self.think_time_min,
                max: self.think_time_max,
            });
        }
        if self.monitor_interval.is_zero() {
            return Err(ConfigError::ZeroMonitorInterval);
        }
        if self.buffer_capacity == Some(0) {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        Ok(())
    }

    pub fn total_steps(&self) -> usize {
        self.max_users
            .saturating_sub(self.start_users)
            .checked_div(self.step_users)
            .map_or(1, |steps| steps + 1)
    }

    /// User counts of every step, in order.
    pub fn user_counts(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total_steps()).map(|step| self.start_users + step * self.step_users)
    }
}

/// Parameters of a data-volume ramp.
#[derive(Clone, Debug)]
pub struct DataLoadConfig {
    pub initial_data_size: usize,
    pub max_data_size: usize,
    pub data_size_multiplier: f64,
    pub steps_count: usize,
    pub cool_down: Duration,
}

impl Default for DataLoadConfig {
    fn default() -> Self {
        Self {
            initial_data_size: 1_000,
            max_data_size: 100_000,
            data_size_multiplier: 5.0,
            steps_count: 4,
            cool_down: DEFAULT_DATA_COOL_DOWN,
        }
    }
}

impl DataLoadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_data_size == 0 {
            return Err(ConfigError::ZeroDataSize);
        }
        if !self.data_size_multiplier.is_finite() || self.data_size_multiplier <= 0. {
            return Err(ConfigError::Multiplier(self.data_size_multiplier));
        }
        Ok(())
    }

    /// Data sizes of every step that will run, in order.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![];
        let mut current = self.initial_data_size;
        while sizes.len() < self.steps_count && current <= self.max_data_size {
            sizes.push(current);
            current = self.next_size(current);
        }
        sizes
    }

    pub fn next_size(&self, current: usize) -> usize {
        (current as f64 * self.data_size_multiplier) as usize
    }
}

/// Per-task request count for a simulated data size. Larger volumes get fewer samples.
pub fn request_count_for_size(data_size: usize) -> usize {
    match data_size {
        s if s < 1_000 => 100,
        s if s < 10_000 => 50,
        s if s < 100_000 => 20,
        _ => 10,
    }
}
