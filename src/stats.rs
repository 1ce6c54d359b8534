use std::sync::OnceLock;
use std::time::Instant;

/// Buffer statistics for one direction of a port.
///
/// Timestamps are monotonic microseconds; a `first_buffer_time` of zero
/// means no buffer has been seen yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct CoreStats {
    pub buffer_count: u64,
    pub first_buffer_time: u64,
    pub last_buffer_time: u64,
    pub max_delay: u64,
}

impl CoreStats {
    /// Account for one buffer passing through at time `now`.
    pub(crate) fn record(&mut self, now: u64) {
        self.buffer_count += 1;

        if self.first_buffer_time == 0 {
            self.first_buffer_time = now;
            self.last_buffer_time = now;
        } else {
            self.max_delay = self
                .max_delay
                .max(now.saturating_sub(self.last_buffer_time));
            self.last_buffer_time = now;
        }
    }
}

/// The statistics collected directly by the core for one port.
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct CorePortStats {
    /// Buffers received by the port through send.
    pub rx: CoreStats,
    /// Buffers returned by the component.
    pub tx: CoreStats,
}

impl CorePortStats {
    #[inline]
    pub(crate) fn direction_mut(&mut self, direction: StatsDirection) -> &mut CoreStats {
        match direction {
            StatsDirection::Rx => &mut self.rx,
            StatsDirection::Tx => &mut self.tx,
        }
    }
}

/// Selects one direction of the per-port statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDirection {
    Rx,
    Tx,
}

/// Monotonic microseconds since the first call in this process.
pub(crate) fn monotonic_micros() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::CoreStats;

    #[test]
    fn record_tracks_delays() {
        let mut stats = CoreStats::default();

        stats.record(100);
        assert_eq!(stats.buffer_count, 1);
        assert_eq!(stats.first_buffer_time, 100);
        assert_eq!(stats.last_buffer_time, 100);
        assert_eq!(stats.max_delay, 0);

        stats.record(150);
        stats.record(160);
        assert_eq!(stats.buffer_count, 3);
        assert_eq!(stats.first_buffer_time, 100);
        assert_eq!(stats.last_buffer_time, 160);
        assert_eq!(stats.max_delay, 50);
    }
}
