use async_trait::async_trait;
use karma_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source used by [`RequestPacer`].
#[async_trait]
pub trait PacingClock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer (honours `tokio::time::pause`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl PacingClock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl<C: PacingClock + ?Sized> PacingClock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-util"))]
/// Clock that only moves when told to. Sleeping advances it instantly and
/// records the requested duration.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: std::sync::Mutex<ManualClockState>,
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
struct ManualClockState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: std::sync::Mutex::new(ManualClockState::default()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.offset += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sleeps.clone()
    }

    pub fn elapsed(&self) -> Duration {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.offset
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl PacingClock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.offset += duration;
        state.sleeps.push(duration);
    }
}

/// Fixed-interval gate between listing requests.
///
/// The first request goes out immediately; every later one waits until a full
/// interval has passed since the previous one was let through.
pub struct RequestPacer {
    interval: Duration,
    clock: Box<dyn PacingClock>,
    last_request: Option<Instant>,
    acquisitions: u64,
    total_waited: Duration,
}

impl RequestPacer {
    pub fn new(interval: Duration, clock: impl PacingClock + 'static) -> Self {
        Self {
            interval,
            clock: Box::new(clock),
            last_request: None,
            acquisitions: 0,
            total_waited: Duration::ZERO,
        }
    }

    pub fn per_second(
        requests_per_second: f64,
        clock: impl PacingClock + 'static,
    ) -> Result<Self, ConfigError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "requests_per_second".to_string(),
                value: requests_per_second.to_string(),
            });
        }
        Ok(Self::new(
            Duration::from_secs_f64(1.0 / requests_per_second),
            clock,
        ))
    }

    /// Wait for the next slot. Returns how long this call waited.
    pub async fn acquire(&mut self) -> Duration {
        let mut waited = Duration::ZERO;

        if let Some(last) = self.last_request {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.interval {
                waited = self.interval - elapsed;
                debug!("Pacing listing requests, waiting {:?}", waited);
                self.clock.sleep(waited).await;
            }
        }

        self.last_request = Some(self.clock.now());
        self.acquisitions += 1;
        self.total_waited += waited;
        waited
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> PacerStatus {
        PacerStatus {
            interval: self.interval,
            acquisitions: self.acquisitions,
            total_waited: self.total_waited,
        }
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("interval", &self.interval)
            .field("last_request", &self.last_request)
            .field("acquisitions", &self.acquisitions)
            .field("total_waited", &self.total_waited)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacerStatus {
    pub interval: Duration,
    pub acquisitions: u64,
    pub total_waited: Duration,
}

impl PacerStatus {
    pub fn requests_per_second(&self) -> f64 {
        1.0 / self.interval.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let clock = Arc::new(ManualClock::new());
        let mut pacer = RequestPacer::new(Duration::from_secs(2), clock.clone());

        assert_eq!(pacer.acquire().await, Duration::ZERO);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_requests_wait_full_interval() {
        let clock = Arc::new(ManualClock::new());
        let mut pacer = RequestPacer::new(Duration::from_secs(2), clock.clone());

        pacer.acquire().await;
        assert_eq!(pacer.acquire().await, Duration::from_secs(2));
        assert_eq!(pacer.acquire().await, Duration::from_secs(2));

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
        assert_eq!(clock.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_waits_only_the_remaining_interval() {
        let clock = Arc::new(ManualClock::new());
        let mut pacer = RequestPacer::new(Duration::from_secs(2), clock.clone());

        pacer.acquire().await;
        clock.advance(Duration::from_millis(1500));
        assert_eq!(pacer.acquire().await, Duration::from_millis(500));

        clock.advance(Duration::from_secs(5));
        assert_eq!(pacer.acquire().await, Duration::ZERO);

        let status = pacer.status();
        assert_eq!(status.acquisitions, 3);
        assert_eq!(status.total_waited, Duration::from_millis(500));
    }

    #[test]
    fn test_per_second_conversion() {
        let pacer = RequestPacer::per_second(0.5, ManualClock::new()).unwrap();
        assert_eq!(pacer.interval(), Duration::from_secs(2));
        assert_eq!(pacer.status().requests_per_second(), 0.5);

        assert!(RequestPacer::per_second(0.0, ManualClock::new()).is_err());
        assert!(RequestPacer::per_second(f64::INFINITY, ManualClock::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_paces_in_paused_time() {
        let mut pacer = RequestPacer::new(Duration::from_secs(2), TokioClock);
        let start = tokio::time::Instant::now();

        pacer.acquire().await;
        pacer.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
