use chrono::{DateTime, Utc};

/// Source of the current time, injected wherever a run needs "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that advances by a fixed step on every read
#[cfg(test)]
pub struct FixedClock {
    current: std::sync::Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            current: std::sync::Mutex::new(start),
            step,
        }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap();
        let now = *current;
        *current = now + self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_steps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start, chrono::Duration::seconds(5));

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now() - start, chrono::Duration::seconds(5));
    }
}
