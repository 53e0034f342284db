//! Accelerated virtual clock over a weather slice.

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::error::SimError;
use crate::weather::WeatherSeries;

use super::types::{ClockMode, ClockReading};

/// Highest slider position; `speed_from_slider(15)` is 32768x.
pub const MAX_SLIDER: u32 = 15;

/// A clock that advances simulated time at `speed` times wall-clock rate.
///
/// The driver calls [`VirtualClock::tick`] at its own cadence with the
/// current wall-clock instant. Simulated time is
/// `window_start + elapsed`, where elapsed grows only while running.
///
/// # Examples
///
/// ```no_run
/// use std::time::{Duration, Instant};
/// # fn demo(series: pv_array_sim::weather::WeatherSeries) -> Result<(), pv_array_sim::SimError> {
/// use pv_array_sim::sim::clock::VirtualClock;
///
/// let mut clock = VirtualClock::new(series, 3600.0)?;
/// let t0 = Instant::now();
/// clock.tick(t0)?;
/// clock.play()?;
/// // one real second is one simulated hour
/// let reading = clock.tick(t0 + Duration::from_secs(1))?;
/// assert_eq!(reading.elapsed_s, 3600.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VirtualClock {
    series: Option<WeatherSeries>,
    mode: ClockMode,
    /// Wall-clock instant of the previous tick.
    anchor: Option<Instant>,
    elapsed: TimeDelta,
    speed: f64,
    end_reached: bool,
}

impl VirtualClock {
    /// Arms a clock with `series`; it starts paused at the window start.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `speed` is not a positive finite number.
    pub fn new(series: WeatherSeries, speed: f64) -> Result<Self, SimError> {
        validate_speed(speed)?;
        Ok(Self {
            series: Some(series),
            mode: ClockMode::Paused,
            anchor: None,
            elapsed: TimeDelta::zero(),
            speed,
            end_reached: false,
        })
    }

    /// Sets the speed from a slider position `n`, giving `2^n`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `n > MAX_SLIDER`.
    pub fn speed_from_slider(n: u32) -> Result<f64, SimError> {
        if n > MAX_SLIDER {
            return Err(SimError::invalid(
                "simulation.speed",
                format!("slider position must be in 0..={MAX_SLIDER}"),
            ));
        }
        Ok(f64::from(1_u32 << n))
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.elapsed
    }

    pub fn end_reached(&self) -> bool {
        self.end_reached
    }

    pub fn series(&self) -> Option<&WeatherSeries> {
        self.series.as_ref()
    }

    /// Current simulated timestamp, or `None` when no series is loaded.
    pub fn timestamp(&self) -> Option<DateTime<Tz>> {
        self.series.as_ref().map(|s| s.window().0 + self.elapsed)
    }

    /// Starts or resumes accumulation without resetting elapsed time.
    ///
    /// # Errors
    ///
    /// Returns `NoWeatherLoaded` after [`VirtualClock::stop`] until re-armed.
    pub fn play(&mut self) -> Result<(), SimError> {
        if self.series.is_none() {
            return Err(SimError::NoWeatherLoaded);
        }
        if self.mode != ClockMode::Running {
            debug!(elapsed_s = self.elapsed.num_seconds(), "clock running");
        }
        self.mode = ClockMode::Running;
        Ok(())
    }

    /// Freezes accumulation. A stopped clock stays stopped.
    pub fn pause(&mut self) {
        if self.mode == ClockMode::Running {
            debug!(elapsed_s = self.elapsed.num_seconds(), "clock paused");
            self.mode = ClockMode::Paused;
        }
    }

    /// Drops the weather slice and resets elapsed time and the anchor.
    pub fn stop(&mut self) {
        self.series = None;
        self.mode = ClockMode::Stopped;
        self.anchor = None;
        self.elapsed = TimeDelta::zero();
        self.end_reached = false;
        debug!("clock stopped");
    }

    /// Changes the acceleration factor. Elapsed time already accumulated is kept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `speed` is not a positive finite number.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SimError> {
        validate_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    /// Loads a fresh slice, e.g. after `stop()` or once the end was reached.
    ///
    /// The clock restarts paused at the new window's start. Use
    /// [`WeatherSeries::with_window`] to move the window over existing data.
    pub fn rearm(&mut self, series: WeatherSeries) {
        let (start, end) = series.window();
        info!(%start, %end, "clock re-armed");
        self.series = Some(series);
        self.mode = ClockMode::Paused;
        self.anchor = None;
        self.elapsed = TimeDelta::zero();
        self.end_reached = false;
    }

    /// Advances simulated time to `now` and samples the weather there.
    ///
    /// The first tick only sets the anchor and reports the window start.
    /// Past the window end the timestamp clamps to the end and the clock
    /// pauses with `end_reached` set.
    ///
    /// # Errors
    ///
    /// * `NoWeatherLoaded` - the clock was stopped and not re-armed
    /// * `OutOfRange` - the slice does not cover the timestamp
    pub fn tick(&mut self, now: Instant) -> Result<ClockReading, SimError> {
        let Some(series) = self.series.as_ref() else {
            return Err(SimError::NoWeatherLoaded);
        };
        let (start, end) = series.window();

        if let Some(then) = self.anchor
            && self.mode == ClockMode::Running
        {
            let real = now.saturating_duration_since(then);
            self.elapsed += scale(real, self.speed).unwrap_or(end - start);
        }
        self.anchor = Some(now);

        let mut timestamp = start + self.elapsed;
        if timestamp > end {
            timestamp = end;
            self.elapsed = end - start;
            self.mode = ClockMode::Paused;
            if !self.end_reached {
                info!(%end, "end of simulation window reached");
            }
            self.end_reached = true;
        }

        let sample = series.interpolate_at(&timestamp)?;
        Ok(ClockReading {
            timestamp,
            elapsed_s: seconds_f64(self.elapsed),
            ghi: sample.ghi,
            temp_air: sample.temp_air,
            intensity: intensity(sample.ghi),
            mode: self.mode,
            end_reached: self.end_reached,
        })
    }
}

/// Maps irradiance onto a 0..=255 display level; 1000 W/m² and above is 255.
pub fn intensity(ghi: f64) -> u8 {
    (ghi / 1000.0 * 255.0).round().clamp(0.0, 255.0) as u8
}

fn validate_speed(speed: f64) -> Result<(), SimError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(SimError::invalid("simulation.speed", "must be > 0"));
    }
    Ok(())
}

fn seconds_f64(d: TimeDelta) -> f64 {
    d.num_seconds() as f64 + f64::from(d.subsec_nanos()) / 1e9
}

/// Real duration times `speed`, or `None` if it overflows.
fn scale(real: Duration, speed: f64) -> Option<TimeDelta> {
    let simulated = Duration::try_from_secs_f64(real.as_secs_f64() * speed).ok()?;
    TimeDelta::from_std(simulated).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::WeatherPoint;
    use chrono::{TimeZone, Timelike};
    use chrono_tz::America::New_York;

    /// Six hours of data at 100, 200, ... W/m², window 1h..5h.
    fn series() -> WeatherSeries {
        let t0 = New_York
            .with_ymd_and_hms(2000, 8, 24, 8, 0, 0)
            .single()
            .expect("unambiguous");
        let points = (0..7)
            .map(|h| WeatherPoint {
                timestamp: t0 + TimeDelta::hours(h),
                ghi: 100.0 * (h as f64 + 1.0),
                temp_air: 20.0 + h as f64,
            })
            .collect();
        WeatherSeries::from_points(
            New_York,
            t0 + TimeDelta::hours(1),
            t0 + TimeDelta::hours(5),
            points,
        )
        .expect("valid series")
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn starts_paused_at_window_start() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        assert_eq!(clock.mode(), ClockMode::Paused);
        let r = clock.tick(Instant::now()).expect("tick");
        assert_eq!(r.timestamp.hour(), 9);
        assert_eq!(r.ghi, 200.0);
        assert_eq!(r.elapsed_s, 0.0);
    }

    #[test]
    fn running_accumulates_scaled_time() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        let t0 = Instant::now();
        clock.tick(t0).expect("tick");
        clock.play().expect("play");
        let r = clock.tick(t0 + secs(30)).expect("tick");
        // 30 s at 60x is 30 min
        assert_eq!(r.elapsed_s, 1800.0);
        assert_eq!(r.timestamp.minute(), 30);
        assert!((r.ghi - 250.0).abs() < 1e-9);
    }

    #[test]
    fn first_tick_while_running_reports_start() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        clock.play().expect("play");
        let r = clock.tick(Instant::now()).expect("tick");
        assert_eq!(r.elapsed_s, 0.0);
    }

    #[test]
    fn elapsed_is_monotone_while_running() {
        let mut clock = VirtualClock::new(series(), 10.0).expect("valid clock");
        let t0 = Instant::now();
        clock.play().expect("play");
        let mut last = -1.0;
        for k in 0..50 {
            let r = clock.tick(t0 + Duration::from_millis(100 * k)).expect("tick");
            assert!(r.elapsed_s >= last);
            last = r.elapsed_s;
        }
        assert!(last > 0.0);
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        let t0 = Instant::now();
        clock.play().expect("play");
        clock.tick(t0).expect("tick");
        let before = clock.tick(t0 + secs(10)).expect("tick").elapsed_s;
        clock.pause();
        clock.pause();
        let during = clock.tick(t0 + secs(100)).expect("tick").elapsed_s;
        assert_eq!(before, during);
        // resuming does not credit the paused interval
        clock.play().expect("play");
        let after = clock.tick(t0 + secs(110)).expect("tick").elapsed_s;
        assert_eq!(after, before + 600.0);
    }

    #[test]
    fn clamps_and_pauses_at_window_end() {
        let mut clock = VirtualClock::new(series(), 3600.0).expect("valid clock");
        let t0 = Instant::now();
        clock.play().expect("play");
        clock.tick(t0).expect("tick");
        let r = clock.tick(t0 + secs(10)).expect("tick");
        let (_, end) = clock.series().map(WeatherSeries::window).expect("armed");
        assert_eq!(r.timestamp, end);
        assert!(r.end_reached);
        assert_eq!(r.mode, ClockMode::Paused);
        assert_eq!(r.ghi, 600.0);
        // further ticks stay put
        let again = clock.tick(t0 + secs(20)).expect("tick");
        assert_eq!(again.timestamp, end);
    }

    #[test]
    fn stop_drops_series() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        clock.stop();
        assert_eq!(clock.mode(), ClockMode::Stopped);
        assert!(matches!(
            clock.tick(Instant::now()),
            Err(SimError::NoWeatherLoaded)
        ));
        assert!(matches!(clock.play(), Err(SimError::NoWeatherLoaded)));
        clock.pause();
        assert_eq!(clock.mode(), ClockMode::Stopped);
    }

    #[test]
    fn rearm_after_stop_restarts_at_window_start() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        let t0 = Instant::now();
        clock.play().expect("play");
        clock.tick(t0).expect("tick");
        clock.tick(t0 + secs(60)).expect("tick");
        clock.stop();
        clock.rearm(series());
        assert_eq!(clock.mode(), ClockMode::Paused);
        let r = clock.tick(t0 + secs(120)).expect("tick");
        assert_eq!(r.elapsed_s, 0.0);
        assert!(!r.end_reached);
    }

    #[test]
    fn set_speed_validates() {
        let mut clock = VirtualClock::new(series(), 60.0).expect("valid clock");
        assert!(clock.set_speed(0.0).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
        assert!(clock.set_speed(4096.0).is_ok());
        assert_eq!(clock.speed(), 4096.0);
        assert!(VirtualClock::new(series(), -1.0).is_err());
    }

    #[test]
    fn slider_is_power_of_two() {
        assert_eq!(VirtualClock::speed_from_slider(0).ok(), Some(1.0));
        assert_eq!(VirtualClock::speed_from_slider(12).ok(), Some(4096.0));
        assert_eq!(VirtualClock::speed_from_slider(15).ok(), Some(32768.0));
        assert!(VirtualClock::speed_from_slider(16).is_err());
    }

    #[test]
    fn intensity_scale() {
        assert_eq!(intensity(0.0), 0);
        assert_eq!(intensity(500.0), 128);
        assert_eq!(intensity(1000.0), 255);
        assert_eq!(intensity(1200.0), 255);
        assert_eq!(intensity(-5.0), 0);
    }
}
