// Config schema submodule: one file per service section

use crate::config_struct;
use crate::errors::RiskResult;

mod breadth;
mod correlation;
mod drift;
mod logging;
mod router;
mod tilt;
mod vol_of_vol;

pub use breadth::*;
pub use correlation::*;
pub use drift::*;
pub use logging::*;
pub use router::*;
pub use tilt::*;
pub use vol_of_vol::*;

/// Upper bound for every `*_minutes` window (one week)
pub const MAX_WINDOW_MINUTES: i64 = 10_080;

config_struct! {
    /// Root configuration structure containing all sections
    pub struct Config {
        correlation: CorrelationConfig = CorrelationConfig::default(),
        vol_of_vol: VolOfVolConfig = VolOfVolConfig::default(),
        breadth: BreadthConfig = BreadthConfig::default(),
        drift: DriftConfig = DriftConfig::default(),
        router: RouterConfig = RouterConfig::default(),
        tilt: TiltConfig = TiltConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}

impl Config {
    /// Validate every section, stopping at the first invalid one
    pub fn validate(&self) -> RiskResult<()> {
        self.correlation.validate()?;
        self.vol_of_vol.validate()?;
        self.breadth.validate()?;
        self.drift.validate()?;
        self.router.validate()?;
        self.tilt.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_window_minutes_are_bounded_in_every_section() {
        let too_long = MAX_WINDOW_MINUTES + 1;

        let correlation = CorrelationConfig {
            correlation_window_minutes: too_long,
            ..CorrelationConfig::default()
        };
        let err = correlation.validate().unwrap_err();
        assert!(err.to_string().contains("correlation.correlation_window_minutes"));

        let vol_of_vol = VolOfVolConfig {
            window_minutes: too_long,
            ..VolOfVolConfig::default()
        };
        let err = vol_of_vol.validate().unwrap_err();
        assert!(err.to_string().contains("vol_of_vol.window_minutes"));

        let drift = DriftConfig {
            rolling_window_minutes: too_long,
            ..DriftConfig::default()
        };
        let err = drift.validate().unwrap_err();
        assert!(err.to_string().contains("drift.rolling_window_minutes"));

        let breadth = BreadthConfig {
            max_metric_age_minutes: too_long,
            ..BreadthConfig::default()
        };
        let err = breadth.validate().unwrap_err();
        assert!(err.to_string().contains("breadth.max_metric_age_minutes"));

        let week = CorrelationConfig {
            correlation_window_minutes: MAX_WINDOW_MINUTES,
            ..CorrelationConfig::default()
        };
        assert!(week.validate().is_ok());
    }
}
