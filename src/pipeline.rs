/// Wiring of the risk services, drift monitor and decision router
use crate::clock::Clock;
use crate::config::Config;
use crate::drift::FeatureDriftMonitor;
use crate::errors::RiskResult;
use crate::logger::{self, LogTag};
use crate::risk::{
    BreadthReallocationService, CorrelationCapService, RiskTiltEngine, VolOfVolGuardService,
};
use crate::router::{DecisionSource, SourceTier, UnifiedDecisionRouter};
use std::sync::Arc;

pub struct RiskPipeline {
    pub correlation: Arc<CorrelationCapService>,
    pub vol_of_vol: Arc<VolOfVolGuardService>,
    pub breadth: Arc<BreadthReallocationService>,
    pub drift: Arc<FeatureDriftMonitor>,
    pub tilt: RiskTiltEngine,
    pub router: UnifiedDecisionRouter,
}

impl RiskPipeline {
    /// Construct every service; any invalid section refuses to start
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        sources: Vec<(SourceTier, Arc<dyn DecisionSource>)>,
    ) -> RiskResult<Self> {
        let correlation = Arc::new(CorrelationCapService::new(
            config.correlation.clone(),
            clock.clone(),
        )?);
        let vol_of_vol = Arc::new(VolOfVolGuardService::new(
            config.vol_of_vol.clone(),
            clock.clone(),
        )?);
        let breadth = Arc::new(BreadthReallocationService::new(
            config.breadth.clone(),
            clock.clone(),
        )?);
        let drift = Arc::new(FeatureDriftMonitor::new(config.drift.clone(), clock.clone())?);
        let tilt = RiskTiltEngine::new(
            config.tilt.clone(),
            correlation.clone(),
            vol_of_vol.clone(),
            breadth.clone(),
            drift.clone(),
        )?;

        let router = sources
            .into_iter()
            .fold(
                UnifiedDecisionRouter::builder(config.router.clone(), clock),
                |builder, (tier, source)| builder.source(tier, source),
            )
            .build()?;

        logger::info(LogTag::System, "Risk pipeline assembled");
        Ok(Self {
            correlation,
            vol_of_vol,
            breadth,
            drift,
            tilt,
            router,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::router::ThresholdSource;

    #[test]
    fn test_pipeline_builds_from_defaults() {
        let source: Arc<dyn DecisionSource> =
            Arc::new(ThresholdSource::new("momentum", "momentum", 0.5, -0.5, 1, 0.6).unwrap());
        let pipeline = RiskPipeline::from_config(
            &Config::default(),
            system_clock(),
            vec![(SourceTier::StrategyFusion, source)],
        )
        .unwrap();
        assert!(pipeline.router.has_source(SourceTier::StrategyFusion));
        assert!(!pipeline.router.has_source(SourceTier::UnifiedBrain));
    }

    #[test]
    fn test_invalid_section_refuses_to_start() {
        let mut config = Config::default();
        config.breadth.momentum_weight = 0.9;
        let err = RiskPipeline::from_config(&config, system_clock(), Vec::new())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
