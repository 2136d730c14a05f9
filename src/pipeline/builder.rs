//! Standard pipeline assembled from configuration.
//!
//! ```text
//! range_filter ─▶ normalize ─▶ anomaly_detector ─▶ trend_analyzer ─▶ aggregation
//! ```
//!
//! Aggregation turns each observation into a window snapshot, so it closes
//! the chain. `normalize` is skipped when disabled.

use tracing::info;

use super::Pipeline;
use crate::config::PipelineConfig;
use crate::stages::{
    AggregationProcessor, AnomalyDetector, FilterProcessor, TransformProcessor, TrendAnalyzer,
};

/// Build the standard chain. The returned pipeline is not started.
pub fn build_pipeline(config: &PipelineConfig) -> Pipeline {
    let mut pipeline = Pipeline::new(config.pipeline.name.clone());

    pipeline.add_stage(FilterProcessor::range(
        config.filter.min_value,
        config.filter.max_value,
    ));

    if config.normalize.enabled {
        pipeline.add_stage(TransformProcessor::normalize(config.normalize.scale));
    }

    pipeline
        .add_stage(AnomalyDetector::with_config(&config.anomaly))
        .add_stage(TrendAnalyzer::with_config(&config.trend))
        .add_stage(AggregationProcessor::new(config.aggregation.window_size));

    info!(
        pipeline = %pipeline.name(),
        stages = ?pipeline.stage_names(),
        "[Pipeline] Built from config"
    );
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Observation, PipelineItem};

    #[test]
    fn test_default_stage_order() {
        let pipeline = build_pipeline(&PipelineConfig::default());
        assert_eq!(
            pipeline.stage_names(),
            vec!["range_filter", "normalize", "anomaly_detector", "trend_analyzer", "aggregation"]
        );
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_normalize_can_be_disabled() {
        let mut config = PipelineConfig::default();
        config.normalize.enabled = false;
        let pipeline = build_pipeline(&config);
        assert_eq!(pipeline.len(), 4);
        assert!(!pipeline.stage_names().contains(&"normalize"));
    }

    #[tokio::test]
    async fn test_built_pipeline_ends_in_aggregate() {
        let mut config = PipelineConfig::default();
        config.filter.max_value = Some(100.0);
        let mut pipeline = build_pipeline(&config);
        pipeline.start();

        let out = pipeline.push(Observation::new(10.0)).await.unwrap();
        match out {
            Some(PipelineItem::Aggregate(agg)) => {
                assert_eq!(agg.count, 1);
                assert_eq!(agg.mean, 10.0);
            }
            other => panic!("expected aggregate, got {other:?}"),
        }

        assert!(pipeline.push(Observation::new(150.0)).await.unwrap().is_none());
        assert_eq!(pipeline.stats()[0].filtered, Some(1));
    }
}
