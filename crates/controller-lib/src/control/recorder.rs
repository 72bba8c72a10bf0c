//! Periodic utilization sampling

use tracing::debug;

use super::ControlLoop;
use crate::health::components;
use crate::models::UtilizationSample;
use crate::state::ClusterState;

pub struct UtilizationRecorder {
    state: ClusterState,
}

impl UtilizationRecorder {
    pub fn new(state: ClusterState) -> Self {
        Self { state }
    }

    /// Append one sample to the bounded history and the durable sink
    pub fn sample(&self) -> UtilizationSample {
        let sample = self
            .state
            .write(|registry, now| registry.record_utilization(now));
        self.state.publish_shape();
        debug!(utilization = sample.utilization, "Utilization sampled");
        sample
    }
}

impl ControlLoop for UtilizationRecorder {
    fn name(&self) -> &'static str {
        components::UTILIZATION_RECORDER
    }

    fn tick(&mut self) {
        self.sample();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeSpec, PodSpec};
    use crate::scheduler::SchedulingPolicy;
    use crate::sink::{self, SinkRecord};
    use crate::state::ClusterDefaults;

    #[test]
    fn test_samples_are_bounded_and_forwarded() {
        let state = ClusterState::new(ClusterDefaults::default());
        let (tx, mut rx) = sink::channel();
        state.attach_sink(tx);
        state.add_node(NodeSpec::new(8, 16).unwrap());
        state
            .launch_pod(PodSpec::new(2, 2).unwrap(), SchedulingPolicy::FirstFit)
            .unwrap();

        let recorder = UtilizationRecorder::new(state.clone());
        for _ in 0..60 {
            let sample = recorder.sample();
            assert!((sample.utilization - 0.25).abs() < f64::EPSILON);
        }
        assert_eq!(state.utilization_history().len(), 50);

        let mut forwarded = 0;
        while let Ok(record) = rx.try_recv() {
            if matches!(record, SinkRecord::Utilization(_)) {
                forwarded += 1;
            }
        }
        assert_eq!(forwarded, 60);
    }
}
