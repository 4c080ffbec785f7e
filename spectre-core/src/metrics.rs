//! In-process metrics recorder for tests and local inspection, grounded on
//! `sk-core::metrics::MemoryRecorder`. Not wired as the global recorder in
//! production — the out-of-scope Prometheus sync collaborator owns that; this
//! exists so a test can install it and assert on counters emitted through the
//! ordinary `metrics::counter!`/`histogram!` macros.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::anyhow;
use metrics::{set_global_recorder, Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util::registry::{AtomicStorage, Registry};

#[derive(Clone)]
pub struct MemoryRecorder {
    registry: Arc<Registry<Key, AtomicStorage>>,
}

impl MemoryRecorder {
    pub fn new() -> anyhow::Result<Self> {
        let recorder = MemoryRecorder { registry: Arc::new(Registry::atomic()) };
        set_global_recorder(recorder.clone())?;
        Ok(recorder)
    }

    pub fn get_counter(&self, key: &Key) -> anyhow::Result<u64> {
        self.registry.get_counter(key).map(|v| v.load(Ordering::Relaxed)).ok_or_else(|| anyhow!("no counter with key {key}"))
    }

    pub fn get_gauge(&self, key: &Key) -> anyhow::Result<f64> {
        self.registry.get_gauge(key).map(|v| f64::from_bits(v.load(Ordering::Relaxed))).ok_or_else(|| anyhow!("no gauge with key {key}"))
    }
}

impl Recorder for MemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |c| Counter::from_arc(c.clone()))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |g| Gauge::from_arc(g.clone()))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |h| Histogram::from_arc(h.clone()))
    }
}

#[cfg(test)]
mod tests {
    use metrics::counter;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_records_counter_increment() {
        let recorder = MemoryRecorder::new().unwrap();
        counter!("spectre_core_test_counter").increment(3);
        assert_eq!(recorder.get_counter(&Key::from_name("spectre_core_test_counter")).unwrap(), 3);
    }
}
