use std::collections::HashMap;
use std::sync::RwLock;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

// metric kinds supported by a request-scoped sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Gauge,
    Counter,
}

enum Vector {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// A per-request collection of named, labeled series. Created empty by a
/// handler, written concurrently by fan-out tasks, rendered once, dropped.
/// Writes to gauges overwrite, writes to counters accumulate.
pub struct Sink {
    registry: Registry,
    const_labels: HashMap<String, String>,
    vectors: RwLock<HashMap<String, Vector>>,
}

impl Sink {
    pub fn new(const_labels: HashMap<String, String>) -> Self {
        Self {
            registry: Registry::new(),
            const_labels,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    // declaring twice, or failing to register, is a programming error
    pub fn declare(&self, name: &str, help: &str, kind: Kind, label_names: &[&str]) {
        let opts = Opts::new(name, help).const_labels(self.const_labels.clone());

        let vector = match kind {
            Kind::Gauge => {
                let vec = GaugeVec::new(opts, label_names).expect("Failed to create gauge");
                self.registry
                    .register(Box::new(vec.clone()))
                    .expect("Failed to register gauge");
                Vector::Gauge(vec)
            }
            Kind::Counter => {
                let vec = CounterVec::new(opts, label_names).expect("Failed to create counter");
                self.registry
                    .register(Box::new(vec.clone()))
                    .expect("Failed to register counter");
                Vector::Counter(vec)
            }
        };

        let previous = self
            .vectors
            .write()
            .expect("Sink lock poisoned")
            .insert(name.to_string(), vector);
        assert!(previous.is_none(), "metric {name} declared twice");
    }

    /// Write a gauge sample. Panics on an undeclared name or a label-value
    /// count that does not match the declaration.
    pub fn set(&self, name: &str, label_values: &[&str], value: f64) {
        let vectors = self.vectors.read().expect("Sink lock poisoned");
        match vectors.get(name) {
            Some(Vector::Gauge(vec)) => vec.with_label_values(label_values).set(value),
            Some(Vector::Counter(_)) => panic!("metric {name} is a counter, use add"),
            None => panic!("metric {name} was not declared"),
        }
    }

    /// Accumulate into a counter sample. Same failure rules as `set`.
    pub fn add(&self, name: &str, label_values: &[&str], delta: f64) {
        let vectors = self.vectors.read().expect("Sink lock poisoned");
        match vectors.get(name) {
            Some(Vector::Counter(vec)) => vec.with_label_values(label_values).inc_by(delta),
            Some(Vector::Gauge(_)) => panic!("metric {name} is a gauge, use set"),
            None => panic!("metric {name} was not declared"),
        }
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Failed to convert metrics to string")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sink() -> Sink {
        Sink::new(HashMap::from([("chain_id".to_string(), "test-1".to_string())]))
    }

    #[test]
    fn gauge_writes_overwrite() {
        let s = sink();
        s.declare("test_tokens", "tokens", Kind::Gauge, &["address"]);
        s.set("test_tokens", &["val1"], 10.0);
        s.set("test_tokens", &["val1"], 25.0);

        let body = s.render();
        assert!(body.contains("test_tokens{address=\"val1\",chain_id=\"test-1\"} 25"));
        assert!(!body.contains(" 10"));
    }

    #[test]
    fn counter_writes_accumulate() {
        let s = sink();
        s.declare("test_misses", "misses", Kind::Counter, &["type"]);
        s.add("test_misses", &["miss"], 3.0);
        s.add("test_misses", &["miss"], 4.0);

        assert!(s.render().contains("test_misses{chain_id=\"test-1\",type=\"miss\"} 7"));
    }

    #[test]
    fn scalar_metric_takes_no_labels() {
        let s = sink();
        s.declare("test_height", "height", Kind::Gauge, &[]);
        s.set("test_height", &[], 12345.0);

        assert!(s.render().contains("test_height{chain_id=\"test-1\"} 12345"));
    }

    #[test]
    fn render_is_idempotent() {
        let s = sink();
        s.declare("test_rank", "rank", Kind::Gauge, &["address"]);
        s.set("test_rank", &["a"], 1.0);
        s.set("test_rank", &["b"], 2.0);

        let mut first: Vec<&str> = Vec::new();
        let one = s.render();
        first.extend(one.lines().filter(|l| !l.starts_with('#')));
        first.sort_unstable();

        let two = s.render();
        let mut second: Vec<&str> = two.lines().filter(|l| !l.starts_with('#')).collect();
        second.sort_unstable();

        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_writers_all_land() {
        let s = Arc::new(sink());
        s.declare("test_shares", "shares", Kind::Gauge, &["address"]);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let s = s.clone();
                std::thread::spawn(move || {
                    s.set("test_shares", &[&format!("val{i}")], i as f64);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let body = s.render();
        for i in 0..16 {
            assert!(body.contains(&format!("address=\"val{i}\"")));
        }
    }

    #[test]
    #[should_panic(expected = "InconsistentCardinality")]
    fn wrong_label_arity_fails_loudly() {
        let s = sink();
        s.declare("test_pair", "pair", Kind::Gauge, &["address", "moniker"]);
        s.set("test_pair", &["only-one"], 1.0);
    }

    #[test]
    #[should_panic(expected = "was not declared")]
    fn undeclared_metric_fails_loudly() {
        let s = sink();
        s.set("test_missing", &[], 1.0);
    }
}
