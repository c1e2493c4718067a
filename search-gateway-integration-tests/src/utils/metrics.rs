//! Tools to help testing metrics

use cadence::{SpyMetricSink, StatsdClient};
use crossbeam_channel::Receiver;

/// Helper to collect metrics during tests, and make assertions about them.
///
/// Metrics are kept as the statsd lines the client produced, such as
/// `search.request:1|c|#endpoint:news,outcome:success`.
pub struct MetricsWatcher {
    /// Crossbeam channel that receives metrics lines as bytes.
    rx: Receiver<Vec<u8>>,

    /// Metrics received by the watcher from [`rx`](Self::rx).
    lines: Vec<String>,
}

impl MetricsWatcher {
    /// Make a new metrics watcher, attach it to a [`StatsdClient`] and return both.
    pub fn new_with_client() -> (Self, StatsdClient) {
        let (rx, spy_sink) = SpyMetricSink::new();
        let metrics_client = StatsdClient::from_sink("", spy_sink);
        let metrics_watcher = Self { rx, lines: vec![] };

        (metrics_watcher, metrics_client)
    }

    /// Consume any waiting lines from `rx`.
    fn process_events(&mut self) {
        self.lines.extend(
            self.rx
                .try_iter()
                .map(|bytes| String::from_utf8(bytes).expect("Invalid UTF8 in metric message")),
        );
    }

    /// Get a list of all the metrics seen by this watcher, primarily for debugging.
    pub fn all_lines(&mut self) -> &[String] {
        self.process_events();
        self.lines.as_slice()
    }

    /// Test if any metric line this watcher received matches `predicate`.
    ///
    /// # Example
    ///
    /// ```
    /// # use search_gateway_integration_tests::MetricsWatcher;
    /// # use cadence::CountedExt;
    /// # let (mut metrics_watcher, metrics_client) = MetricsWatcher::new_with_client();
    /// metrics_client.incr("a-metric").unwrap();
    ///
    /// assert!(metrics_watcher.has(|line| line.starts_with("a-metric:1|c")));
    /// ```
    pub fn has<F>(&mut self, predicate: F) -> bool
    where
        F: FnMut(&String) -> bool,
    {
        self.all_lines().iter().any(predicate)
    }

    /// Test if a counter named `name` was incremented by one with all of
    /// the given `tags`.
    pub fn has_incr(&mut self, name: &str, tags: &[(&str, &str)]) -> bool {
        let prefix = format!("{}:1|c", name);
        self.has(|line| {
            line.starts_with(&prefix)
                && tags
                    .iter()
                    .all(|(key, value)| has_tag(line, key, value))
        })
    }
}

/// Whether the DogStatsD style tag section of `line` contains `key:value`.
fn has_tag(line: &str, key: &str, value: &str) -> bool {
    let expected = format!("{}:{}", key, value);
    line.split('|')
        .filter_map(|section| section.strip_prefix('#'))
        .flat_map(|tags| tags.split(','))
        .any(|tag| tag == expected)
}
