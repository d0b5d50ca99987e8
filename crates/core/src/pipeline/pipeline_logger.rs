use std::collections::HashMap;
use std::time::Instant;

use crate::pipeline::domain::frame_sink::StatusTag;

/// Cross-cutting logger for pipeline events.
///
/// Lets callers observe per-frame outcomes and stage timings without the
/// processing loop knowing where they end up.
pub trait PipelineLogger: Send {
    /// Record the outcome of one frame taken from the buffer.
    fn frame(&mut self, tag: StatusTag);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. face count, dropped frames).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame(&mut self, _tag: StatusTag) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Running aggregate of one stage timing or metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl Aggregate {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            total: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        self.total / self.count.max(1) as f64
    }
}

/// Accumulates tag counts, stage timings and metrics, and reports them
/// through `log` when the run ends. Memory stays constant however long the
/// session runs.
pub struct SummaryPipelineLogger {
    tags: HashMap<StatusTag, u64>,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    total_frames: u64,
}

impl SummaryPipelineLogger {
    pub fn new() -> Self {
        Self {
            tags: HashMap::new(),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            total_frames: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.total_frames == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.total_frames;
        let mut lines = vec![format!(
            "Session summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut tags: Vec<_> = self.tags.iter().collect();
        tags.sort_by_key(|(tag, _)| tag.as_str());
        for (tag, count) in tags {
            lines.push(format!("  {:16}: {count}", tag.as_str()));
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let timing = &self.timings[stage];
            lines.push(format!(
                "  {stage:16}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                timing.mean(),
                timing.max,
                timing.total
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let metric = &self.metrics[name];
            lines.push(format!(
                "  {name}: avg {:.1} (min {}, max {})",
                metric.mean(),
                metric.min,
                metric.max
            ));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn count_for(&self, tag: StatusTag) -> u64 {
        self.tags.get(&tag).copied().unwrap_or(0)
    }

    pub fn timings_for(&self, stage: &str) -> Option<Aggregate> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<Aggregate> {
        self.metrics.get(name).copied()
    }
}

impl Default for SummaryPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for SummaryPipelineLogger {
    fn frame(&mut self, tag: StatusTag) {
        self.total_frames += 1;
        *self.tags.entry(tag).or_default() += 1;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn record(aggregates: &mut HashMap<String, Aggregate>, key: &str, value: f64) {
    match aggregates.get_mut(key) {
        Some(aggregate) => aggregate.add(value),
        None => {
            aggregates.insert(key.to_string(), Aggregate::first(value));
        }
    }
}
