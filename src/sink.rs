//! Publication to observers.
//!
//! Binary and numeric sensors, text sensors, and display labels are owned
//! by the surrounding firmware. This crate only pushes values into them
//! through the traits below.
//!
//! Numeric readings are `f32`, matching sensor conventions; an unknown
//! reading is `NaN`.

use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives boolean state changes.
pub trait BinarySink: Send {
    /// Push a new state.
    fn publish(&mut self, state: bool);
}

/// Receives numeric readings.
pub trait NumericSink: Send {
    /// Push a new reading (`NaN` when unknown).
    fn publish(&mut self, value: f32);
}

/// Receives text.
pub trait TextSink: Send {
    /// Push new text.
    fn publish(&mut self, text: &str);
}

impl<F: FnMut(bool) + Send> BinarySink for F {
    fn publish(&mut self, state: bool) {
        self(state)
    }
}

impl<F: FnMut(f32) + Send> NumericSink for F {
    fn publish(&mut self, value: f32) {
        self(value)
    }
}

impl<F: FnMut(&str) + Send> TextSink for F {
    fn publish(&mut self, text: &str) {
        self(text)
    }
}

/// A binary sink that is only told about changes.
pub struct BinaryOutput {
    sink: Box<dyn BinarySink>,
    last: Option<bool>,
}

impl BinaryOutput {
    /// Wrap a sink. Nothing has been published yet.
    pub fn new(sink: impl BinarySink + 'static) -> Self {
        Self::boxed(Box::new(sink))
    }

    /// Wrap an already boxed sink.
    pub fn boxed(sink: Box<dyn BinarySink>) -> Self {
        Self { sink, last: None }
    }

    /// Publish `state` unless it equals the last published state.
    ///
    /// Returns true if the sink was called.
    pub fn publish(&mut self, state: bool) -> bool {
        if self.last == Some(state) {
            return false;
        }
        self.last = Some(state);
        self.sink.publish(state);
        true
    }

    /// Last published state.
    pub fn last(&self) -> Option<bool> {
        self.last
    }
}

impl std::fmt::Debug for BinaryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryOutput")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

/// A numeric sink that is only told about changes.
pub struct NumericOutput {
    sink: Box<dyn NumericSink>,
    last: Option<f32>,
}

impl NumericOutput {
    /// Wrap a sink. Nothing has been published yet.
    pub fn new(sink: impl NumericSink + 'static) -> Self {
        Self::boxed(Box::new(sink))
    }

    /// Wrap an already boxed sink.
    pub fn boxed(sink: Box<dyn NumericSink>) -> Self {
        Self { sink, last: None }
    }

    /// Publish `value` unless it equals the last published value.
    ///
    /// Two `NaN` readings count as equal. Returns true if the sink was called.
    pub fn publish(&mut self, value: f32) -> bool {
        if let Some(last) = self.last {
            if last == value || (last.is_nan() && value.is_nan()) {
                return false;
            }
        }
        self.last = Some(value);
        self.sink.publish(value);
        true
    }

    /// Last published value.
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}

impl std::fmt::Debug for NumericOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericOutput")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

/// In-memory sink that records every published value.
///
/// Clones share the same record, so a test can keep one clone and hand the
/// other to the component under test.
#[derive(Debug)]
pub struct Recorder<V> {
    values: Arc<Mutex<Vec<V>>>,
}

impl<V> Recorder<V> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<V>> {
        // A poisoned record is still a valid record.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, value: V) {
        self.lock().push(value);
    }

    /// Number of values published so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was published.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<V: Clone> Recorder<V> {
    /// All values published so far, oldest first.
    pub fn values(&self) -> Vec<V> {
        self.lock().clone()
    }

    /// Most recently published value.
    pub fn last(&self) -> Option<V> {
        self.lock().last().cloned()
    }
}

impl<V> Clone for Recorder<V> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<V> Default for Recorder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl BinarySink for Recorder<bool> {
    fn publish(&mut self, state: bool) {
        self.push(state);
    }
}

impl NumericSink for Recorder<f32> {
    fn publish(&mut self, value: f32) {
        self.push(value);
    }
}

impl TextSink for Recorder<String> {
    fn publish(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Sink that logs each value under a name.
#[derive(Debug, Clone)]
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a sink logging as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name values are logged under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BinarySink for LogSink {
    fn publish(&mut self, state: bool) {
        info!("[{}] {}", self.name, if state { "ON" } else { "OFF" });
    }
}

impl NumericSink for LogSink {
    fn publish(&mut self, value: f32) {
        if value.is_nan() {
            info!("[{}] unknown", self.name);
        } else {
            info!("[{}] {}", self.name, value);
        }
    }
}

impl TextSink for LogSink {
    fn publish(&mut self, text: &str) {
        info!("[{}] {}", self.name, text);
    }
}

/// Creates sinks for outputs declared in configuration.
pub trait SinkFactory {
    /// Sink for a boolean output.
    fn binary(&mut self, name: &str) -> Box<dyn BinarySink>;
    /// Sink for a numeric output.
    fn numeric(&mut self, name: &str) -> Box<dyn NumericSink>;
    /// Sink for a text output.
    fn text(&mut self, name: &str) -> Box<dyn TextSink>;
}

/// Builds a [`LogSink`] for every output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSinkFactory;

impl SinkFactory for LogSinkFactory {
    fn binary(&mut self, name: &str) -> Box<dyn BinarySink> {
        Box::new(LogSink::new(name))
    }

    fn numeric(&mut self, name: &str) -> Box<dyn NumericSink> {
        Box::new(LogSink::new(name))
    }

    fn text(&mut self, name: &str) -> Box<dyn TextSink> {
        Box::new(LogSink::new(name))
    }
}
