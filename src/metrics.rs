//! Prometheus counters for the streaming pipeline

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::events::EventType;

/// Pipeline counters registered in their own registry
#[derive(Clone)]
pub struct StreamMetrics {
    registry: Registry,
    frames_received: IntCounter,
    events_decoded: IntCounterVec,
    records_skipped: IntCounter,
    decode_errors: IntCounter,
    unknown_events: IntCounter,
    bars_finalized: IntCounterVec,
}

impl StreamMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("dxfeed".to_string()), None)?;

        let frames_received =
            IntCounter::with_opts(Opts::new("frames_received_total", "Data frames received"))?;
        let events_decoded = IntCounterVec::new(
            Opts::new("events_decoded_total", "Events decoded by type"),
            &["event_type"],
        )?;
        let records_skipped = IntCounter::with_opts(Opts::new(
            "records_skipped_total",
            "Records dropped for values not matching their field",
        ))?;
        let decode_errors =
            IntCounter::with_opts(Opts::new("decode_errors_total", "Frames that failed to decode"))?;
        let unknown_events = IntCounter::with_opts(Opts::new(
            "unknown_events_total",
            "Frames naming an event type outside the schema table",
        ))?;
        let bars_finalized = IntCounterVec::new(
            Opts::new("bars_finalized_total", "OHLCV bars finalized by timeframe"),
            &["timeframe"],
        )?;

        registry.register(Box::new(frames_received.clone()))?;
        registry.register(Box::new(events_decoded.clone()))?;
        registry.register(Box::new(records_skipped.clone()))?;
        registry.register(Box::new(decode_errors.clone()))?;
        registry.register(Box::new(unknown_events.clone()))?;
        registry.register(Box::new(bars_finalized.clone()))?;

        Ok(Self {
            registry,
            frames_received,
            events_decoded,
            records_skipped,
            decode_errors,
            unknown_events,
            bars_finalized,
        })
    }

    pub fn record_frame(&self, event_type: EventType, decoded: usize, skipped: usize) {
        self.frames_received.inc();
        self.events_decoded
            .with_label_values(&[event_type.as_str()])
            .inc_by(decoded as u64);
        self.records_skipped.inc_by(skipped as u64);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.inc();
    }

    pub fn record_unknown_event(&self) {
        self.unknown_events.inc();
    }

    pub fn record_bar(&self, timeframe: &str) {
        self.bars_finalized.with_label_values(&[timeframe]).inc();
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.get()
    }

    pub fn events_decoded(&self, event_type: EventType) -> u64 {
        self.events_decoded
            .with_label_values(&[event_type.as_str()])
            .get()
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.get()
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.get()
    }

    pub fn bars_finalized(&self, timeframe: &str) -> u64 {
        self.bars_finalized.with_label_values(&[timeframe]).get()
    }

    /// Text exposition format for a `/metrics` endpoint
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::StreamerError::MetricsError(e.to_string()))
    }
}

impl std::fmt::Debug for StreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMetrics")
            .field("frames_received", &self.frames_received.get())
            .field("records_skipped", &self.records_skipped.get())
            .field("decode_errors", &self.decode_errors.get())
            .finish()
    }
}
