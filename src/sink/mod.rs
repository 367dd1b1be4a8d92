//! Time-series output.
//!
//! Collectors push [`DataPoint`]s into a channel; a [`SinkWorker`] drains
//! it and hands batches to a [`PointWriter`].

mod influx;
pub mod line_protocol;
mod log;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SinkError;

pub use influx::InfluxWriter;
pub use log::LogWriter;

/// Maximum number of points written in one request.
pub const MAX_BATCH: usize = 500;

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Floating point number
    Float(f64),
    /// Exact decimal, written as a float
    Decimal(Decimal),
    /// Signed integer
    Integer(i64),
    /// Boolean
    Bool(bool),
    /// String
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        FieldValue::Decimal(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One measurement sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Measurement name
    pub measurement: String,
    /// Indexed tags
    pub tags: BTreeMap<String, String>,
    /// Field values
    pub fields: BTreeMap<String, FieldValue>,
    /// Sample time
    pub timestamp: DateTime<Utc>,
}

impl DataPoint {
    /// Create a point stamped with the current time.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Destination for data points.
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Write a batch of points.
    async fn write(&self, points: &[DataPoint]) -> Result<(), SinkError>;
}

/// Sending half handed to collectors.
pub type PointSender = mpsc::Sender<DataPoint>;

/// Drains the point channel into a writer.
pub struct SinkWorker {
    rx: mpsc::Receiver<DataPoint>,
    writer: Arc<dyn PointWriter>,
}

impl SinkWorker {
    /// Create a channel of `capacity` points and the worker that drains it.
    pub fn channel(capacity: usize, writer: Arc<dyn PointWriter>) -> (PointSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx, writer })
    }

    /// Write points until every sender is gone or `shutdown` fires.
    ///
    /// A failed write is logged and dropped. Points already queued when
    /// `shutdown` fires are still written.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("sink worker started");
        let mut written = 0usize;
        loop {
            let first = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                point = self.rx.recv() => match point {
                    Some(point) => point,
                    None => break,
                },
            };

            let mut batch = vec![first];
            while batch.len() < MAX_BATCH {
                match self.rx.try_recv() {
                    Ok(point) => batch.push(point),
                    Err(_) => break,
                }
            }
            written += self.flush(&batch).await;
        }

        self.rx.close();
        let mut rest = Vec::new();
        while let Ok(point) = self.rx.try_recv() {
            rest.push(point);
        }
        for chunk in rest.chunks(MAX_BATCH) {
            written += self.flush(chunk).await;
        }
        info!(written, "sink worker stopped");
    }

    async fn flush(&self, batch: &[DataPoint]) -> usize {
        match self.writer.write(batch).await {
            Ok(()) => {
                debug!(points = batch.len(), "points written");
                batch.len()
            }
            Err(err) => {
                warn!(points = batch.len(), error = %err, "dropping points after failed write");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        points: Mutex<Vec<DataPoint>>,
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl PointWriter for Recorder {
        async fn write(&self, points: &[DataPoint]) -> Result<(), SinkError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(SinkError::Rejected {
                    status: 500,
                    body: "down".into(),
                });
            }
            self.points.lock().await.extend_from_slice(points);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_drains_until_senders_drop() {
        let recorder = Arc::new(Recorder::default());
        let (tx, worker) = SinkWorker::channel(16, recorder.clone());
        let task = tokio::spawn(worker.run(CancellationToken::new()));

        for i in 0..5i64 {
            tx.send(DataPoint::new("m").field("v", i)).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(recorder.points.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_worker() {
        let recorder = Arc::new(Recorder {
            fail_first: true,
            ..Default::default()
        });
        let (tx, worker) = SinkWorker::channel(16, recorder.clone());
        let task = tokio::spawn(worker.run(CancellationToken::new()));

        tx.send(DataPoint::new("lost").field("v", 1i64)).await.unwrap();
        tokio::task::yield_now().await;
        while recorder.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tx.send(DataPoint::new("kept").field("v", 2i64)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let points = recorder.points.lock().await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement, "kept");
    }

    #[tokio::test]
    async fn test_queued_points_written_on_shutdown() {
        let recorder = Arc::new(Recorder::default());
        let (tx, worker) = SinkWorker::channel(16, recorder.clone());
        let shutdown = CancellationToken::new();

        for i in 0..3i64 {
            tx.send(DataPoint::new("m").field("v", i)).await.unwrap();
        }
        shutdown.cancel();
        worker.run(shutdown).await;

        assert_eq!(recorder.points.lock().await.len(), 3);
        assert!(tx.send(DataPoint::new("late").field("v", 0i64)).await.is_err());
    }
}
