//! Writer that only logs points.

use async_trait::async_trait;
use tracing::info;

use super::{DataPoint, PointWriter};
use crate::error::SinkError;

/// Logs every point at `info` level; used when no store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl PointWriter for LogWriter {
    async fn write(&self, points: &[DataPoint]) -> Result<(), SinkError> {
        for point in points {
            info!(
                measurement = %point.measurement,
                tags = ?point.tags,
                fields = ?point.fields,
                "data point"
            );
        }
        Ok(())
    }
}
