//! NDJSON location feed.
//!
//! One JSON object per line: `{"latitude": .., "longitude": .., "timestamp": ..}`.
//! `timestamp` (RFC 3339) and `accuracy_meters` are optional; a missing
//! timestamp is stamped with the time the line was read. Blank lines are
//! ignored. Malformed lines and out-of-range coordinates are logged and
//! skipped.

use std::io;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};

use autoflow_domain::geofence::LocationSample;
use autoflow_domain::time::{Timestamp, now};

use crate::config::FeedSource;

#[derive(Debug, Deserialize)]
struct FeedRecord {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timestamp: Option<Timestamp>,
    #[serde(default)]
    accuracy_meters: Option<f64>,
}

impl From<FeedRecord> for LocationSample {
    fn from(record: FeedRecord) -> Self {
        let mut sample = LocationSample::new(
            record.latitude,
            record.longitude,
            record.timestamp.unwrap_or_else(now),
        );
        sample.accuracy_meters = record.accuracy_meters;
        sample
    }
}

/// Open the configured feed for line-by-line reading.
///
/// # Errors
///
/// Returns the I/O error when the feed file cannot be opened.
pub async fn open(source: &FeedSource) -> io::Result<Box<dyn AsyncBufRead + Send + Unpin>> {
    Ok(match source {
        FeedSource::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
        FeedSource::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
    })
}

/// Decode `reader` into a stream of samples; read errors are passed through.
pub fn samples<R>(reader: R) -> impl Stream<Item = io::Result<LocationSample>>
where
    R: AsyncBufRead + Unpin,
{
    LinesStream::new(reader.lines()).filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => match serde_json::from_str::<FeedRecord>(&line) {
            Ok(record) => {
                let sample = LocationSample::from(record);
                if let Err(err) = sample.coordinates.validate() {
                    tracing::warn!(%err, %line, "skipping location sample out of range");
                    return None;
                }
                Some(Ok(sample))
            }
            Err(err) => {
                tracing::warn!(%err, %line, "skipping malformed location sample");
                None
            }
        },
        Err(err) => Some(Err(err)),
    })
}
