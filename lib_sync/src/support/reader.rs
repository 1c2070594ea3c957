//! # Marker-Driven Pagination
//!
//! The portal chains pages with an opaque integer marker: every answer
//! carries the marker to send with the next request, and `-1` means there
//! is nothing more to read. `fetch_all` follows that chain to the end and
//! hands back every record in arrival order, together with the marker that
//! requested the last page so a later cycle can resume from that boundary.
//!
//! Nothing is returned until the chain is complete; a transport or decode
//! failure on any page discards everything read so far. `null` entries in a
//! page's `data` are skipped.

use std::collections::HashSet;

use serde::de::DeserializeOwned;

use crate::errors::SyncError;
use crate::support::client::{PageRequest, Resource, SourceApi};

/// Position in a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// No marker: read from the first page.
    Start,
    /// Continue from this server-issued marker.
    At(i64),
    /// The server reported end-of-stream.
    End,
}

impl Marker {
    pub const END_OF_STREAM: i64 = -1;

    /// Interprets a marker as sent by the portal (or as persisted).
    pub fn from_wire(value: i64) -> Self {
        match value {
            Self::END_OF_STREAM => Marker::End,
            0 => Marker::Start,
            n => Marker::At(n),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Marker::Start => 0,
            Marker::At(n) => n,
            Marker::End => Self::END_OF_STREAM,
        }
    }

    /// The value to put in the `marker` query parameter, if any.
    pub fn query_value(self) -> Option<i64> {
        match self {
            Marker::At(n) => Some(n),
            _ => None,
        }
    }
}

/// Chooses the page size from how many source calls this process has made.
///
/// The first call after startup asks for a small page to keep a cold start
/// cheap; every later call asks for the large one.
#[derive(Debug, Clone)]
pub struct PageSizer {
    calls: u64,
    startup: u32,
    steady: u32,
}

impl PageSizer {
    pub fn new(startup: u32, steady: u32) -> Self {
        Self {
            calls: 0,
            startup: startup.max(1),
            steady: steady.max(1),
        }
    }

    pub fn current(&self) -> u32 {
        if self.calls == 0 {
            self.startup
        } else {
            self.steady
        }
    }

    /// Counts one completed source call.
    pub fn record_call(&mut self) {
        self.calls += 1;
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for PageSizer {
    fn default() -> Self {
        Self::new(5, 1000)
    }
}

/// All records of one complete pagination run.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    pub records: Vec<T>,
    /// Marker that requested the final page; the next cycle may resume here.
    pub resume_from: Marker,
    pub pages: u32,
}

/// Reads every page of `resource` starting at `start`.
///
/// A `start` of [`Marker::End`] is treated as [`Marker::Start`]. A page whose
/// marker points back at the first page, or at any marker already requested
/// in this run, is reported as a decode error.
pub async fn fetch_all<T>(
    source: &dyn SourceApi,
    resource: &Resource,
    start: Marker,
    sizer: &mut PageSizer,
) -> Result<FetchOutcome<T>, SyncError>
where
    T: DeserializeOwned,
{
    let mut marker = match start {
        Marker::End => Marker::Start,
        other => other,
    };
    let mut records = Vec::new();
    let mut pages = 0u32;
    let mut requested = HashSet::from([marker]);

    loop {
        let request = PageRequest {
            resource: resource.clone(),
            max: sizer.current(),
            marker,
        };
        let page = source.fetch_page(&request).await?;
        sizer.record_call();
        pages += 1;

        let next = Marker::from_wire(page.marker);
        for (index, item) in page.into_data().into_iter().enumerate() {
            if item.is_null() {
                log::warn!("Skipping null record {} of page {}", index, pages);
                continue;
            }
            let record = serde_json::from_value::<T>(item).map_err(|e| {
                SyncError::Decode(format!("record {} of page {}: {}", index, pages, e))
            })?;
            records.push(record);
        }
        log::debug!(
            "Fetched page {} ({:?}), {} records so far",
            pages,
            marker,
            records.len()
        );

        match next {
            Marker::End => {
                return Ok(FetchOutcome {
                    records,
                    resume_from: marker,
                    pages,
                })
            }
            Marker::Start => {
                return Err(SyncError::Decode(format!(
                    "pagination restarted at marker 0 after page {}",
                    pages
                )))
            }
            _ if !requested.insert(next) => {
                return Err(SyncError::Decode(format!(
                    "pagination marker {} did not advance",
                    next.to_wire()
                )))
            }
            _ => marker = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedSource;
    use serde_json::json;

    fn records_resource() -> Resource {
        Resource::MaintenanceRecords {
            region: "northern".into(),
        }
    }

    #[tokio::test]
    async fn test_follows_markers_until_end() {
        let source = ScriptedSource::new(vec![
            Ok((vec![json!(1), json!(2)], 7)),
            Ok((vec![json!(3)], 12)),
            Ok((vec![json!(4), json!(5)], -1)),
        ]);
        let mut sizer = PageSizer::new(5, 1000);

        let outcome: FetchOutcome<i64> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer)
                .await
                .unwrap();

        assert_eq!(outcome.records, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.resume_from, Marker::At(12));

        let seen = source.requests();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].marker, Marker::Start);
        assert_eq!(seen[1].marker, Marker::At(7));
        assert_eq!(seen[2].marker, Marker::At(12));
    }

    #[tokio::test]
    async fn test_page_size_small_only_for_first_call_of_process() {
        let source = ScriptedSource::new(vec![
            Ok((vec![], 7)),
            Ok((vec![], -1)),
            Ok((vec![], -1)),
        ]);
        let mut sizer = PageSizer::new(5, 1000);

        let _: FetchOutcome<i64> = fetch_all(&source, &records_resource(), Marker::Start, &mut sizer)
            .await
            .unwrap();
        let _: FetchOutcome<i64> = fetch_all(&source, &records_resource(), Marker::Start, &mut sizer)
            .await
            .unwrap();

        let sizes: Vec<u32> = source.requests().iter().map(|r| r.max).collect();
        assert_eq!(sizes, vec![5, 1000, 1000]);
        assert_eq!(sizer.calls(), 3);
    }

    #[tokio::test]
    async fn test_single_page_resumes_from_its_own_start() {
        let source = ScriptedSource::new(vec![Ok((vec![json!(9)], -1))]);
        let mut sizer = PageSizer::default();

        let outcome: FetchOutcome<i64> =
            fetch_all(&source, &records_resource(), Marker::At(40), &mut sizer)
                .await
                .unwrap();
        assert_eq!(outcome.resume_from, Marker::At(40));
        assert_eq!(source.requests()[0].marker, Marker::At(40));
    }

    #[tokio::test]
    async fn test_transport_failure_discards_partial_results() {
        let source = ScriptedSource::new(vec![
            Ok((vec![json!(1)], 7)),
            Err(SyncError::Transport("connection reset".into())),
        ]);
        let mut sizer = PageSizer::default();

        let result: Result<FetchOutcome<i64>, _> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer).await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }

    #[tokio::test]
    async fn test_undecodable_record_aborts_fetch() {
        let source = ScriptedSource::new(vec![Ok((vec![json!("not a number")], -1))]);
        let mut sizer = PageSizer::default();

        let result: Result<FetchOutcome<i64>, _> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer).await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
    }

    #[tokio::test]
    async fn test_stalled_marker_is_an_error() {
        let source = ScriptedSource::new(vec![Ok((vec![], 7)), Ok((vec![], 7))]);
        let mut sizer = PageSizer::default();

        let result: Result<FetchOutcome<i64>, _> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer).await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_marker_wire_mapping() {
        assert_eq!(Marker::from_wire(-1), Marker::End);
        assert_eq!(Marker::from_wire(0), Marker::Start);
        assert_eq!(Marker::from_wire(12), Marker::At(12));
        assert_eq!(Marker::At(12).to_wire(), 12);
        assert_eq!(Marker::Start.query_value(), None);
    }

    #[tokio::test]
    async fn test_marker_back_to_zero_is_an_error() {
        let source = ScriptedSource::new(vec![
            Ok((vec![json!(1)], 7)),
            Ok((vec![json!(2)], 0)),
            Ok((vec![json!(3)], 7)),
        ]);
        let mut sizer = PageSizer::default();

        let result: Result<FetchOutcome<i64>, _> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer).await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_marker_cycle_is_an_error() {
        let source = ScriptedSource::new(vec![
            Ok((vec![], 7)),
            Ok((vec![], 12)),
            Ok((vec![], 7)),
            Ok((vec![], 12)),
        ]);
        let mut sizer = PageSizer::default();

        let result: Result<FetchOutcome<i64>, _> =
            fetch_all(&source, &records_resource(), Marker::At(3), &mut sizer).await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
        let markers: Vec<Marker> = source.requests().iter().map(|r| r.marker).collect();
        assert_eq!(markers, vec![Marker::At(3), Marker::At(7), Marker::At(12)]);
    }

    #[tokio::test]
    async fn test_null_entries_in_page_are_skipped() {
        let source = ScriptedSource::new(vec![Ok((vec![json!(1), json!(null), json!(2)], -1))]);
        let mut sizer = PageSizer::default();

        let outcome: FetchOutcome<i64> =
            fetch_all(&source, &records_resource(), Marker::Start, &mut sizer)
                .await
                .unwrap();
        assert_eq!(outcome.records, vec![1, 2]);
    }
}
