use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use camino::Utf8Path;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::codec;
use crate::domain::EntryId;
use crate::error::SyncError;
use crate::header;
use crate::pool::WorkerPool;
use crate::rcsb::{FetchOutcome, RecordFetcher};
use crate::store::{self, NOT_FOUND_LOG};

pub const CHUNK_LEN_PER_WORKER: usize = 20;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub compressed: bool,
    pub parallelism: usize,
    pub header_only: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            compressed: true,
            parallelism: 1,
            header_only: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchReport {
    pub requested: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub bytes: u64,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl FetchReport {
    pub fn processed(&self) -> usize {
        self.fetched + self.not_found
    }
}

#[derive(Debug, Clone, Copy)]
enum RecordResult {
    Fetched(u64),
    NotFound,
}

pub struct FetchOrchestrator<F: RecordFetcher> {
    fetcher: F,
}

impl<F: RecordFetcher> FetchOrchestrator<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn run(
        &self,
        ids: &[EntryId],
        dir: &Utf8Path,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FetchReport, SyncError> {
        let pool = WorkerPool::new(options.parallelism);
        let chunk_len = CHUNK_LEN_PER_WORKER * pool.size();
        let started = Instant::now();
        let mut report = FetchReport {
            requested: ids.len(),
            ..FetchReport::default()
        };
        store::ensure_dir(dir)?;

        for chunk in ids.chunks(chunk_len) {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            let results = pool.map(chunk, |id| self.fetch_one(id, dir, options));
            let mut first_error = None;
            for result in results {
                match result {
                    Ok(RecordResult::Fetched(bytes)) => {
                        report.fetched += 1;
                        report.bytes += bytes;
                    }
                    Ok(RecordResult::NotFound) => report.not_found += 1,
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            report.elapsed = started.elapsed();
            sink.event(ProgressEvent {
                message: progress_line(&report, pool.size()),
                elapsed: Some(report.elapsed),
            });
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Downloaded {} PDB files ({:.3} GB), {} not found, in {} ({:.2}/s) in this session",
            report.fetched,
            report.bytes as f64 / 1e9,
            report.not_found,
            human_readable_time(report.elapsed.as_secs()),
            rate(report.processed(), report.elapsed),
        );
        Ok(report)
    }

    fn fetch_one(
        &self,
        id: &EntryId,
        dir: &Utf8Path,
        options: &FetchOptions,
    ) -> Result<RecordResult, SyncError> {
        let url = codec::download_url(id, options.compressed);
        let destination = dir.join(codec::encode_filename_with(id, options.compressed));
        match self.fetcher.fetch(&url)? {
            FetchOutcome::Fetched(bytes) => {
                let bytes = if options.header_only {
                    keep_header(&bytes, destination.as_str().ends_with(".gz"))?
                } else {
                    bytes
                };
                store::write_bytes_atomic(&destination, &bytes)?;
                debug!(%id, size = bytes.len(), "fetched");
                Ok(RecordResult::Fetched(bytes.len() as u64))
            }
            FetchOutcome::NotFound => {
                store::write_bytes_atomic(&destination, &[])?;
                store::append_line(&dir.join(NOT_FOUND_LOG), id.as_str())?;
                debug!(%id, "not found");
                Ok(RecordResult::NotFound)
            }
        }
    }
}

fn keep_header(bytes: &[u8], compressed: bool) -> Result<Vec<u8>, SyncError> {
    let text = if compressed {
        let mut text = String::new();
        GzDecoder::new(bytes)
            .read_to_string(&mut text)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        text
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    let mut kept = String::new();
    for line in text.lines().filter(|line| header::is_title_section(line)) {
        kept.push_str(line);
        kept.push('\n');
    }
    if !compressed {
        return Ok(kept.into_bytes());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(kept.as_bytes())
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| SyncError::Filesystem(err.to_string()))
}

fn rate(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

fn progress_line(report: &FetchReport, jobs: usize) -> String {
    let done = report.processed();
    let total = report.requested.max(1);
    let speed = rate(done, report.elapsed);
    let eta = if speed > 0.0 {
        human_readable_time(((report.requested - done) as f64 / speed) as u64)
    } else {
        "?".to_string()
    };
    format!(
        "{}: {}/{} ({:.2}%) files ({:.2} MB) ({:.1}/s | {jobs}j; ETA: {eta})",
        human_readable_time(report.elapsed.as_secs()),
        group_thousands(done as u64),
        group_thousands(report.requested as u64),
        done as f64 * 100.0 / total as f64,
        report.bytes as f64 / 1e6,
        speed,
    )
}

pub fn human_readable_time(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = total_secs % 86_400 / 3_600;
    let minutes = total_secs % 3_600 / 60;
    let seconds = total_secs % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
