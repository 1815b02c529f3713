//! # Parallel Parsing Support
//!
//! Parse many inputs against one compiled grammar. The rule set is shared
//! read-only between workers; each parse owns its memo and forest.
//!
//! With the `parallel` feature inputs are distributed over a `rayon` pool,
//! otherwise they are parsed one after the other.

use crate::error::ParseError;
use crate::parser::{Goal, ScannerlessParser};
use crate::sppf::SharedPackedParseTree;
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of parsing a single input
#[derive(Debug)]
pub struct FileParseResult {
    /// The input identifier (path or index)
    pub file_id: String,
    pub result: Result<SharedPackedParseTree, ParseError>,
    pub duration: Duration,
}

impl FileParseResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn tree(&self) -> Option<&SharedPackedParseTree> {
        self.result.as_ref().ok()
    }
}

/// A batch of inputs to parse
#[derive(Debug, Clone, Default)]
pub struct ParseBatch {
    /// Inputs to parse: (file_id, content, goal)
    pub files: Vec<(String, String, Goal)>,
}

impl ParseBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file_id: impl Into<String>, content: impl Into<String>, goal: impl Into<Goal>) {
        self.files.push((file_id.into(), content.into(), goal.into()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Progress callback for parallel parsing: `(completed, total)`
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Configuration for parallel parsing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use (0 = rayon's global pool)
    pub num_threads: usize,
    /// Minimum inputs handed to a worker at once
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            chunk_size: 1,
        }
    }
}

/// Batch parser sharing one [`ScannerlessParser`] between workers
#[derive(Debug, Clone)]
pub struct ParallelParser {
    parser: ScannerlessParser,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    config: ParallelConfig,
}

impl ParallelParser {
    #[must_use]
    pub fn new(parser: ScannerlessParser) -> Self {
        Self {
            parser,
            config: ParallelConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(parser: ScannerlessParser, config: ParallelConfig) -> Self {
        Self { parser, config }
    }

    #[must_use]
    pub const fn parser(&self) -> &ScannerlessParser {
        &self.parser
    }

    fn parse_one(&self, file_id: &str, content: &str, goal: &Goal) -> FileParseResult {
        let start = Instant::now();
        let result = self.parser.parse(goal.clone(), content);
        FileParseResult {
            file_id: file_id.to_string(),
            result,
            duration: start.elapsed(),
        }
    }

    /// Parse a batch in parallel; results are in batch order
    #[cfg(feature = "parallel")]
    #[must_use]
    pub fn parse_batch(&self, batch: &ParseBatch) -> Vec<FileParseResult> {
        self.install(|| {
            batch
                .files
                .par_iter()
                .with_min_len(self.config.chunk_size.max(1))
                .map(|(file_id, content, goal)| self.parse_one(file_id, content, goal))
                .collect()
        })
    }

    /// Parse a batch with progress reporting
    #[cfg(feature = "parallel")]
    #[must_use]
    pub fn parse_batch_with_progress(
        &self,
        batch: &ParseBatch,
        progress: ProgressCallback,
    ) -> Vec<FileParseResult> {
        let total = batch.len();
        let completed = std::sync::atomic::AtomicUsize::new(0);

        self.install(|| {
            batch
                .files
                .par_iter()
                .with_min_len(self.config.chunk_size.max(1))
                .map(|(file_id, content, goal)| {
                    let result = self.parse_one(file_id, content, goal);
                    let done = completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                    progress(done, total);
                    result
                })
                .collect()
        })
    }

    #[cfg(feature = "parallel")]
    fn install<R: Send>(&self, work: impl FnOnce() -> R + Send) -> R {
        if self.config.num_threads == 0 {
            return work();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(error) => {
                log::warn!("falling back to the global rayon pool: {error}");
                work()
            }
        }
    }

    /// Sequential fallback when the parallel feature is disabled
    #[cfg(not(feature = "parallel"))]
    #[must_use]
    pub fn parse_batch(&self, batch: &ParseBatch) -> Vec<FileParseResult> {
        batch
            .files
            .iter()
            .map(|(file_id, content, goal)| self.parse_one(file_id, content, goal))
            .collect()
    }

    /// Sequential fallback when the parallel feature is disabled
    #[cfg(not(feature = "parallel"))]
    #[must_use]
    pub fn parse_batch_with_progress(
        &self,
        batch: &ParseBatch,
        progress: ProgressCallback,
    ) -> Vec<FileParseResult> {
        let total = batch.len();
        batch
            .files
            .iter()
            .enumerate()
            .map(|(index, (file_id, content, goal))| {
                let result = self.parse_one(file_id, content, goal);
                progress(index + 1, total);
                result
            })
            .collect()
    }
}

/// Aggregate results from batch parsing
#[must_use]
pub fn aggregate_results(results: &[FileParseResult]) -> ParseSummary {
    let total_files = results.len();
    let successful = results.iter().filter(|r| r.is_ok()).count();
    let failed = total_files - successful;
    let ambiguous = results
        .iter()
        .filter_map(FileParseResult::tree)
        .filter(|tree| tree.is_ambiguous())
        .count();
    let total_duration: Duration = results.iter().map(|r| r.duration).sum();
    let avg_duration = u32::try_from(total_files)
        .ok()
        .filter(|count| *count > 0)
        .map_or(Duration::ZERO, |count| total_duration / count);

    ParseSummary {
        total_files,
        successful,
        failed,
        ambiguous,
        total_duration,
        avg_duration,
    }
}

/// Summary of batch parsing results
#[derive(Debug, Clone)]
pub struct ParseSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful parses whose forest packs more than one tree
    pub ambiguous: usize,
    pub total_duration: Duration,
    pub avg_duration: Duration,
}

impl ParseSummary {
    /// Get the success rate as a percentage
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            100.0
        } else {
            (self.successful as f64 / self.total_files as f64) * 100.0
        }
    }
}
