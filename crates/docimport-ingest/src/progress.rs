//! Progress display
//!
//! Progress is driven by bytes read. Each datasource gets a [`SourceProgress`]
//! that either owns one bar for all its files, or hands out one bar per file
//! when individual progress is enabled. Bars live in a shared `MultiProgress`
//! that renders to stderr, or nowhere when progress is disabled.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::provider::ProviderMetadata;

const BAR_TEMPLATE: &str = "{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Shared state of all bars of one run
pub struct ProgressCoordinator {
    multi: MultiProgress,
    longest_label: Mutex<usize>,
}

impl ProgressCoordinator {
    pub fn new(visible: bool) -> Arc<Self> {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Arc::new(Self {
            multi: MultiProgress::with_draw_target(target),
            longest_label: Mutex::new(0),
        })
    }

    pub fn source(
        self: &Arc<Self>,
        label: impl Into<String>,
        individual: bool,
        show_current_file: bool,
    ) -> Arc<SourceProgress> {
        let label = label.into();
        self.track_width(label.chars().count());
        Arc::new(SourceProgress {
            coordinator: Arc::clone(self),
            label,
            individual,
            show_current_file,
            discovered: AtomicU64::new(0),
            estimated: AtomicU64::new(0),
            done: AtomicU64::new(0),
            bar: OnceLock::new(),
        })
    }

    /// Widen the description column to at least `width`, returning the
    /// current width.
    fn track_width(&self, width: usize) -> usize {
        let mut longest = self
            .longest_label
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *longest = (*longest).max(width);
        *longest
    }

    fn padded(&self, label: &str) -> String {
        let width = self.track_width(label.chars().count());
        format!("{:<width$}", label, width = width)
    }

    fn add_bar(&self, length: u64, label: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(length));
        bar.set_style(bar_style());
        bar.set_prefix(self.padded(label));
        bar
    }
}

/// Progress of one datasource
pub struct SourceProgress {
    coordinator: Arc<ProgressCoordinator>,
    label: String,
    individual: bool,
    show_current_file: bool,
    discovered: AtomicU64,
    estimated: AtomicU64,
    done: AtomicU64,
    /// Created on first use so sources that never start a file draw nothing
    bar: OnceLock<ProgressBar>,
}

impl SourceProgress {
    fn total_bar(&self) -> &ProgressBar {
        self.bar
            .get_or_init(|| self.coordinator.add_bar(0, &self.label))
    }

    fn refresh(&self) {
        if self.individual || self.show_current_file {
            return;
        }
        let files = self
            .discovered
            .load(Ordering::Relaxed)
            .max(self.estimated.load(Ordering::Relaxed));
        let done = self.done.load(Ordering::Relaxed);
        self.total_bar()
            .set_message(format!("{} files ({} done)", files, done));
    }

    pub fn file_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }

    pub fn update_metadata(&self, metadata: &ProviderMetadata) {
        self.estimated
            .fetch_max(metadata.file_count, Ordering::Relaxed);
        if self.individual {
            self.coordinator.track_width(metadata.longest_name);
        } else {
            let bar = self.total_bar();
            bar.set_length(metadata.total_bytes.max(bar.position()));
        }
        self.refresh();
    }

    /// Start reporting progress for `path`, which is `size` bytes on disk.
    pub fn start_file(self: &Arc<Self>, path: &Path, size: u64) -> FileProgress {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bar = if self.individual {
            self.coordinator.add_bar(size, &name)
        } else {
            let bar = self.total_bar().clone();
            if self.show_current_file {
                bar.set_message(name);
            }
            bar
        };

        FileProgress {
            bar,
            read: Arc::new(AtomicU64::new(0)),
            source: Some(Arc::clone(self)),
            owns_bar: self.individual,
        }
    }

    fn file_finished(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }

    pub fn files_discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    pub fn files_done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish();
        }
    }
}

/// Progress handle of one file; clones report to the same bar
#[derive(Clone)]
pub struct FileProgress {
    bar: ProgressBar,
    /// Bytes read from this file; the bar may be shared with other files
    read: Arc<AtomicU64>,
    source: Option<Arc<SourceProgress>>,
    owns_bar: bool,
}

impl FileProgress {
    /// A handle that reports nowhere
    pub fn detached() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            read: Arc::new(AtomicU64::new(0)),
            source: None,
            owns_bar: true,
        }
    }

    pub fn advance(&self, bytes: u64) {
        self.read.fetch_add(bytes, Ordering::Relaxed);
        self.bar.inc(bytes);
        let position = self.bar.position();
        if self.bar.length().is_some_and(|len| position > len) {
            self.bar.set_length(position);
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Mark the file as done
    pub fn complete(&self) {
        if self.owns_bar {
            self.bar.finish();
        }
        if let Some(source) = &self.source {
            source.file_finished();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_total_bar_grows_past_estimate() {
        let coordinator = ProgressCoordinator::new(false);
        let source = coordinator.source("people", false, false);
        source.update_metadata(&ProviderMetadata {
            file_count: 2,
            total_bytes: 10,
            longest_name: 5,
        });

        let file = source.start_file(Path::new("/data/a.csv"), 10);
        file.advance(8);
        let other = source.start_file(Path::new("/data/b.csv"), 0);
        other.advance(8);
        assert_eq!(file.bytes_read(), 8);
        assert_eq!(source.total_bar().position(), 16);
        assert_eq!(source.total_bar().length(), Some(16));

        file.complete();
        source.file_discovered();
        assert_eq!(source.files_done(), 1);
        assert_eq!(source.files_discovered(), 1);
        assert_eq!(source.total_bar().message(), "2 files (1 done)");
    }

    #[test]
    fn test_individual_bars() {
        let coordinator = ProgressCoordinator::new(false);
        let source = coordinator.source("people", true, false);

        let a = source.start_file(Path::new("a.csv"), 4);
        let b = source.start_file(Path::new("b.csv"), 4);
        a.advance(4);
        assert_eq!(a.bytes_read(), 4);
        assert_eq!(b.bytes_read(), 0);
        assert_ne!(a.bar.position(), b.bar.position());
        assert!(source.bar.get().is_none());
    }

    #[test]
    fn test_labels_are_padded_to_longest() {
        let coordinator = ProgressCoordinator::new(false);
        coordinator.source("a-much-longer-label", false, false);
        assert_eq!(coordinator.padded("short").len(), "a-much-longer-label".len());
    }
}
