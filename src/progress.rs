//! Progress reporting
//!
//! A [`ProgressReporter`] feeds a [`ProgressStream`]. Reported percentages
//! only ever increase, and the stream ends after a single `Completed` or
//! `Failed` event. Dropping the stream cancels it: reporters notice through
//! [`ProgressReporter::is_cancelled`] and further reports are discarded.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

/// Event emitted on a progress stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Percentage complete (0-100)
    Progress(u8),
    Completed,
    Failed(String),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

struct Channel {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    last: AtomicU8,
    finished: AtomicBool,
}

#[derive(Clone)]
enum Target {
    Root(Arc<Channel>),
    /// Maps 0-100 onto `start..=end` of the parent
    Span {
        parent: Box<ProgressReporter>,
        start: u8,
        end: u8,
    },
    Noop,
}

/// Sending half of a progress stream
#[derive(Clone)]
pub struct ProgressReporter {
    target: Target,
}

/// Create a connected reporter/stream pair
pub fn progress_channel() -> (ProgressReporter, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let channel = Arc::new(Channel {
        tx,
        last: AtomicU8::new(0),
        finished: AtomicBool::new(false),
    });

    (
        ProgressReporter {
            target: Target::Root(channel),
        },
        ProgressStream { rx, done: false },
    )
}

impl ProgressReporter {
    /// Reporter that discards everything
    pub fn noop() -> Self {
        Self {
            target: Target::Noop,
        }
    }

    /// Report a percentage. Values at or below the last one are ignored.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        match &self.target {
            Target::Root(channel) => {
                if channel.finished.load(Ordering::Acquire) {
                    return;
                }
                let previous = channel.last.fetch_max(percent, Ordering::AcqRel);
                if percent > previous {
                    let _ = channel.tx.send(ProgressEvent::Progress(percent));
                }
            }
            Target::Span { parent, start, end } => {
                let width = u16::from(end.saturating_sub(*start));
                let mapped = u16::from(*start) + width * u16::from(percent) / 100;
                parent.report(mapped as u8);
            }
            Target::Noop => {}
        }
    }

    /// Sub-reporter covering `start..=end` of this reporter's range.
    ///
    /// Completing or failing a span only advances the parent to `end`; the
    /// parent stream stays open.
    pub fn span(&self, start: u8, end: u8) -> ProgressReporter {
        let start = start.min(100);
        let end = end.clamp(start, 100);
        ProgressReporter {
            target: Target::Span {
                parent: Box::new(self.clone()),
                start,
                end,
            },
        }
    }

    /// Finish successfully (reports 100 first)
    pub fn complete(&self) {
        match &self.target {
            Target::Root(channel) => {
                self.report(100);
                if !channel.finished.swap(true, Ordering::AcqRel) {
                    let _ = channel.tx.send(ProgressEvent::Completed);
                }
            }
            Target::Span { .. } => self.report(100),
            Target::Noop => {}
        }
    }

    /// Finish with an error
    pub fn fail(&self, message: impl Into<String>) {
        match &self.target {
            Target::Root(channel) => {
                if !channel.finished.swap(true, Ordering::AcqRel) {
                    let _ = channel.tx.send(ProgressEvent::Failed(message.into()));
                }
            }
            Target::Span { .. } => self.report(100),
            Target::Noop => {}
        }
    }

    /// Last reported percentage
    pub fn current(&self) -> u8 {
        match &self.target {
            Target::Root(channel) => channel.last.load(Ordering::Acquire),
            Target::Span { parent, .. } => parent.current(),
            Target::Noop => 0,
        }
    }

    /// True once the receiving stream has been dropped
    pub fn is_cancelled(&self) -> bool {
        match &self.target {
            Target::Root(channel) => channel.tx.is_closed(),
            Target::Span { parent, .. } => parent.is_cancelled(),
            Target::Noop => false,
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("current", &self.current())
            .finish()
    }
}

/// Receiving half; ends after the terminal event
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    done: bool,
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.done = true;
                    self.rx.close();
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_progress_is_monotonic_and_terminates() {
        let (reporter, stream) = progress_channel();
        reporter.report(10);
        reporter.report(5);
        reporter.report(50);
        reporter.report(50);
        reporter.complete();
        reporter.report(99);
        reporter.fail("late");

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Progress(10),
                ProgressEvent::Progress(50),
                ProgressEvent::Progress(100),
                ProgressEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_terminates_stream() {
        let (reporter, stream) = progress_channel();
        reporter.report(30);
        reporter.fail("engine crashed");
        drop(reporter);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Progress(30),
                ProgressEvent::Failed("engine crashed".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_span_maps_into_parent_range() {
        let (reporter, stream) = progress_channel();
        let page = reporter.span(20, 60);
        page.report(50);
        page.complete();
        assert_eq!(reporter.current(), 60);
        drop((reporter, page));

        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![ProgressEvent::Progress(40), ProgressEvent::Progress(60)]
        );
    }

    #[test]
    fn test_dropping_stream_cancels() {
        let (reporter, stream) = progress_channel();
        assert!(!reporter.is_cancelled());
        drop(stream);
        assert!(reporter.is_cancelled());
        assert!(reporter.span(0, 50).is_cancelled());
        reporter.report(10);
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = ProgressReporter::noop();
        reporter.report(50);
        reporter.complete();
        assert_eq!(reporter.current(), 0);
        assert!(!reporter.is_cancelled());
    }
}
