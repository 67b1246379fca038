//! Ordered source fallback with a per-source timeout.
//!
//! Sources are tried strictly one after another. For each source the
//! injection races its own timeout; whichever fires first decides the
//! source's fate and the other is dropped. A completion only counts once the
//! toolkit is actually visible in the registry slot after the settle delay.

use std::time::Duration;

use tokio::time::Instant;

use crate::environment::HostEnvironment;
use crate::events::{EventBus, LoaderEvent};
use crate::registry::RegistrySlot;
use crate::types::{LoadError, LoadResult, Source, SourceFailure};

/// Timings for one fallback sequence.
#[derive(Debug, Clone, Copy)]
pub struct SequenceTimings {
    pub source_timeout: Duration,
    pub settle_delay: Duration,
}

/// Run one fallback sequence over `sources`.
///
/// Returns the index of the source that delivered the toolkit, or `None`
/// when the toolkit was already registered before any request was made.
pub async fn run_sequence(
    sources: &[Source],
    env: &dyn HostEnvironment,
    slot: &dyn RegistrySlot,
    timings: SequenceTimings,
    events: &EventBus,
) -> LoadResult<Option<usize>> {
    let started = Instant::now();
    events.emit(LoaderEvent::SequenceStarted {
        source_count: sources.len(),
    });

    for (index, source) in sources.iter().enumerate() {
        if slot.is_present() {
            tracing::info!("Proving toolkit already registered, skipping fetch");
            events.emit(LoaderEvent::AlreadyPresent);
            return Ok(None);
        }

        tracing::info!("Attempting to load proving toolkit from: {source}");
        events.emit(LoaderEvent::SourceAttempt {
            index,
            url: source.to_string(),
        });

        match try_source(source, env, slot, timings).await {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!("Proving toolkit loaded from {source} in {elapsed_ms}ms");
                events.emit(LoaderEvent::Loaded {
                    url: Some(source.to_string()),
                    elapsed_ms,
                });
                return Ok(Some(index));
            }
            Err(failure) => {
                tracing::warn!("Source {source} failed: {failure}");
                events.emit(LoaderEvent::SourceFailed {
                    index,
                    url: source.to_string(),
                    failure,
                });
            }
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    events.emit(LoaderEvent::SequenceFailed {
        attempted: sources.len(),
        elapsed_ms,
    });
    Err(LoadError::SourceExhausted {
        count: sources.len(),
    })
}

async fn try_source(
    source: &Source,
    env: &dyn HostEnvironment,
    slot: &dyn RegistrySlot,
    timings: SequenceTimings,
) -> Result<(), SourceFailure> {
    match tokio::time::timeout(timings.source_timeout, env.inject(source)).await {
        Err(_elapsed) => Err(SourceFailure::TimedOut {
            after_ms: timings.source_timeout.as_millis() as u64,
        }),
        Ok(Err(e)) => Err(SourceFailure::Error(format!("{e:#}"))),
        Ok(Ok(())) => {
            // Registration may lag the completion signal.
            tokio::time::sleep(timings.settle_delay).await;
            if slot.is_present() {
                Ok(())
            } else {
                Err(SourceFailure::NotRegistered)
            }
        }
    }
}
