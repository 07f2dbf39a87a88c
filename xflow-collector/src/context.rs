//! Per-run engine state.
//!
//! `EngineContext` owns everything a run needs after startup: both flow
//! tables, the time offset and the classifier attachment. The attachment is
//! held by `ScopedAttachment`, which detaches on `detach`/`finish` and
//! otherwise when dropped, so every exit path leaves the interface clean.
//! Detaching does not release the tables; the drain reads them afterwards.

use xflow_bpf::{Attachment, BpfError, ColdCache, LiveTable, TableError};
use xflow_clock::TimeOffset;
use xflow_schema::{Accumulator, FlowKey};

use crate::collector::{drain, sweep_idle, CollectorError, DrainOutcome, SweepOutcome};
use crate::logger::Logger;

/// Attachment guard that detaches exactly once.
pub struct ScopedAttachment<'a, A: Attachment> {
    inner: Option<A>,
    logger: &'a dyn Logger,
}

impl<'a, A: Attachment> ScopedAttachment<'a, A> {
    pub fn new(attachment: A, logger: &'a dyn Logger) -> Self {
        Self {
            inner: Some(attachment),
            logger,
        }
    }

    /// Returns true until the first detach attempt.
    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    /// Detach now. Later calls (and the drop) do nothing, even if this one
    /// failed.
    pub fn detach(&mut self) -> Result<(), BpfError> {
        match self.inner.take() {
            Some(mut attachment) => {
                let interface = attachment.interface().to_string();
                attachment.detach()?;
                self.logger
                    .verbose(&format!("Detached classifier from {}", interface));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<A: Attachment> Drop for ScopedAttachment<'_, A> {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            self.logger.warn(&format!("Detach on drop failed: {}", e));
        }
    }
}

/// Tables, time base and attachment for one collection run.
pub struct EngineContext<'a, L, C, A: Attachment> {
    live: L,
    cold: C,
    offset: TimeOffset,
    attachment: ScopedAttachment<'a, A>,
}

impl<'a, L, C, A> EngineContext<'a, L, C, A>
where
    L: LiveTable,
    C: ColdCache,
    A: Attachment,
{
    pub fn new(live: L, cold: C, offset: TimeOffset, attachment: A, logger: &'a dyn Logger) -> Self {
        Self {
            live,
            cold,
            offset,
            attachment: ScopedAttachment::new(attachment, logger),
        }
    }

    pub fn offset(&self) -> TimeOffset {
        self.offset
    }

    pub fn live(&self) -> &L {
        &self.live
    }

    pub fn cold(&self) -> &C {
        &self.cold
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_attached()
    }

    /// Move flows idle for longer than `idle_threshold_sec` to the cold cache.
    pub fn sweep(&self, idle_threshold_sec: u64, now_wall: f64) -> Result<SweepOutcome, CollectorError> {
        sweep_idle(
            &self.live,
            &self.cold,
            self.offset,
            idle_threshold_sec as f64,
            now_wall,
        )
    }

    /// Detach the classifier and keep the tables. Later calls do nothing.
    pub fn detach(&mut self) -> Result<(), BpfError> {
        self.attachment.detach()
    }

    /// Move every remaining live flow to the cold cache.
    pub fn drain(&self) -> Result<DrainOutcome, CollectorError> {
        drain(&self.live, &self.cold)
    }

    /// All finalized flows.
    pub fn finalized(&self) -> Result<Vec<(FlowKey, Vec<Accumulator>)>, TableError> {
        self.cold.entries()
    }

    /// Detach the classifier and release the context.
    pub fn finish(mut self) -> Result<(), BpfError> {
        self.attachment.detach()
    }
}
