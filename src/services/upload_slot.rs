use serde::Serialize;
use tracing::debug;

use crate::models::{DocumentSummary, NormalizedPayload, UploadedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Empty,
    Selecting,
    Ready,
    Cleared,
}

impl SlotPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPhase::Empty => "empty",
            SlotPhase::Selecting => "selecting",
            SlotPhase::Ready => "ready",
            SlotPhase::Cleared => "cleared",
        }
    }
}

/// Proof that a caller started a selection. Only the ticket from the most
/// recent [`UploadSlot::begin`] can commit a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    Applied,
    /// A newer selection or a clear happened first; the result was dropped.
    Stale,
}

#[derive(Debug)]
struct ReadyDocument {
    document: UploadedDocument,
    payload: NormalizedPayload,
}

/// The "currently selected document" of one session.
///
/// Holds at most one committed document. A new selection replaces it only
/// once its normalization completes; a failed selection leaves it as is.
#[derive(Debug, Default)]
pub struct UploadSlot {
    generation: u64,
    pending: Option<u64>,
    current: Option<ReadyDocument>,
    cleared: bool,
}

impl UploadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SlotPhase {
        if self.pending.is_some() {
            SlotPhase::Selecting
        } else if self.current.is_some() {
            SlotPhase::Ready
        } else if self.cleared {
            SlotPhase::Cleared
        } else {
            SlotPhase::Empty
        }
    }

    /// Start a selection, superseding any selection still in flight.
    pub fn begin(&mut self) -> SelectionTicket {
        self.generation += 1;
        if let Some(previous) = self.pending.replace(self.generation) {
            debug!(superseded = previous, generation = self.generation, "Selection superseded");
        }
        SelectionTicket {
            generation: self.generation,
        }
    }

    pub fn complete(
        &mut self,
        ticket: SelectionTicket,
        document: UploadedDocument,
        payload: NormalizedPayload,
    ) -> SlotOutcome {
        if self.pending != Some(ticket.generation) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                file_name = %document.name,
                "Dropping stale normalization result"
            );
            return SlotOutcome::Stale;
        }

        self.pending = None;
        self.cleared = false;
        self.current = Some(ReadyDocument { document, payload });
        SlotOutcome::Applied
    }

    /// Give up on a selection after its normalization failed.
    pub fn abandon(&mut self, ticket: SelectionTicket) -> SlotOutcome {
        if self.pending == Some(ticket.generation) {
            self.pending = None;
            SlotOutcome::Applied
        } else {
            SlotOutcome::Stale
        }
    }

    /// Drop the committed document and invalidate any selection in flight.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.current = None;
        self.cleared = true;
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.current.as_ref().map(|ready| &ready.document)
    }

    pub fn payload(&self) -> Option<&NormalizedPayload> {
        self.current.as_ref().map(|ready| &ready.payload)
    }

    pub fn summary(&self) -> Option<DocumentSummary> {
        self.current
            .as_ref()
            .map(|ready| DocumentSummary::new(&ready.document, &ready.payload))
    }
}
