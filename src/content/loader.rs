use crate::content::{ContentError, ContentId, ContentProvider, Question};

/// Handle for one in-flight load. Only the most recent ticket may resolve a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub id: ContentId,
    generation: u64,
}

#[derive(Debug)]
pub enum LoadState {
    Idle,
    Loading(ContentId),
    Ready {
        id: ContentId,
        questions: Vec<Question>,
    },
    Failed {
        id: ContentId,
        error: ContentError,
    },
}

/// Holds the question pool for whatever the learner is currently looking at.
///
/// "Not loaded yet" is an explicit state, and results arriving for a request
/// that has since been superseded or cancelled are discarded.
pub struct ContentSlot {
    generation: u64,
    state: LoadState,
}

impl Default for ContentSlot {
    fn default() -> Self {
        Self {
            generation: 0,
            state: LoadState::Idle,
        }
    }
}

impl ContentSlot {
    pub fn begin(&mut self, id: ContentId) -> Ticket {
        self.generation += 1;
        self.state = LoadState::Loading(id);
        Ticket {
            id,
            generation: self.generation,
        }
    }

    /// Apply a finished load. Returns false when the ticket is stale.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Question>, ContentError>,
    ) -> bool {
        if ticket.generation != self.generation {
            log::debug!("discarding late content for {}", ticket.id);
            return false;
        }
        self.state = match result {
            Ok(questions) => LoadState::Ready {
                id: ticket.id,
                questions,
            },
            Err(error) => {
                log::warn!("content unavailable: {error}");
                LoadState::Failed {
                    id: ticket.id,
                    error,
                }
            }
        };
        true
    }

    /// Navigate away: any outstanding ticket becomes stale.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.state = LoadState::Idle;
    }

    /// Synchronous begin + load + resolve.
    pub fn fetch(&mut self, provider: &dyn ContentProvider, id: ContentId) -> &LoadState {
        let ticket = self.begin(id);
        let result = provider.load(id);
        self.resolve(ticket, result);
        &self.state
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn questions(&self) -> Option<&[Question]> {
        match &self.state {
            LoadState::Ready { questions, .. } => Some(questions),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ContentError> {
        match &self.state {
            LoadState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
