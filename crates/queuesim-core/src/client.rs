use std::sync::Arc;

/// Which leg of its journey a client is on; selects the node's processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Request,
    Response,
}

/// One hop of an itinerary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub kind: PathKind,
    pub target: String,
}

impl PathStep {
    pub fn request(target: impl Into<String>) -> Self {
        Self {
            kind: PathKind::Request,
            target: target.into(),
        }
    }

    pub fn response(target: impl Into<String>) -> Self {
        Self {
            kind: PathKind::Response,
            target: target.into(),
        }
    }
}

/// A synthetic request walking its itinerary.
///
/// The itinerary is shared with every other client generated from the same load;
/// the cursor and phase belong to this client alone. A client is moved from task to
/// task through queues and is never shared.
#[derive(Debug)]
pub struct Client {
    request_name: Arc<str>,
    itinerary: Arc<[PathStep]>,
    cursor: usize,
    phase: PathKind,
}

impl Client {
    pub fn new(request_name: Arc<str>, itinerary: Arc<[PathStep]>) -> Self {
        Self {
            request_name,
            itinerary,
            cursor: 0,
            phase: PathKind::Request,
        }
    }

    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Kind of the most recently taken step, `Request` before the first one.
    pub fn phase(&self) -> PathKind {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn itinerary_len(&self) -> usize {
        self.itinerary.len()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.itinerary.len()
    }

    /// Take the next step, or `None` once the itinerary is exhausted.
    pub fn advance(&mut self) -> Option<PathStep> {
        let step = self.itinerary.get(self.cursor)?.clone();
        self.cursor += 1;
        self.phase = step.kind;
        Some(step)
    }
}
