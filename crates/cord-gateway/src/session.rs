//! Resume state for one gateway session.

use cord_proto::Resume;

/// Session identity tracked across reconnects.
///
/// `sequence` only ever moves forward while a session lives; it goes back to
/// zero only through [`Session::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    session_id: Option<String>,
    sequence: u64,
    resume_eligible: bool,
}

impl Session {
    /// An empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-assigned session id, once READY has arrived.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Highest sequence number seen.
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the next handshake should be a Resume.
    pub const fn is_resume_eligible(&self) -> bool {
        self.resume_eligible && self.session_id.is_some()
    }

    /// Record a dispatch sequence number. Returns the updated sequence.
    pub fn observe_sequence(&mut self, sequence: u64) -> u64 {
        self.sequence = self.sequence.max(sequence);
        self.sequence
    }

    /// READY: record the session id and allow resuming.
    pub fn mark_ready(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.resume_eligible = true;
    }

    /// RESUMED: the resumed session is eligible again.
    pub fn mark_resumed(&mut self) {
        self.resume_eligible = self.session_id.is_some();
    }

    /// Forget the session. The next handshake is an Identify.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Resume payload, if the session can be resumed.
    pub fn resume_payload(&self, token: &str) -> Option<Resume> {
        if !self.resume_eligible {
            return None;
        }
        self.session_id.as_ref().map(|session_id| Resume {
            token: token.to_string(),
            session_id: session_id.clone(),
            seq: self.sequence,
        })
    }
}
