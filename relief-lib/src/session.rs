// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ownership of the current fields across asynchronous rebuilds.
//!
//! Each new image gets a ticket. A build result is only accepted if its ticket
//! is still the latest one issued, so an old image finishing late never
//! overwrites a newer one.

use crate::field::ReliefFields;

/// Handle identifying one field build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildTicket(u64);

impl BuildTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Current fields and the generation counter of build requests.
#[derive(Debug, Default)]
pub struct FieldSession {
    generation: u64,
    fields: Option<ReliefFields>,
}

impl FieldSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new build, superseding every build started before.
    pub fn begin(&mut self) -> BuildTicket {
        self.generation += 1;
        log::debug!("Field build #{} started", self.generation);
        BuildTicket(self.generation)
    }

    pub fn is_current(&self, ticket: BuildTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Store the result of a build if it is still the latest request.
    /// Returns whether the fields were accepted.
    pub fn commit(&mut self, ticket: BuildTicket, fields: ReliefFields) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Dropping stale fields of build #{} (latest is #{})",
                ticket.0,
                self.generation
            );
            return false;
        }
        self.fields = Some(fields);
        true
    }

    pub fn fields(&self) -> Option<&ReliefFields> {
        self.fields.as_ref()
    }

    /// Report a failed build. Returns whether the failure concerns the latest
    /// request, in which case the previous fields are dropped.
    pub fn fail(&mut self, ticket: BuildTicket) -> bool {
        if !self.is_current(ticket) {
            log::debug!("Build #{} failed after being superseded", ticket.0);
            return false;
        }
        self.clear();
        true
    }

    /// Forget the current fields.
    pub fn clear(&mut self) {
        self.fields = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, Vector3};

    fn fields(value: f32) -> ReliefFields {
        ReliefFields {
            displacement: DMatrix::repeat(2, 2, value),
            normals: DMatrix::repeat(2, 2, Vector3::z()),
        }
    }

    #[test]
    fn latest_request_wins_regardless_of_completion_order() {
        let mut session = FieldSession::new();
        let first = session.begin();
        let second = session.begin();
        assert!(!session.is_current(first));

        // The second build completes first.
        assert!(session.commit(second, fields(0.2)));
        // The first one completes late and is discarded.
        assert!(!session.commit(first, fields(0.1)));
        assert_eq!(session.fields().unwrap().displacement[(0, 0)], 0.2);
    }

    #[test]
    fn superseded_build_never_lands() {
        let mut session = FieldSession::new();
        let old = session.begin();
        let _new = session.begin();
        assert!(!session.commit(old, fields(0.5)));
        assert!(session.fields().is_none());
    }

    #[test]
    fn failure_of_latest_request_drops_old_fields() {
        let mut session = FieldSession::new();
        let first = session.begin();
        assert!(session.commit(first, fields(0.3)));
        let second = session.begin();
        assert!(session.fail(second));
        assert!(session.fields().is_none());
    }

    #[test]
    fn failure_of_superseded_request_is_ignored() {
        let mut session = FieldSession::new();
        let old = session.begin();
        let new = session.begin();
        assert!(session.commit(new, fields(0.7)));
        assert!(!session.fail(old));
        assert_eq!(session.fields().unwrap().displacement[(0, 0)], 0.7);
    }

    #[test]
    fn tickets_are_increasing() {
        let mut session = FieldSession::new();
        let a = session.begin();
        let b = session.begin();
        assert!(b > a);
        assert_eq!(b.generation(), 2);
        session.commit(b, fields(1.0));
        session.clear();
        assert!(session.fields().is_none());
    }
}
