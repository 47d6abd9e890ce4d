//! Record assembly: fold classified rows into logical records.
//!
//! One logical record can span several visual rows. The assembler is a small
//! explicit state machine:
//!
//! ```text
//!            Anchor(p)                      Anchor(q)
//!   Idle ───────────────▶ Accumulating(p) ───────────▶ finalize p, Accumulating(q)
//!    │                       │
//!    │ Continuation          │ Continuation(c)
//!    ▼                       ▼
//!  discard row            p.absorb(c)
//! ```
//!
//! At end of input an open record is finalised. Each record is finalised
//! exactly once, and records that never became usable are counted and
//! dropped instead of being emitted.
//!
//! The machine is generic over [`PendingRecord`] so both source paths share
//! it: [`PendingPreference`] for page text and [`PendingCutoff`] for
//! spreadsheet blocks.

use super::anchor::CodeMatch;
use super::boundary::RowBuckets;
use super::segment::CutoffRowParts;
use tracing::trace;

/// An in-progress record that continuation rows can extend.
pub trait PendingRecord {
    /// What a continuation row contributes.
    type Continuation;

    /// Append a continuation row's parts.
    fn absorb(&mut self, continuation: Self::Continuation);

    /// Whether the record carries enough to be emitted.
    fn is_usable(&self) -> bool;
}

/// One classified row, as seen by the assembler.
#[derive(Debug)]
pub enum RowEvent<P: PendingRecord> {
    /// The row starts a new record.
    Anchor(P),
    /// The row extends whatever record is open.
    Continuation(P::Continuation),
}

/// Assembler state.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerState<P> {
    Idle,
    Accumulating(P),
}

/// Output of a finished assembly pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled<P> {
    /// Finalised records, in input order.
    pub records: Vec<P>,
    /// Continuation rows seen while idle.
    pub discarded_rows: usize,
    /// Records dropped at finalisation for lacking a usable primary part.
    pub discarded_records: usize,
}

/// The Idle/Accumulating state machine.
#[derive(Debug)]
pub struct RecordAssembler<P: PendingRecord> {
    state: AssemblerState<P>,
    records: Vec<P>,
    discarded_rows: usize,
    discarded_records: usize,
}

impl<P: PendingRecord> Default for RecordAssembler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PendingRecord> RecordAssembler<P> {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            records: Vec::new(),
            discarded_rows: 0,
            discarded_records: 0,
        }
    }

    pub fn state(&self) -> &AssemblerState<P> {
        &self.state
    }

    /// Whether a record is currently open.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, AssemblerState::Accumulating(_))
    }

    /// Feed one row.
    pub fn push(&mut self, event: RowEvent<P>) {
        let state = std::mem::replace(&mut self.state, AssemblerState::Idle);
        self.state = match (state, event) {
            (AssemblerState::Idle, RowEvent::Anchor(next)) => {
                trace!("idle -> accumulating");
                AssemblerState::Accumulating(next)
            }
            (AssemblerState::Idle, RowEvent::Continuation(_)) => {
                trace!("continuation row before first record, discarded");
                self.discarded_rows += 1;
                AssemblerState::Idle
            }
            (AssemblerState::Accumulating(open), RowEvent::Anchor(next)) => {
                self.finalize(open);
                AssemblerState::Accumulating(next)
            }
            (AssemblerState::Accumulating(mut open), RowEvent::Continuation(parts)) => {
                open.absorb(parts);
                AssemblerState::Accumulating(open)
            }
        };
    }

    /// Close the input, finalising any open record.
    pub fn finish(mut self) -> Assembled<P> {
        if let AssemblerState::Accumulating(open) =
            std::mem::replace(&mut self.state, AssemblerState::Idle)
        {
            self.finalize(open);
        }
        Assembled {
            records: self.records,
            discarded_rows: self.discarded_rows,
            discarded_records: self.discarded_records,
        }
    }

    fn finalize(&mut self, record: P) {
        if record.is_usable() {
            self.records.push(record);
        } else {
            self.discarded_records += 1;
        }
    }
}

/// A preference entry being reassembled from page rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingPreference {
    pub priority_parts: Vec<String>,
    pub institute_code: String,
    pub branch_code: Option<String>,
    pub course_parts: Vec<String>,
    pub fee_parts: Vec<String>,
    pub institute_parts: Vec<String>,
}

impl PendingPreference {
    /// Open a record from the row carrying the institute code.
    pub fn open(code: &CodeMatch, buckets: RowBuckets) -> Self {
        Self {
            priority_parts: buckets.priority,
            institute_code: code.institute_code.clone(),
            branch_code: code.branch_code.clone(),
            course_parts: buckets.course,
            fee_parts: buckets.fee,
            institute_parts: buckets.institute,
        }
    }

    pub fn course_text(&self) -> String {
        self.course_parts.join(" ")
    }

    pub fn fee_text(&self) -> String {
        self.fee_parts.join(" ")
    }

    pub fn institute_text(&self) -> String {
        self.institute_parts.join(" ")
    }
}

impl PendingRecord for PendingPreference {
    type Continuation = RowBuckets;

    fn absorb(&mut self, buckets: RowBuckets) {
        // Continuation rows carry no code, so nothing lands in `priority`.
        self.course_parts.extend(buckets.course);
        self.fee_parts.extend(buckets.fee);
        self.institute_parts.extend(buckets.institute);
    }

    fn is_usable(&self) -> bool {
        !self.institute_code.trim().is_empty()
    }
}

/// One course row of a cutoff block, possibly wrapped over several rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCutoff {
    pub course_parts: Vec<String>,
    /// `(category, raw rank)` in header column order.
    pub ranks: Vec<(String, i64)>,
}

impl PendingCutoff {
    pub fn open(parts: CutoffRowParts) -> Self {
        Self {
            course_parts: parts.course.into_iter().collect(),
            ranks: parts.ranks,
        }
    }

    pub fn course_text(&self) -> String {
        self.course_parts.join(" ")
    }
}

impl PendingRecord for PendingCutoff {
    type Continuation = CutoffRowParts;

    fn absorb(&mut self, parts: CutoffRowParts) {
        if let Some(course) = parts.course {
            self.course_parts.push(course);
        }
        for (category, rank) in parts.ranks {
            if !self.ranks.iter().any(|(c, _)| *c == category) {
                self.ranks.push((category, rank));
            }
        }
    }

    fn is_usable(&self) -> bool {
        !self.course_parts.is_empty() && !self.ranks.is_empty()
    }
}
