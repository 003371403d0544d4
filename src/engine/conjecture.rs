//! Backtracking decisions.
//!
//! A search attempt walks the pattern from the root and asks for a choice at
//! every decision point it meets, in discovery order. The first time an
//! index is reached its first candidate is recorded; later walks replay the
//! recorded choice. After a failed attempt [`Conjecture::increment`] moves
//! the last decision on, dropping exhausted ones, and the walk restarts.

use crate::engine::errors::EngineError;
use log::trace;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub range: Range<usize>,
    pub choice: usize,
}

#[derive(Debug, Default)]
pub struct Conjecture {
    decisions: Vec<Decision>,
    cursor: usize,
}

impl Conjecture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new walk from the first decision.
    pub fn start(&mut self) {
        self.cursor = 0;
    }

    /// The choice for the next decision point, which offers `range`.
    ///
    /// `range` must not be empty.
    pub fn get_decision(&mut self, range: Range<usize>) -> Result<usize, EngineError> {
        let index = self.cursor;
        self.cursor += 1;
        match self.decisions.get(index) {
            Some(recorded) if recorded.range == range => Ok(recorded.choice),
            Some(recorded) => Err(EngineError::DecisionReshaped {
                index,
                recorded: recorded.range.clone(),
                offered: range,
            }),
            None => {
                let choice = range.start;
                self.decisions.push(Decision { range, choice });
                Ok(choice)
            }
        }
    }

    /// Report how the walk went. A failed walk voids every decision after
    /// the point it reached.
    pub fn report_outcome(&mut self, ok: bool) {
        if !ok {
            self.decisions.truncate(self.cursor);
        }
    }

    /// Move to the next combination. Returns false once every combination
    /// has been tried.
    pub fn increment(&mut self) -> bool {
        while let Some(index) = self.decisions.len().checked_sub(1) {
            let last = &mut self.decisions[index];
            last.choice += 1;
            if last.choice < last.range.end {
                trace!("decision {} -> {} of {:?}", index, last.choice, last.range);
                return true;
            }
            self.decisions.pop();
        }
        false
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }
}
