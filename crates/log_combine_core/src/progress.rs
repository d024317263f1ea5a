use crate::contract::ValidationError;

/// Next action for the merge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    /// Append the eligible file at this index to the scratch object.
    Append(usize),
    /// Stop and hand this continuation marker back to the caller.
    Yield(usize),
    /// Every file is committed; publish and retire the scratch object.
    Finalize,
}

/// Cursor over the eligible file list for one job, possibly spanning
/// several invocations. The scratch object durably encodes everything
/// below the cursor, so resuming is just restarting the cursor at the
/// supplied marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCursor {
    next_index: usize,
    total: usize,
}

impl MergeCursor {
    pub fn resume(resume_index: usize, total: usize) -> Result<Self, ValidationError> {
        if resume_index > total {
            return Err(ValidationError::new(format!(
                "continuation marker {resume_index} exceeds the file list length {total}"
            )));
        }
        Ok(Self {
            next_index: resume_index,
            total,
        })
    }

    /// A fresh cursor triggers padding initialization; a resumed one must
    /// never re-create the scratch object.
    pub fn is_fresh(&self) -> bool {
        self.next_index == 0
    }

    pub fn is_complete(&self) -> bool {
        self.next_index == self.total
    }

    pub fn index(&self) -> usize {
        self.next_index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Finalization takes precedence over time pressure: a complete job is
    /// published even when the budget check fires, never re-yielded.
    pub fn next_step(&self, out_of_time: bool) -> MergeStep {
        if self.is_complete() {
            return MergeStep::Finalize;
        }
        if out_of_time {
            return MergeStep::Yield(self.next_index);
        }
        MergeStep::Append(self.next_index)
    }

    pub fn advance(&mut self) {
        debug_assert!(self.next_index < self.total);
        self.next_index += 1;
    }
}
