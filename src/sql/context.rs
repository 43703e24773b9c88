/// Per-parse mutable state.
/// One ParseContext lives exactly as long as one query level is parsed and is
/// threaded through every resolver. A nested subquery gets its own context.

use crate::common::{PlanError, PlanResult};
use crate::config::CASE_NAME_PREFIX;

#[derive(Debug)]
pub struct ParseContext {
    case_counter: usize,
    depth: usize,
    max_depth: usize,
}

impl ParseContext {
    pub fn new(max_depth: usize) -> Self {
        ParseContext {
            case_counter: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Allocates `case1`, `case2`, ... in encounter order.
    pub fn next_case_name(&mut self) -> String {
        self.case_counter += 1;
        format!("{}{}", CASE_NAME_PREFIX, self.case_counter)
    }

    /// Context for a nested subquery: case names restart at `case1`, the depth
    /// budget carries over.
    pub fn nested(&self) -> Self {
        ParseContext {
            case_counter: 0,
            depth: self.depth,
            max_depth: self.max_depth,
        }
    }

    pub fn descend(&mut self) -> PlanResult<()> {
        if self.depth >= self.max_depth {
            return Err(PlanError::TooDeeplyNested(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
