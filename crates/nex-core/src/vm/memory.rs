//! Frames
//!
//! One frame per active invocation, kept in a stack-ordered arena. The
//! outer link of a frame is a generation-checked handle, so a handle to a
//! frame that has returned can never reach a later frame reusing its slot.

use tracing::debug;

use super::value::{new_slot, Cell, Slot};
use crate::error::{NexError, NexResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
pub struct Frame {
    /// Lexical level of the function running in this frame
    pub nesting_depth: usize,
    /// Nearest active frame one lexical level up
    pub outer: Option<FrameId>,
    pub locals: Vec<Slot>,
    /// Operand stack height when the frame was entered, below the arguments
    pub opstack_depth: usize,
    generation: u64,
}

impl Frame {
    /// Local slot `index`
    pub fn local(&self, index: usize) -> NexResult<Slot> {
        self.locals
            .get(index)
            .cloned()
            .ok_or(NexError::InvalidLocal(index))
    }
}

#[derive(Debug, Default)]
pub struct Frames {
    frames: Vec<Frame>,
    next_generation: u64,
}

impl Frames {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Active frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame is active
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost active frame
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Frame behind `id`; stale handles are rejected
    pub fn get(&self, id: FrameId) -> NexResult<&Frame> {
        match self.frames.get(id.index) {
            Some(f) if f.generation == id.generation => Ok(f),
            _ => Err(NexError::StaleFrame),
        }
    }

    fn top_id(&self) -> Option<FrameId> {
        self.frames.last().map(|f| FrameId {
            index: self.frames.len() - 1,
            generation: f.generation,
        })
    }

    /// Push a frame for a function at lexical level `nest`. The outer frame
    /// is found by walking outward from the topmost frame to the first one
    /// whose level is below `nest`, not by taking the caller.
    pub fn enter(&mut self, nest: usize, locals: usize, opstack_depth: usize) -> NexResult<FrameId> {
        let mut outer = None;
        if let Some(top) = self.top() {
            if nest > top.nesting_depth + 1 {
                return Err(NexError::NestingViolation(format!(
                    "level {} function called from level {}",
                    nest, top.nesting_depth
                )));
            }
            outer = self.top_id();
            while let Some(id) = outer {
                let f = self.get(id)?;
                if nest > f.nesting_depth {
                    break;
                }
                if let Some(o) = f.outer {
                    if self.get(o)?.nesting_depth + 1 != f.nesting_depth {
                        return Err(NexError::NestingViolation(format!(
                            "frame at level {} has outer at level {}",
                            f.nesting_depth,
                            self.get(o)?.nesting_depth
                        )));
                    }
                }
                outer = f.outer;
            }
        }
        match outer {
            Some(id) if self.get(id)?.nesting_depth + 1 != nest => {
                return Err(NexError::NestingViolation(format!(
                    "no enclosing frame at level {}",
                    nest - 1
                )))
            }
            None if nest > 0 => {
                return Err(NexError::NestingViolation(format!(
                    "level {} function has no enclosing frame",
                    nest
                )))
            }
            _ => {}
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.frames.push(Frame {
            nesting_depth: nest,
            outer,
            locals: (0..locals).map(|_| new_slot(Cell::None)).collect(),
            opstack_depth,
            generation,
        });
        debug!(depth = self.frames.len(), nest, ?outer, "frame entered");
        Ok(FrameId {
            index: self.frames.len() - 1,
            generation,
        })
    }

    /// Pop the innermost frame
    pub fn leave(&mut self) -> NexResult<Frame> {
        self.frames.pop().ok_or(NexError::NoActiveFrame)
    }

    /// Local `index` of the frame `back` hops out along the outer chain
    pub fn outer_local(&self, back: usize, index: usize) -> NexResult<Slot> {
        let mut frame = self.top().ok_or(NexError::NoActiveFrame)?;
        for _ in 0..back {
            let id = frame.outer.ok_or_else(|| {
                NexError::NestingViolation(format!(
                    "no outer frame beyond level {}",
                    frame.nesting_depth
                ))
            })?;
            frame = self.get(id)?;
        }
        frame.local(index)
    }

    /// Local `index` of the innermost frame
    pub fn local(&self, index: usize) -> NexResult<Slot> {
        self.top().ok_or(NexError::NoActiveFrame)?.local(index)
    }
}
