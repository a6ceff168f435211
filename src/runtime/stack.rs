//! User value stack with snapshot/restore
//!
//! Every mutation is logged while a snapshot is open, so restoring a
//! snapshot replays the log backwards instead of copying the stack.
//! Snapshots nest: restoring an outer snapshot after an inner one was
//! cleared or restored reproduces the state at the outer snapshot.

/// A stack that can be rolled back to earlier snapshots
#[derive(Debug, Clone)]
pub struct Stack<T: Clone> {
    /// Mutation log since the oldest open snapshot
    ops: Vec<StackOp<T>>,
    /// Current contents, bottom first
    cache: Vec<T>,
    /// Log lengths at each open snapshot
    snapshots: Vec<usize>,
}

#[derive(Debug, Clone)]
enum StackOp<T> {
    Push,
    Pop(T),
}

impl<T: Clone> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Stack<T> {
    /// Create an empty stack
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            cache: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// True when the stack holds no values
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Top value
    pub fn peek(&self) -> Option<&T> {
        self.cache.last()
    }

    /// Values from bottom to top
    pub fn as_slice(&self) -> &[T] {
        &self.cache
    }

    /// Push a value
    pub fn push(&mut self, value: T) {
        if !self.snapshots.is_empty() {
            self.ops.push(StackOp::Push);
        }
        self.cache.push(value);
    }

    /// Pop the top value
    pub fn pop(&mut self) -> Option<T> {
        let value = self.cache.pop()?;
        if !self.snapshots.is_empty() {
            self.ops.push(StackOp::Pop(value.clone()));
        }
        Some(value)
    }

    /// Pop every value
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Open a snapshot
    pub fn snapshot(&mut self) {
        self.snapshots.push(self.ops.len());
    }

    /// Close the newest snapshot, keeping the current contents
    pub fn clear_snapshot(&mut self) {
        self.snapshots.pop();
        if self.snapshots.is_empty() {
            self.ops.clear();
        }
    }

    /// Roll back to the newest snapshot and close it
    ///
    /// Without an open snapshot the stack is emptied.
    pub fn restore(&mut self) {
        let Some(mark) = self.snapshots.pop() else {
            self.cache.clear();
            self.ops.clear();
            return;
        };
        while self.ops.len() > mark {
            match self.ops.pop() {
                Some(StackOp::Push) => {
                    self.cache.pop();
                }
                Some(StackOp::Pop(value)) => self.cache.push(value),
                None => break,
            }
        }
        if self.snapshots.is_empty() {
            self.ops.clear();
        }
    }
}

/// Resolve `[start..end]` with negative indices counting from the end
///
/// Out-of-range indices are clamped; an inverted range is empty.
pub fn slice_bounds(len: usize, start: i32, end: Option<i32>) -> (usize, usize) {
    let resolve = |index: i32| -> usize {
        if index < 0 {
            len.saturating_sub(index.unsigned_abs() as usize)
        } else {
            (index as usize).min(len)
        }
    };
    let start = resolve(start);
    let end = end.map_or(len, resolve);
    if start >= end {
        (start, start)
    } else {
        (start, end)
    }
}
