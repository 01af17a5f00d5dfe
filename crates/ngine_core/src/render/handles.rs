//! Opaque handles to GPU resources held by the resource manager

use std::fmt;

/// Handle to a loaded shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// Handle to an uploaded model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(pub u32);

impl fmt::Display for ShaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader#{}", self.0)
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Monotonic handle source; values are never reused.
#[derive(Debug, Default)]
pub(crate) struct HandleCounter {
    next: u32,
}

impl HandleCounter {
    pub(crate) fn allocate(&mut self) -> u32 {
        let value = self.next;
        self.next += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_monotonic() {
        let mut counter = HandleCounter::default();
        let first = counter.allocate();
        let second = counter.allocate();
        let third = counter.allocate();

        assert!(first < second && second < third);
        assert_eq!(ModelHandle(third).to_string(), "model#2");
    }
}
