//! Ping-pong buffering for the two feedback loops.
//!
//! Each loop owns two equally sized buffers. A frame renders into the `write`
//! side while sampling last frame's output from the `read` side, then swaps.
//! The pair is generic so the swap discipline can be tested without a GPU; the
//! renderer instantiates it with render targets.
//!
//! ```text
//! read(prev) ──▶ pass ──▶ write(temp) ──swap──▶ read(new current)
//! ```

/// Which of the two feedback loops a buffer pair belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedbackLoop {
    /// UV-distortion field consumed by the raymarch pass.
    Uv,
    /// Raymarched image fed back into the next frame.
    Main,
}

impl FeedbackLoop {
    pub fn label(self) -> &'static str {
        match self {
            FeedbackLoop::Uv => "UV Feedback",
            FeedbackLoop::Main => "Main Feedback",
        }
    }
}

/// Two buffers swapped after every write.
#[derive(Debug)]
pub struct FeedbackPair<T> {
    buffers: [T; 2],
    read: usize,
    swaps: u64,
}

impl<T> FeedbackPair<T> {
    /// `current` starts as the read side, `temp` as the write side.
    pub fn new(current: T, temp: T) -> Self {
        Self { buffers: [current, temp], read: 0, swaps: 0 }
    }

    /// Last frame's output.
    pub fn read(&self) -> &T {
        &self.buffers[self.read]
    }

    /// Target for this frame's pass.
    pub fn write(&self) -> &T {
        &self.buffers[1 - self.read]
    }

    /// Index of the read buffer (0 or 1).
    pub fn read_index(&self) -> usize {
        self.read
    }

    pub fn write_index(&self) -> usize {
        1 - self.read
    }

    /// Make the freshly written buffer the new read side.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
        self.swaps += 1;
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    /// Replace both buffers (e.g. on resize), resetting the read side.
    pub fn replace(&mut self, current: T, temp: T) {
        self.buffers = [current, temp];
        self.read = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_never_aliases_write() {
        let mut pair = FeedbackPair::new("a", "b");
        for _ in 0..5 {
            assert_ne!(pair.read_index(), pair.write_index());
            assert_ne!(pair.read(), pair.write());
            pair.swap();
        }
        assert_eq!(pair.swap_count(), 5);
    }

    #[test]
    fn test_swap_exposes_written_buffer() {
        let mut pair = FeedbackPair::new(0, 1);
        let written = *pair.write();
        pair.swap();
        assert_eq!(*pair.read(), written);
        assert_eq!(*pair.write(), 0);
    }

    #[test]
    fn test_replace_resets_sides() {
        let mut pair = FeedbackPair::new(0, 1);
        pair.swap();
        pair.replace(10, 11);
        assert_eq!(*pair.read(), 10);
        assert_eq!(*pair.write(), 11);
    }

    #[test]
    fn test_loop_labels() {
        assert_eq!(FeedbackLoop::Uv.label(), "UV Feedback");
        assert_eq!(FeedbackLoop::Main.label(), "Main Feedback");
    }
}
