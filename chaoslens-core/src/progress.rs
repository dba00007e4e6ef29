use std::time::Duration;

/// Progress of a running capture, reported after every tile.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CaptureProgress {
    pub completed_tiles: usize,
    pub total_tiles: usize,
    pub elapsed: Duration,
}

impl CaptureProgress {
    pub fn new(total_tiles: usize) -> Self {
        Self {
            completed_tiles: 0,
            total_tiles,
            elapsed: Duration::ZERO,
        }
    }

    /// Completion percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f32 {
        if self.total_tiles == 0 {
            0.0
        } else {
            (self.completed_tiles as f32 / self.total_tiles as f32) * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_tiles > 0 && self.completed_tiles == self.total_tiles
    }
}
