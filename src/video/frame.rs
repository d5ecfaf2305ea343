use crate::memory::bus::lock;
use crate::video::palette::{Color, Shade};
use crate::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type Frame = [Shade; SCREEN_WIDTH * SCREEN_HEIGHT];

pub fn blank_frame() -> Box<Frame> {
    Box::new([Shade::White; SCREEN_WIDTH * SCREEN_HEIGHT])
}

/// The display-facing side of the PPU's double buffer.
///
/// The PPU renders into a private back buffer and swaps it in here once per frame,
/// so readers only ever see complete frames. Clones share the same front buffer.
#[derive(Clone)]
pub struct FrameBuffer {
    front: Arc<Mutex<Box<Frame>>>,
    generation: Arc<AtomicU64>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer::new()
    }
}

impl FrameBuffer {
    pub fn new() -> FrameBuffer {
        FrameBuffer {
            front: Arc::new(Mutex::new(blank_frame())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Swaps `back` with the front buffer. `back` comes out holding the previous frame.
    pub fn publish(&self, back: &mut Box<Frame>) {
        std::mem::swap(&mut *lock(&self.front), back);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of frames published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Box<Frame> {
        lock(&self.front).clone()
    }

    pub fn with_frame<T>(&self, f: impl FnOnce(&Frame) -> T) -> T {
        f(&lock(&self.front))
    }

    /// The front buffer as tightly packed RGBA, row by row.
    pub fn to_rgba(&self) -> Vec<u8> {
        self.with_frame(|frame| {
            frame
                .iter()
                .flat_map(|shade| {
                    let [r, g, b] = Color::from(*shade);
                    [r, g, b, 0xff]
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_swaps_and_counts() {
        let frame_buffer = FrameBuffer::new();
        let reader = frame_buffer.clone();

        let mut back = blank_frame();
        back[0] = Shade::Black;
        frame_buffer.publish(&mut back);

        assert_eq!(reader.generation(), 1);
        assert_eq!(reader.snapshot()[0], Shade::Black);
        assert_eq!(back[0], Shade::White);
        assert_eq!(&reader.to_rgba()[..8], &[0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0xff]);
    }
}
