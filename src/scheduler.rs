use crate::error::{GbError, WorkerPanickedSnafu};
use crate::gameboy::GameBoy;
use crate::lr35902::T_CYCLES_PER_SECOND;
use crate::video::ppu::FRAME_CYCLES;
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const TARGET_FPS: f64 = T_CYCLES_PER_SECOND as f64 / FRAME_CYCLES as f64;
const TARGET_FRAME_DURATION: Duration = Duration::from_nanos((1_000_000_000.0 / TARGET_FPS) as u64);

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<(GameBoy, Result<(), GbError>)>,
}

/// Owns the machine while it is paused and lends it to a control thread while it runs.
pub struct Scheduler {
    gameboy: Option<GameBoy>,
    worker: Option<Worker>,
    throttle: bool,
}

impl Scheduler {
    pub fn new(gameboy: GameBoy, throttle: bool) -> Scheduler {
        Scheduler {
            gameboy: Some(gameboy),
            worker: None,
            throttle,
        }
    }

    pub fn start(&mut self) {
        let Some(gameboy) = self.gameboy.take() else {
            return;
        };

        debug!("Starting emulation thread");
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let throttle = self.throttle;
        let handle = thread::spawn(move || run(gameboy, flag, throttle));

        self.worker = Some(Worker { running, handle });
    }

    /// Stops the control thread and takes the machine back. Reports the error that
    /// ended the run loop, if one did.
    pub fn stop(&mut self) -> Result<(), GbError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        debug!("Stopping emulation thread");
        worker.running.store(false, Ordering::Release);
        let (gameboy, result) = worker.handle.join().map_err(|_| WorkerPanickedSnafu.build())?;
        self.gameboy = Some(gameboy);
        result
    }

    pub fn toggle(&mut self) -> Result<(), GbError> {
        if self.is_running() {
            self.stop()
        } else {
            self.start();
            Ok(())
        }
    }

    /// True while the control thread is alive. A thread that stopped on an error
    /// counts as not running.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.running.load(Ordering::Acquire) && !worker.handle.is_finished())
    }

    /// The machine, when it is not lent out.
    pub fn gameboy(&self) -> Option<&GameBoy> {
        self.gameboy.as_ref()
    }

    /// Stops the current machine and swaps in `gameboy`, paused.
    pub fn replace(&mut self, gameboy: GameBoy) -> Result<(), GbError> {
        let result = self.stop();
        self.gameboy = Some(gameboy);
        result
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Emulation stopped with an error: {}", e);
        }
    }
}

fn run(mut gameboy: GameBoy, running: Arc<AtomicBool>, throttle: bool) -> (GameBoy, Result<(), GbError>) {
    while running.load(Ordering::Acquire) {
        let frame_timer = Instant::now();

        if let Err(e) = gameboy.run_frame() {
            error!("{}", e);
            running.store(false, Ordering::Release);
            return (gameboy, Err(e));
        }

        if throttle {
            let frame_duration = frame_timer.elapsed();
            if frame_duration < TARGET_FRAME_DURATION {
                spin_sleep::sleep(TARGET_FRAME_DURATION - frame_duration);
            } else {
                debug!(
                    "Frame took too long: {:?} with a delta of {:?}",
                    frame_duration,
                    frame_duration - TARGET_FRAME_DURATION
                );
            }
        }
    }

    (gameboy, Ok(()))
}
