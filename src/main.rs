use crate::ui::renderer::Renderer;
use clap::Parser;
use dotmatrix::cartridge::Cartridge;
use dotmatrix::error::{FrontendSnafu, GbError, LoggerInitSnafu, RomReadSnafu};
use dotmatrix::gameboy::GameBoy;
use dotmatrix::memory::ram::BootRom;
use dotmatrix::scheduler::Scheduler;
use dotmatrix::serial::{NullSink, SerialSink, StdoutSink};
use dotmatrix::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use eframe::egui::ViewportBuilder;
use eframe::NativeOptions;
use log::{info, LevelFilter};
use snafu::ResultExt;
use std::fs;
use std::path::PathBuf;

mod ui;

#[derive(Parser, Debug)]
#[command(version, about = "A DMG Game Boy emulator")]
struct Args {
    /// Cartridge image to run
    rom: PathBuf,

    /// 256-byte DMG boot ROM. Without one the machine starts in the post-boot state
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Run without opening a window
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 600)]
    frames: usize,

    /// Echo bytes written to the link port to stdout
    #[arg(long)]
    serial: bool,

    /// Run as fast as possible instead of at ~59.73 frames per second
    #[arg(long)]
    unthrottled: bool,

    /// Window scale factor
    #[arg(long, default_value_t = 4)]
    scale: usize,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn setup_logger(level: LevelFilter) -> Result<(), GbError> {
    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{} {}] {}", record.level(), record.target(), message)))
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context(LoggerInitSnafu)
}

/// Builds fresh machines from the same cartridge, so the UI can power-cycle.
#[derive(Clone)]
pub struct Machine {
    cartridge: Cartridge,
    boot_rom: Option<BootRom>,
    serial: bool,
}

impl Machine {
    pub fn power_on(&self) -> GameBoy {
        let sink: Box<dyn SerialSink> = if self.serial { Box::new(StdoutSink) } else { Box::new(NullSink) };
        GameBoy::new(self.cartridge.clone(), self.boot_rom.clone(), sink)
    }
}

fn run_headless(machine: &Machine, frames: usize) -> Result<(), GbError> {
    let mut gameboy = machine.power_on();
    for _ in 0..frames {
        gameboy.run_frame()?;
    }
    info!("Ran {} frames, {}", frames, gameboy.cpu());
    Ok(())
}

#[snafu::report]
fn main() -> Result<(), GbError> {
    let args = Args::parse();
    setup_logger(args.log_level)?;

    let cartridge = Cartridge::load(&args.rom)?;
    let title = format!("dotmatrix - {}", cartridge.header().title);
    let boot_rom = match &args.boot_rom {
        Some(path) => Some(BootRom::new(fs::read(path).context(RomReadSnafu { path })?)?),
        None => None,
    };

    let machine = Machine {
        cartridge,
        boot_rom,
        serial: args.serial,
    };

    if args.headless {
        return run_headless(&machine, args.frames);
    }

    let scheduler = Scheduler::new(machine.power_on(), !args.unthrottled);
    let size = [(SCREEN_WIDTH * args.scale) as f32, (SCREEN_HEIGHT * args.scale) as f32];
    let options = NativeOptions {
        viewport: ViewportBuilder::default().with_inner_size(size).with_resizable(false),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Box::new(Renderer::new(cc, machine, scheduler))),
    )
    .map_err(|e| FrontendSnafu { message: e.to_string() }.build())
}
