use crate::Machine;
use dotmatrix::gameboy::ButtonEvent;
use dotmatrix::joypad::Button;
use dotmatrix::scheduler::Scheduler;
use dotmatrix::video::frame::FrameBuffer;
use dotmatrix::video::palette::Color;
use dotmatrix::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use eframe::egui::{vec2, Align2, CentralPanel, Color32, ColorImage, Context, Image, Key, TextureHandle, TextureOptions, Window};
use eframe::{App, CreationContext, Frame};
use log::{error, info, warn};
use std::sync::mpsc::Sender;

const KEYS: usize = 8;
const KEYMAP: [(Key, Button); KEYS] = [
    (Key::ArrowUp, Button::Up),
    (Key::ArrowDown, Button::Down),
    (Key::ArrowLeft, Button::Left),
    (Key::ArrowRight, Button::Right),
    (Key::A, Button::A),
    (Key::S, Button::B),
    (Key::Enter, Button::Start),
    (Key::Backspace, Button::Select),
];

pub struct Renderer {
    screen_texture: TextureHandle,
    machine: Machine,
    scheduler: Scheduler,
    frame_buffer: FrameBuffer,
    input: Sender<ButtonEvent>,
    held: [bool; KEYS],
    shown_generation: u64,
}

impl Renderer {
    pub fn new(cc: &CreationContext, machine: Machine, mut scheduler: Scheduler) -> Renderer {
        let screen_texture = cc.egui_ctx.load_texture(
            "screen_texture",
            ColorImage::new([SCREEN_WIDTH, SCREEN_HEIGHT], Color32::BLACK),
            TextureOptions::NEAREST,
        );

        // The scheduler was just built, so the machine is still at home.
        let (frame_buffer, input) = match scheduler.gameboy() {
            Some(gameboy) => (gameboy.frame_buffer(), gameboy.input_sender()),
            None => {
                let gameboy = machine.power_on();
                let handles = (gameboy.frame_buffer(), gameboy.input_sender());
                if let Err(e) = scheduler.replace(gameboy) {
                    warn!("{}", e);
                }
                handles
            }
        };

        Renderer {
            screen_texture,
            machine,
            scheduler,
            frame_buffer,
            input,
            held: [false; KEYS],
            shown_generation: 0,
        }
    }

    fn update_screen(&mut self) {
        let generation = self.frame_buffer.generation();
        if generation == self.shown_generation {
            return;
        }
        self.shown_generation = generation;

        let pixels = self.frame_buffer.with_frame(|frame| {
            frame
                .iter()
                .map(|shade| {
                    let color: Color = (*shade).into();
                    Color32::from_rgba_premultiplied(color[0], color[1], color[2], 255)
                })
                .collect::<Vec<Color32>>()
        });

        let image = ColorImage {
            size: [SCREEN_WIDTH, SCREEN_HEIGHT],
            pixels,
        };

        self.screen_texture.set(image, TextureOptions::NEAREST);
    }

    fn handle_input(&mut self, ctx: &Context) {
        let (toggle, power_cycle, down) = ctx.input(|i| {
            let mut down = [false; KEYS];
            for (held, (key, _)) in down.iter_mut().zip(KEYMAP.iter()) {
                *held = i.key_down(*key);
            }
            (i.key_pressed(Key::Space), i.key_pressed(Key::F5), down)
        });

        for (index, (_, button)) in KEYMAP.iter().enumerate() {
            if down[index] != self.held[index] {
                self.held[index] = down[index];
                let event = ButtonEvent {
                    button: *button,
                    pressed: down[index],
                };
                if self.input.send(event).is_err() {
                    warn!("Machine dropped {} event", button);
                }
            }
        }

        if toggle {
            if let Err(e) = self.scheduler.toggle() {
                error!("{}", e);
            }
        }

        if power_cycle {
            self.power_cycle();
        }
    }

    fn power_cycle(&mut self) {
        info!("Power cycling");
        let was_running = self.scheduler.is_running();

        let gameboy = self.machine.power_on();
        self.frame_buffer = gameboy.frame_buffer();
        self.input = gameboy.input_sender();
        self.held = [false; KEYS];
        self.shown_generation = 0;

        if let Err(e) = self.scheduler.replace(gameboy) {
            error!("{}", e);
        }
        if was_running {
            self.scheduler.start();
        }
    }
}

impl App for Renderer {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        self.handle_input(ctx);
        self.update_screen();

        if !self.scheduler.is_running() {
            Window::new("Controls")
                .anchor(Align2::CENTER_CENTER, vec2(0.0, 0.0))
                .collapsible(false)
                .show(ctx, |ui| {
                    ui.label("Arrow keys to move");
                    ui.label("A and S to interact");
                    ui.label("Enter to start");
                    ui.label("Backspace to select");
                    ui.separator();
                    ui.label("Press Space to start/stop emulation");
                    ui.label("Press F5 to power cycle");
                });
        }

        CentralPanel::default().show(ctx, |ui| {
            let image = Image::new(&self.screen_texture);
            let image = image.fit_to_exact_size(ui.ctx().screen_rect().size());
            image.paint_at(ui, ui.ctx().screen_rect());
        });

        ctx.request_repaint();
    }
}
