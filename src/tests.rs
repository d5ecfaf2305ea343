use crate::cartridge::tests::image;
use crate::cartridge::Cartridge;
use crate::error::GbError;
use crate::gameboy::{ButtonEvent, GameBoy};
use crate::joypad::Button;
use crate::lr35902::cpu::INTERRUPT_DISPATCH_CYCLES;
use crate::lr35902::registers::Flags;
use crate::memory::ram::BootRom;
use crate::memory::*;
use crate::serial::NullSink;
use crate::video::ppu::FRAME_CYCLES;
use std::sync::mpsc;

fn machine(program: &[u8]) -> GameBoy {
    let cartridge = Cartridge::from_bytes(image(0x00, program)).expect("valid image");
    GameBoy::new(cartridge, None, Box::new(NullSink))
}

fn run(gameboy: &mut GameBoy, steps: usize) {
    for _ in 0..steps {
        gameboy.step().expect("step");
    }
}

#[test]
fn starts_in_post_boot_state() {
    let gameboy = machine(&[]);
    let registers = gameboy.cpu().registers();
    assert_eq!(registers.af(), 0x01b0);
    assert_eq!(registers.bc(), 0x0013);
    assert_eq!(registers.de(), 0x00d8);
    assert_eq!(registers.hl(), 0x014d);
    assert_eq!(registers.sp, 0xfffe);
    assert_eq!(registers.pc, 0x0100);

    assert_eq!(gameboy.bus().get(0xff40), 0x91);
    assert_eq!(gameboy.bus().get(0xff47), 0xfc);
}

#[test]
fn pop_af_clears_low_nibble() {
    // ld bc, $12ff; push bc; pop af
    let mut gameboy = machine(&[0x01, 0xff, 0x12, 0xc5, 0xf1]);
    run(&mut gameboy, 3);

    let registers = gameboy.cpu().registers();
    assert_eq!(registers.af(), 0x12f0);
    assert_eq!(registers.sp, 0xfffe);
    assert_eq!(gameboy.bus().read16(0xfffc), 0x12ff);
}

#[test]
fn add_sets_half_carry_and_carry() {
    // ld a, $3c; add a, $c6
    let mut gameboy = machine(&[0x3e, 0x3c, 0xc6, 0xc6]);
    run(&mut gameboy, 2);

    let registers = gameboy.cpu().registers();
    assert_eq!(registers.a, 0x02);
    assert_eq!(registers.f, Flags::HALF_CARRY | Flags::CARRY);
}

#[test]
fn call_and_ret_use_the_stack() {
    // call $0106; halt; nop; nop; ret
    let mut gameboy = machine(&[0xcd, 0x06, 0x01, 0x76, 0x00, 0x00, 0xc9]);

    assert_eq!(gameboy.step().expect("call"), 24);
    assert_eq!(gameboy.cpu().registers().pc, 0x0106);
    assert_eq!(gameboy.cpu().registers().sp, 0xfffc);
    assert_eq!(gameboy.bus().read16(0xfffc), 0x0103);

    assert_eq!(gameboy.step().expect("ret"), 16);
    assert_eq!(gameboy.cpu().registers().pc, 0x0103);
    assert_eq!(gameboy.cpu().registers().sp, 0xfffe);
}

#[test]
fn ei_takes_effect_after_the_next_instruction() {
    // ei; nop; nop
    let mut gameboy = machine(&[0xfb, 0x00, 0x00]);
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x04);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x04);

    run(&mut gameboy, 1);
    assert!(!gameboy.cpu().ime());

    // The instruction after ei still runs before the interrupt is taken.
    run(&mut gameboy, 1);
    assert!(gameboy.cpu().ime());
    assert_eq!(gameboy.cpu().registers().pc, 0x0102);

    assert_eq!(gameboy.step().expect("dispatch"), INTERRUPT_DISPATCH_CYCLES);
    assert_eq!(gameboy.cpu().registers().pc, 0x0050);
    assert_eq!(gameboy.bus().read16(0xfffc), 0x0102);
    assert!(!gameboy.cpu().ime());
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER), 0xe0);
}

#[test]
fn di_right_after_ei_keeps_interrupts_off() {
    // ei; di; nop
    let mut gameboy = machine(&[0xfb, 0xf3, 0x00]);
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x01);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x01);

    run(&mut gameboy, 3);
    assert!(!gameboy.cpu().ime());
    assert_eq!(gameboy.cpu().registers().pc, 0x0103);
}

#[test]
fn lowest_bit_interrupt_wins() {
    // ei; nop
    let mut gameboy = machine(&[0xfb, 0x00]);
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x1f);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x14);

    run(&mut gameboy, 3);
    assert_eq!(gameboy.cpu().registers().pc, 0x0050);
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER), 0xf0);
}

#[test]
fn vblank_beats_timer() {
    // ei; nop
    let mut gameboy = machine(&[0xfb, 0x00]);
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x05);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x05);

    run(&mut gameboy, 3);
    assert_eq!(gameboy.cpu().registers().pc, 0x0040);
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER), 0xe4);
}

#[test]
fn reti_returns_with_interrupts_enabled() {
    let mut rom = image(0x00, &[0xfb, 0x00, 0x00]);
    // reti at the timer vector
    rom[0x0050] = 0xd9;
    let cartridge = Cartridge::from_bytes(rom).expect("valid image");
    let mut gameboy = GameBoy::new(cartridge, None, Box::new(NullSink));
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x04);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x04);

    run(&mut gameboy, 3);
    assert_eq!(gameboy.cpu().registers().pc, 0x0050);

    run(&mut gameboy, 1);
    assert_eq!(gameboy.cpu().registers().pc, 0x0102);
    assert!(gameboy.cpu().ime());
}

#[test]
fn undefined_opcode_leaves_pc_in_place() {
    let mut gameboy = machine(&[0xd3]);

    for _ in 0..2 {
        assert!(matches!(
            gameboy.step(),
            Err(GbError::DecoderFailure {
                opcode: 0xd3,
                address: 0x0100
            })
        ));
        assert_eq!(gameboy.cpu().registers().pc, 0x0100);
    }
}

#[test]
fn halt_idles_until_an_interrupt_is_pending() {
    // halt; nop
    let mut gameboy = machine(&[0x76, 0x00]);
    run(&mut gameboy, 1);
    assert!(gameboy.cpu().halted());

    assert_eq!(gameboy.step().expect("idle"), 4);
    assert!(gameboy.cpu().halted());
    assert_eq!(gameboy.cpu().registers().pc, 0x0101);

    // With IME off the CPU wakes and carries on without dispatching.
    gameboy.bus().set(INTERRUPT_ENABLE_REGISTER, 0x04);
    gameboy.bus().set(INTERRUPT_FLAGS_REGISTER, 0x04);
    run(&mut gameboy, 1);
    assert!(!gameboy.cpu().halted());
    assert_eq!(gameboy.cpu().registers().pc, 0x0102);
}

#[test]
fn serial_bytes_reach_the_sink() {
    // ld a, 'H'; ldh ($01), a; ld a, $81; ldh ($02), a
    let program = [0x3e, b'H', 0xe0, 0x01, 0x3e, 0x81, 0xe0, 0x02];
    let cartridge = Cartridge::from_bytes(image(0x00, &program)).expect("valid image");
    let (tx, rx) = mpsc::channel();
    let mut gameboy = GameBoy::new(cartridge, None, Box::new(tx));

    run(&mut gameboy, 4);
    assert_eq!(rx.try_recv(), Ok(b'H'));
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER) & 0x08, 0x08);
}

#[test]
fn oam_dma_copies_a_whole_page() {
    // ld a, $c0; ldh ($46), a
    let mut gameboy = machine(&[0x3e, 0xc0, 0xe0, 0x46]);
    for i in 0..0xa0u16 {
        gameboy.bus().set(WRAM_START + i, i as u8 ^ 0x5a);
    }

    run(&mut gameboy, 2);
    for i in 0..0xa0u16 {
        assert_eq!(gameboy.bus().get(OAM_START + i), i as u8 ^ 0x5a);
    }
    // The last byte of OAM is part of the transfer.
    assert_eq!(gameboy.bus().get(OAM_END), 0x9f ^ 0x5a);
}

#[test]
fn echo_ram_mirrors_work_ram() {
    let gameboy = machine(&[]);
    gameboy.bus().set(0xc123, 0x77);
    assert_eq!(gameboy.bus().get(0xe123), 0x77);
    gameboy.bus().set(0xfdff, 0x11);
    assert_eq!(gameboy.bus().get(0xddff), 0x11);
}

#[test]
fn unmapped_io_reads_open_bus() {
    let gameboy = machine(&[]);
    assert_eq!(gameboy.bus().get(0xfea0), OPEN_BUS);
    assert_eq!(gameboy.bus().get(0xff7f), OPEN_BUS);
}

#[test]
fn button_events_are_applied_on_step() {
    let mut gameboy = machine(&[0x00, 0x00]);
    gameboy.bus().set(JOYPAD_REGISTER, 0x10);
    gameboy
        .input_sender()
        .send(ButtonEvent {
            button: Button::Start,
            pressed: true,
        })
        .expect("machine alive");

    assert_eq!(gameboy.bus().get(JOYPAD_REGISTER), 0xdf);
    run(&mut gameboy, 1);
    assert_eq!(gameboy.bus().get(JOYPAD_REGISTER), 0xd7);
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER) & 0x10, 0x10);
}

#[test]
fn boot_rom_hands_over_on_ff50_write() {
    // ld a, $01; ldh ($50), a
    let mut boot = vec![0u8; BOOTROM_SIZE];
    boot[..4].copy_from_slice(&[0x3e, 0x01, 0xe0, 0x50]);
    let boot_rom = BootRom::new(boot).expect("256 bytes");

    let mut rom = image(0x00, &[]);
    rom[0] = 0xaa;
    let cartridge = Cartridge::from_bytes(rom).expect("valid image");
    let mut gameboy = GameBoy::new(cartridge, Some(boot_rom), Box::new(NullSink));

    assert_eq!(gameboy.cpu().registers().pc, 0x0000);
    assert_eq!(gameboy.bus().get(0x0000), 0x3e);

    run(&mut gameboy, 2);
    assert_eq!(gameboy.bus().get(0x0000), 0xaa);
    assert_eq!(gameboy.cpu().registers().pc, 0x0004);
}

#[test]
fn run_frame_produces_one_frame() {
    // jr -2
    let mut gameboy = machine(&[0x18, 0xfe]);
    let frames = gameboy.frame_buffer();

    let elapsed = gameboy.run_frame().expect("frame");
    assert!(elapsed >= FRAME_CYCLES);
    assert_eq!(frames.generation(), 1);
    assert_eq!(gameboy.bus().get(INTERRUPT_FLAGS_REGISTER) & 0x01, 0x01);
}
