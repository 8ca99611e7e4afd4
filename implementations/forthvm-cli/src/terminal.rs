//! Hardware bridge for terminals: keys come from stdin, the screen is a 64x32
//! monochrome buffer printed as text.

use std::{
    fmt::Display,
    io::Read,
    sync::mpsc::{channel, Receiver, TryRecvError},
};

use forthvm::bus::HardwareBridge;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
/// One bit per pixel, most significant bit on the left.
const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;

/// Defines how the machine interacts with a terminal.
pub struct TerminalBridge {
    keys: Receiver<u8>,
    screen: Screen,
}
impl TerminalBridge {
    pub fn new(keys: Receiver<u8>) -> Self {
        Self {
            keys,
            screen: Screen::default(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }
}
impl HardwareBridge for TerminalBridge {
    fn get_key(&mut self) -> Option<u32> {
        match self.keys.try_recv() {
            Ok(key) => Some(key as u32),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::trace!("stdin is closed, no more keys");
                None
            }
        }
    }
    fn set_screen_write_address(&mut self, address: u32) {
        self.screen.cursor = address as usize % SCREEN_BYTES
    }
    fn write_screen_memory(&mut self, value: u32) {
        self.screen.pixels[self.screen.cursor] = value as u8;
        self.screen.cursor = (self.screen.cursor + 1) % SCREEN_BYTES;
    }
    fn reset(&mut self) {
        self.screen = Screen::default()
    }
}

/// Listens to stdin on a separate thread, forwarding every byte read.
pub fn spawn_stdin_reader() -> Receiver<u8> {
    let (tx, rx) = channel::<u8>();
    std::thread::spawn(move || {
        for byte in std::io::stdin().lock().bytes() {
            let Ok(byte) = byte else { break };
            if tx.send(byte).is_err() {
                break;
            }
        }
    });
    rx
}

#[derive(Clone, PartialEq, Eq)]
pub struct Screen {
    pixels: [u8; SCREEN_BYTES],
    cursor: usize,
}
impl Default for Screen {
    fn default() -> Self {
        Self {
            pixels: [0; SCREEN_BYTES],
            cursor: 0,
        }
    }
}
impl Screen {
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let byte = self.pixels[(y * SCREEN_WIDTH + x) / 8];
        byte & (0x80 >> (x % 8)) != 0
    }
}
impl Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for y in 0..SCREEN_HEIGHT {
            let row: String = (0..SCREEN_WIDTH)
                .map(|x| if self.pixel(x, y) { '#' } else { '.' })
                .collect();
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
