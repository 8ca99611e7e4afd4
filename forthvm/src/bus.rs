//! # Hardware bridge
//! The machine reaches its keyboard and screen through the `$HWIO` primitive,
//! which forwards requests verbatim to an implementation defined bridge. It must
//! satisfy:
//! - handing out pending key codes, one at a time
//! - moving the screen write address
//! - writing values to screen memory at that address
//!
//! The core never interprets what goes through the bridge.
//!
//! `()` implements the trait as a machine with nothing plugged in.

pub trait HardwareBridge {
    // Required methods
    /// Returns the next pending key code, if any.
    fn get_key(&mut self) -> Option<u32>;
    fn set_screen_write_address(&mut self, address: u32);
    fn write_screen_memory(&mut self, value: u32);

    // Provided methods
    /// Called whenever the machine is reset.
    fn reset(&mut self) {}
}

impl HardwareBridge for () {
    fn get_key(&mut self) -> Option<u32> {
        None
    }
    fn set_screen_write_address(&mut self, _address: u32) {}
    fn write_screen_memory(&mut self, _value: u32) {}
}

impl<B: HardwareBridge + ?Sized> HardwareBridge for &mut B {
    fn get_key(&mut self) -> Option<u32> {
        (**self).get_key()
    }
    fn set_screen_write_address(&mut self, address: u32) {
        (**self).set_screen_write_address(address)
    }
    fn write_screen_memory(&mut self, value: u32) {
        (**self).write_screen_memory(value)
    }
    fn reset(&mut self) {
        (**self).reset()
    }
}
