//! Errors the host can recover from. Misaligned word accesses made by running
//! code are not among them: those halt the machine, see [`ForthMachine`](crate::machine::ForthMachine).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image of at least {size} bytes does not fit in memory when loaded at {base:#07x}")]
    TooLarge { size: usize, base: u32 },
}
