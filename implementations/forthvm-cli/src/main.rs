use std::{
    fs::File,
    io::BufReader,
    num::ParseIntError,
    path::PathBuf,
    thread::sleep,
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use clap::Parser;
use forthvm::{
    bus::HardwareBridge,
    config::{MachineConfig, CYCLES_PER_FRAME},
    machine::{Breakpoints, ForthMachine, StopReason},
};

mod terminal;
use terminal::{spawn_stdin_reader, TerminalBridge};

/// Runs a raw forthvm image in the terminal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Arguments {
    /// Raw binary image
    image: PathBuf,

    /// Address the image is loaded at and relocated to
    #[arg(long, default_value = "0", value_parser = parse_address)]
    base: u32,

    /// Stop after this many frames. Runs until a breakpoint otherwise
    #[arg(long)]
    frames: Option<u64>,

    /// Stop when the program counter reaches this address. Can be given twice
    #[arg(long = "break", value_parser = parse_address)]
    breakpoints: Vec<u32>,

    /// Instructions executed per frame
    #[arg(long, default_value_t = CYCLES_PER_FRAME)]
    cycles_per_frame: u32,

    /// Print the first N instructions executed
    #[arg(long, default_value_t = 0)]
    trace: usize,

    /// Run frames back to back instead of keeping to the frame rate
    #[arg(long)]
    no_pacing: bool,

    /// Print the screen when stopping
    #[arg(long)]
    screen: bool,

    /// Print debug logs and the machine state when stopping
    #[arg(short, long)]
    verbose: bool,
}

/// Parses addresses written in decimal, or hexadecimal with a `0x` prefix.
fn parse_address(address: &str) -> Result<u32, ParseIntError> {
    match address.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => address.parse(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "warn" }),
    )
    .init();

    if args.breakpoints.len() > 2 {
        bail!("at most two breakpoints can be set, got {}", args.breakpoints.len());
    }
    let breakpoints: Breakpoints = args.breakpoints.iter().copied().collect();

    let config = MachineConfig::default()
        .with_cycles_per_frame(args.cycles_per_frame)
        .with_load_base(args.base);
    let mut machine = ForthMachine::new(config, TerminalBridge::new(spawn_stdin_reader()));

    let image = File::open(&args.image)
        .with_context(|| format!("could not open {}", args.image.display()))?;
    machine
        .load_image(BufReader::new(image))
        .with_context(|| format!("could not load {}", args.image.display()))?;
    machine.reset();

    for traced in machine.trace().take(args.trace) {
        println!("{traced}");
    }

    let started = Instant::now();
    let mut frames = 0u64;
    let stopped_on_breakpoint = loop {
        if args.frames.is_some_and(|limit| frames >= limit) {
            break false;
        }
        match machine.execute(&breakpoints) {
            StopReason::Frame { rate } => {
                frames += 1;
                if !args.no_pacing && rate != 0 {
                    let due = started + Duration::from_secs_f64(frames as f64 / rate as f64);
                    if let Some(wait) = due.checked_duration_since(Instant::now()) {
                        sleep(wait)
                    }
                }
            }
            StopReason::Breakpoint => break true,
        }
    };
    log::info!("stopped after {frames} frames, {:?}", started.elapsed());

    if stopped_on_breakpoint {
        println!("breakpoint reached at {:05x}", machine.program_counter());
    }
    if stopped_on_breakpoint || args.verbose {
        print_machine(&machine);
    }
    if args.screen {
        print!("{}", machine.bridge().screen());
    }
    Ok(())
}

/// Prints registers, both stacks and the code around the program counter.
fn print_machine<B: HardwareBridge>(machine: &ForthMachine<B>) {
    println!("{}", machine.status());
    let stack = |words: &mut dyn Iterator<Item = u32>| {
        words
            .take(8)
            .map(|word| format!("{word:08x}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    println!(
        "DATA   ({}) {}",
        machine.data_stack_depth(),
        stack(&mut machine.data_stack())
    );
    println!(
        "RETURN ({}) {}",
        machine.return_stack_depth(),
        stack(&mut machine.return_stack())
    );
    for offset in 0..8 {
        let address = machine.program_counter().wrapping_add(offset * 4);
        println!(
            "{}{:05x}  {:08x}  {}",
            if offset == 0 { ">" } else { " " },
            address & 0xffffc,
            machine.read_memory(address),
            machine.disassemble(address)
        );
    }
    if let Some(target) = machine.step_over_target() {
        println!("step over: {target:05x}");
    }
}
