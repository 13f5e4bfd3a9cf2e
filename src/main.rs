//! # rrsim Demo Driver
//!
//! Headless stand-in for the interactive front end. Each tick follows the
//! same order a terminal UI would:
//!
//! 1. **Input**: scripted actions (spawn a process every `--spawn-every`
//!    ticks, occasionally block or unblock a random row)
//! 2. **Schedule**: `kernel.schedule()`
//! 3. **Render**: process table page, memory map, status bar (every
//!    `--report-every` ticks)
//! 4. **Perform**: `kernel.perform()`
//!
//! ```text
//! rrsim --ticks 500 --seed 7 --ram 65536 --report-every 50 -vv
//! ```

use std::process;
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};
use log::{LevelFilter, Metadata, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rrsim::config::{RAM_CAPACITY, SWAP_CAPACITY};
use rrsim::memory::BlockKind;
use rrsim::{Kernel, SimConfig, TickEvent};

/// Ticks between scripted block/unblock actions.
const TOGGLE_EVERY: u64 = 7;

/// Widest memory map line, in blocks.
const MAP_WIDTH: usize = 64;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

struct Options {
    ticks: u64,
    spawn_every: u64,
    report_every: u64,
    config: SimConfig,
}

fn parse_or<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T, String> {
    match matches.value_of(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("invalid value for --{}: {}", name, raw)),
        None => Ok(default),
    }
}

fn parse_options(matches: &ArgMatches) -> Result<Options, String> {
    let mut config = SimConfig::new()
        .with_ram(parse_or(matches, "ram", RAM_CAPACITY)?)
        .with_swap(parse_or(matches, "swap", SWAP_CAPACITY)?);
    if matches.is_present("seed") {
        config = config.with_seed(parse_or(matches, "seed", 0)?);
    }

    let spawn_every = parse_or(matches, "spawn-every", 3)?;
    if spawn_every == 0 {
        return Err(String::from("--spawn-every must be positive"));
    }

    Ok(Options {
        ticks: parse_or(matches, "ticks", 200)?,
        spawn_every,
        report_every: parse_or(matches, "report-every", 0)?,
        config,
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_table(kernel: &Kernel) {
    let table = kernel.table();
    println!("  {:>5} {:<12} {:>9} {:<10} {:>9} {:>9} {:>7}", "PID", "Name", "Memory", "State", "CPU", "Remains", "Quantum");
    for (row, process) in table.visible().iter().enumerate() {
        let marker = if kernel.cursor() == Some(table.first() + row) { '<' } else { ' ' };
        println!("  {} {}", process, marker);
    }
}

fn render_memory_map(kernel: &Kernel) {
    let line: String = kernel
        .memory_blocks()
        .iter()
        .take(MAP_WIDTH)
        .map(|b| match b.kind {
            BlockKind::Occupied => '#',
            BlockKind::Hole => '.',
        })
        .collect();
    let more = if kernel.memory_blocks().len() > MAP_WIDTH { "..." } else { "" };
    println!("  map [{}{}]", line, more);
}

fn render_status(kernel: &Kernel) {
    let stats = kernel.memory_stats();
    let percent = |used: usize, total: usize| {
        if total == 0 {
            0.0
        } else {
            used as f64 * 100.0 / total as f64
        }
    };
    println!(
        "  tick {} | processes {} | ram {}/{} ({:.1}%) | swap {}/{} ({:.1}%) | holes {} (largest {})",
        kernel.ticks(),
        kernel.processes().len(),
        stats.occupied_ram,
        stats.ram_capacity,
        percent(stats.occupied_ram, stats.ram_capacity),
        stats.occupied_swap,
        stats.swap_capacity,
        percent(stats.occupied_swap, stats.swap_capacity),
        stats.hole_count,
        stats.largest_hole,
    );
}

fn render(kernel: &Kernel) {
    render_table(kernel);
    render_memory_map(kernel);
    render_status(kernel);
    println!();
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Totals {
    finished: u64,
    swapped_out: u64,
    killed: u64,
    idle: u64,
}

fn run(options: Options) -> Result<Totals, String> {
    let mut kernel = Kernel::new(options.config).map_err(|err| err.to_string())?;
    let mut script = match options.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let mut totals = Totals::default();

    for tick in 0..options.ticks {
        // Input
        if tick % options.spawn_every == 0 {
            kernel.create_process();
        }
        if tick % TOGGLE_EVERY == TOGGLE_EVERY - 1 && kernel.processes().len() > 1 {
            let row = script.gen_range(1..kernel.processes().len());
            let blocked = !kernel.processes()[row].is_blocked();
            if let Err(err) = kernel.set_process_blocked(row, blocked) {
                log::warn!("[demo] toggle row {}: {}", row, err);
            }
        }

        kernel.schedule();

        if options.report_every > 0 && tick % options.report_every == 0 {
            render(&kernel);
        }

        match kernel.perform() {
            TickEvent::Finished { .. } => totals.finished += 1,
            TickEvent::SwappedOut { .. } => totals.swapped_out += 1,
            TickEvent::Killed { .. } => totals.killed += 1,
            TickEvent::Idle | TickEvent::Skipped { .. } => totals.idle += 1,
            TickEvent::Preempted { .. } => {}
        }
    }

    render(&kernel);
    Ok(totals)
}

fn main() {
    let matches = App::new("rrsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Round-robin scheduler with growing quantum over a first-fit memory manager")
        .arg(Arg::with_name("ticks").long("ticks").takes_value(true).help("Ticks to simulate [default: 200]"))
        .arg(Arg::with_name("seed").long("seed").takes_value(true).help("Seed for a reproducible run"))
        .arg(Arg::with_name("spawn-every").long("spawn-every").takes_value(true).help("Create a process every N ticks [default: 3]"))
        .arg(Arg::with_name("ram").long("ram").takes_value(true).help("RAM capacity in blocks"))
        .arg(Arg::with_name("swap").long("swap").takes_value(true).help("Swap capacity in blocks"))
        .arg(Arg::with_name("report-every").long("report-every").takes_value(true).help("Render every N ticks (0: only at the end)"))
        .arg(Arg::with_name("verbose").short("v").multiple(true).help("Log more (repeat for debug/trace)"))
        .get_matches();

    init_logging(matches.occurrences_of("verbose"));

    let options = match parse_options(&matches) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("rrsim: {}", message);
            process::exit(2);
        }
    };

    match run(options) {
        Ok(totals) => {
            println!(
                "finished {} | swapped out {} | killed {} | idle ticks {}",
                totals.finished, totals.swapped_out, totals.killed, totals.idle
            );
            log::info!("[demo] done");
        }
        Err(message) => {
            eprintln!("rrsim: {}", message);
            process::exit(2);
        }
    }
}
