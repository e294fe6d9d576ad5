//! `ethosu`: command-line interface for Arm Ethos-U NPUs.
//!
//! ```text
//! USAGE:
//!   ethosu info                       Hardware and driver identification
//!   ethosu invoke <payload> [-b ..]   Run a driver payload file
//!   ethosu decode <stream>            Print a command stream
//!   ethosu selftest                   Exercise the driver end to end
//! ```
//!
//! Without `--uio` every command runs against the simulated NPU.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ethosu_chip::regs;
use ethosu_driver::diagnostics::decode_command_stream;
use ethosu_driver::{
    counter_mask, BaseRegion, Driver, DriverConfig, MappedRegion, PayloadBuilder, PmuEvent,
    RunState, SimConfig, SimulatedNpu, CCNT_MASK,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ethosu", about = "Arm Ethos-U NPU CLI", version)]
struct Cli {
    /// UIO device exposing the NPU register window.
    #[arg(long, global = true, env = "ETHOSU_UIO")]
    uio: Option<PathBuf>,

    /// Size of the register window in bytes.
    #[arg(long, global = true, env = "ETHOSU_UIO_SIZE", default_value_t = 0x1000)]
    uio_size: usize,

    /// Run the NPU in the secure state.
    #[arg(long, global = true, env = "ETHOSU_SECURE")]
    secure: bool,

    /// Run the NPU at privileged level.
    #[arg(long, global = true, env = "ETHOSU_PRIVILEGED")]
    privileged: bool,

    /// Keep clock and power on between inferences.
    #[arg(long, global = true, env = "ETHOSU_POWER_ALWAYS_ON")]
    always_on: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print hardware and driver identification.
    Info,
    /// Run a driver payload file.
    Invoke {
        /// Payload file (driver-action records, little endian).
        payload: PathBuf,
        /// Base region as ADDR or ADDR:SIZE, repeatable.
        #[arg(short, long = "base", value_parser = parse_base)]
        bases: Vec<BaseRegion>,
        /// Count NPU active cycles and report them afterwards.
        #[arg(long)]
        pmu: bool,
    },
    /// Decode a raw command stream file.
    Decode {
        /// Command stream file (32-bit little-endian words).
        stream: PathBuf,
    },
    /// Run a short sequence of payloads and check the results.
    Selftest,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    if let Cmd::Decode { stream } = &cli.command {
        return cmd_decode(stream);
    }

    let drv = open(cli)?;
    match &cli.command {
        Cmd::Info => cmd_info(&drv),
        Cmd::Invoke {
            payload,
            bases,
            pmu,
        } => cmd_invoke(&drv, payload, bases, *pmu),
        Cmd::Decode { stream } => cmd_decode(stream),
        Cmd::Selftest => cmd_selftest(&drv),
    }
}

fn driver_config(cli: &Cli) -> DriverConfig {
    DriverConfig::new()
        .with_security(cli.secure, cli.privileged)
        .with_power_always_on(cli.always_on)
}

fn open(cli: &Cli) -> Result<Arc<Driver>> {
    let config = driver_config(cli);
    let Some(path) = &cli.uio else {
        tracing::info!("No UIO device given, using the simulated NPU");
        return SimulatedNpu::new(SimConfig::default())
            .connect(config)
            .context("Failed to initialize simulated NPU");
    };

    let io = MappedRegion::map_physical(path, 0, cli.uio_size)
        .with_context(|| format!("Failed to map {}", path.display()))?;
    let drv = Arc::new(Driver::init_hosted(Box::new(io), config)?);
    spawn_uio_irq(path, &drv)?;
    Ok(drv)
}

/// Forward UIO interrupts to the driver.
///
/// Writing 1 unmasks the interrupt; a 4-byte read blocks until it fires.
fn spawn_uio_irq(path: &Path, drv: &Arc<Driver>) -> Result<()> {
    let mut uio = File::options()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for interrupts", path.display()))?;
    let drv = Arc::downgrade(drv);
    thread::Builder::new()
        .name("ethosu-irq".into())
        .spawn(move || {
            let mut count = [0u8; 4];
            loop {
                if let Err(e) = uio.write_all(&1u32.to_ne_bytes()) {
                    tracing::error!("UIO unmask failed: {e}");
                    return;
                }
                if let Err(e) = uio.read_exact(&mut count) {
                    tracing::error!("UIO wait failed: {e}");
                    return;
                }
                let Some(drv) = drv.upgrade() else { return };
                drv.irq_handler();
            }
        })?;
    Ok(())
}

fn parse_base(s: &str) -> Result<BaseRegion> {
    let (addr, size) = match s.split_once(':') {
        Some((addr, size)) => (addr, Some(size)),
        None => (s, None),
    };
    let addr = parse_int(addr).with_context(|| format!("Bad base address: {addr}"))?;
    match size {
        Some(size) => {
            let size = parse_int(size).with_context(|| format!("Bad base size: {size}"))?;
            Ok(BaseRegion::new(addr, usize::try_from(size)?))
        }
        None => Ok(BaseRegion::unsized_at(addr)),
    }
}

fn parse_int(s: &str) -> Result<u64> {
    let v = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => s.parse()?,
    };
    Ok(v)
}

fn cmd_info(drv: &Driver) -> Result<()> {
    let v = drv.version();
    let (proto, state) = drv.with_device(|dev| (dev.proto(), dev.state()));

    println!(
        "Driver       : {}.{}.{}",
        v.driver.major, v.driver.minor, v.driver.patch
    );
    println!(
        "Architecture : {}.{}.{}",
        v.id.arch_major_rev, v.id.arch_minor_rev, v.id.arch_patch_rev
    );
    println!(
        "Product      : Ethos-U{} (version {}.{} status {})",
        v.id.product_major, v.id.version_major, v.id.version_minor, v.id.version_status
    );
    println!("MACs/cc      : {}", 1u32 << v.config.macs_per_cc);
    println!("SHRAM        : {} KiB", v.config.shram_size);
    println!("Cmd stream   : v{}", v.config.cmd_stream_version);
    println!("Custom DMA   : {}", v.config.custom_dma);
    println!("PROT         : {proto:#x}");
    println!("State        : {state:?}");
    println!("Always on    : {}", drv.power_always_on());
    Ok(())
}

fn cmd_invoke(drv: &Driver, path: &Path, bases: &[BaseRegion], pmu: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if pmu {
        let mut p = drv.pmu();
        p.set_event_type(0, PmuEvent::NpuActive)?;
        p.counter_enable(CCNT_MASK | counter_mask(0));
        p.enable();
    }

    drv.invoke(&bytes, bases)
        .with_context(|| format!("Invoke of {} failed", path.display()))?;
    println!("Run state    : {:?}", drv.run_state());

    if pmu {
        let mut p = drv.pmu();
        println!("Cycles       : {}", p.cycle_counter());
        println!("NPU active   : {}", p.event_counter(0)?);
    }
    Ok(())
}

fn cmd_decode(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!("{}: length {} is not a whole number of words", path.display(), bytes.len());
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    for line in decode_command_stream(&words, u32::MAX) {
        println!("{line}");
    }
    Ok(())
}

fn cmd_selftest(drv: &Driver) -> Result<()> {
    let steps: [(&str, PayloadBuilder); 3] = [
        ("nop", PayloadBuilder::new().nop()),
        ("register read", PayloadBuilder::new().read_apb_reg(regs::ID, 4)),
        (
            "command stream",
            PayloadBuilder::new().command_stream(&[0; 8]),
        ),
    ];

    for (name, builder) in steps {
        let payload = builder.build();
        drv.invoke(payload.as_bytes(), &[])
            .with_context(|| format!("Selftest step '{name}' failed"))?;
        println!("{name:<16} ok");
    }

    if drv.run_state() != RunState::Completed {
        bail!("Unexpected run state {:?}", drv.run_state());
    }
    println!("selftest passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_regions() {
        assert_eq!(parse_base("0x1000:256").unwrap(), BaseRegion::new(0x1000, 256));
        assert_eq!(parse_base("4096").unwrap(), BaseRegion::unsized_at(0x1000));
        assert!(parse_base("0xZZ").is_err());
        assert!(parse_base("0x10:").is_err());
    }

    #[test]
    fn info_and_selftest_on_simulator() {
        for args in [["ethosu", "info"], ["ethosu", "selftest"]] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(cli.uio.is_none());
            run(&cli).unwrap();
        }
    }

    #[test]
    fn decode_rejects_partial_words() {
        let path = std::env::temp_dir().join(format!("ethosu-decode-{}.bin", std::process::id()));
        std::fs::write(&path, [0u8; 6]).unwrap();
        let cli = Cli::try_parse_from(["ethosu", "decode", path.to_str().unwrap()]).unwrap();
        assert!(run(&cli).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
