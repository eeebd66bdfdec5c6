use std::path::PathBuf;

use console::Console;
use vm::{Ls8, Step};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

/// LS-8 runner
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Program image to load and execute
    image: PathBuf,

    /// Print machine state to stderr before every instruction
    #[clap(long)]
    trace: bool,
}

fn run_traced(vm: &mut Ls8, dev: &mut Console) -> Result<(), vm::Error> {
    loop {
        eprintln!("TRACE: {}", vm.trace());
        if vm.step(dev)? == Step::Halted {
            break Ok(());
        }
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("LS8_LOG", "info")
        .write_style_or("LS8_LOG", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let image = console::read_image(&args.image)
        .with_context(|| format!("failed to load {:?}", args.image))?;
    anyhow::ensure!(
        image.len() <= vm::RAM_SIZE,
        "image is {} bytes, but RAM holds only {}",
        image.len(),
        vm::RAM_SIZE
    );

    let mut vm = Ls8::new(&image);
    let mut dev = Console::new();

    let start = std::time::Instant::now();
    let result = if args.trace {
        run_traced(&mut vm, &mut dev)
    } else {
        vm.run(&mut dev)
    };
    // Flush whatever was printed before a fatal error surfaces
    dev.flush()?;
    result.context("execution failed")?;
    info!("halted in {:?}", start.elapsed());

    Ok(())
}
