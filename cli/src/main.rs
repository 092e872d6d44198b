use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use hookcat::Session;
use protohook::{FileHook, HookConfig, MemHook};
use tracing::{error, info};

const USAGE: &str = "usage: hookcat [--mem] <src> <dst>";

struct Args {
    mem: bool,
    src: String,
    dst: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Option<Args> {
    let mut mem = false;
    let mut paths = Vec::new();
    for arg in args {
        if arg == "--mem" {
            mem = true;
        } else {
            paths.push(arg);
        }
    }
    let [src, dst]: [String; 2] = paths.try_into().ok()?;
    Some(Args { mem, src, dst })
}

/// Copy through the file hook, straight on disk
fn copy_on_disk(session: &Session, args: &Args) -> Result<(), Box<dyn Error>> {
    session.install("file", Arc::new(FileHook::new()))?;
    session.copy("file", &args.src, &args.dst)?;
    Ok(())
}

/// Load `src` into a mem hook, copy inside it, then save `dst`
fn copy_in_memory(session: &Session, args: &Args) -> Result<(), Box<dyn Error>> {
    let hook = Arc::new(MemHook::new());
    hook.add_file(args.src.clone(), std::fs::read(Path::new(&args.src))?);
    session.install("file", hook.clone())?;

    session.copy("file", &args.src, &args.dst)?;

    let content = hook.get_file(&args.dst).unwrap_or_default();
    std::fs::write(Path::new(&args.dst), content)?;
    Ok(())
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = HookConfig::load()?;
    info!(?config, "configuration");

    let session = Session::new(config);
    if args.mem {
        copy_in_memory(&session, args)
    } else {
        copy_on_disk(&session, args)
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "hookcat failed");
            ExitCode::FAILURE
        }
    }
}
