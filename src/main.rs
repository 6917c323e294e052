/// MPL - bytecode VM demo runner
use mpl::backend::bytecode::{JoinBarrier, Vm, VmConfig};
use mpl::backend::programs::{self, Program};
use std::env;
use std::process;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("MPL v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    mpl [OPTIONS] [PROGRAM]...");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -V, --version        Print version information");
    eprintln!("    -v, --verbose        Log VM calls and worker activity");
    eprintln!("    --trace              Log every executed instruction");
    eprintln!("    --config <FILE>      Read VM settings from the [vm] table of FILE");
    eprintln!("    --list               List the demo programs");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    [PROGRAM]...         Demo programs to run (default: all)");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    MPL_VM_MAX_STACK, MPL_VM_MAX_CALL_DEPTH, MPL_VM_TRACE, RUST_LOG");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    mpl");
    eprintln!("    mpl hello loop");
    eprintln!("    mpl --trace condition");
}

fn print_version() {
    println!("MPL {}", VERSION);
}

fn print_programs() {
    for program in programs::all() {
        println!("{:<12} {}", program.name, program.description);
    }
}

struct Options {
    programs: Vec<String>,
    config: Option<String>,
    verbose: bool,
    trace: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut programs = Vec::new();
    let mut config = None;
    let mut verbose = false;
    let mut trace = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-V" | "--version" => {
                print_version();
                process::exit(0);
            }
            "--list" => {
                print_programs();
                process::exit(0);
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "--trace" => {
                trace = true;
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing file after --config".to_string());
                }
                config = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                programs.push(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options {
        programs,
        config,
        verbose,
        trace,
    })
}

fn init_logging(options: &Options) {
    let default_level = if options.trace {
        "trace"
    } else if options.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(options: &Options) -> Result<VmConfig, String> {
    let mut config = match &options.config {
        Some(path) => VmConfig::load(path).map_err(|e| format!("{}: {}", path, e))?,
        None => VmConfig::default(),
    };
    config = config.with_env_overrides();
    if options.trace {
        config.trace = true;
    }
    Ok(config)
}

fn select_programs(names: &[String]) -> Result<Vec<&'static Program>, String> {
    if names.is_empty() {
        return Ok(programs::all().iter().collect());
    }
    names
        .iter()
        .map(|name| {
            programs::find(name)
                .ok_or_else(|| format!("Unknown program: {} (try --list)", name))
        })
        .collect()
}

/// Run one program and wait for every worker it started
fn run_program(vm: &Vm, program: &Program) -> bool {
    println!("==== {} ====", program.name);

    let block = program.build();
    let barrier = JoinBarrier::shared();
    let result = vm.run(&block, Some(&barrier));
    barrier.wait();

    let mut ok = true;
    match result {
        Ok(Some(value)) => debug!(program = program.name, %value, "returned"),
        Ok(None) => debug!(program = program.name, "halted"),
        Err(e) => {
            error!(program = program.name, error = %e, "run failed");
            ok = false;
        }
    }
    for failure in barrier.take_failures() {
        eprintln!("Error: {}", failure);
        ok = false;
    }
    ok
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    init_logging(&options);

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let selected = match select_programs(&options.programs) {
        Ok(selected) => selected,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let vm = Vm::with_config(config);
    let mut failed = false;
    for program in selected {
        if !run_program(&vm, program) {
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}
