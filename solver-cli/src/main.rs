use std::io;
use std::process::exit;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use clap::{App, Arg, ArgMatches, ErrorKind};
use solver::{
    read_cnf, Config, ConfigError, Console, DurationArg, MemoryArg, Orchestrator, SolverKind,
    Status,
};

const AVAILABLE_FORMATS: &str = "The following problem formats are accepted:\n   CNF";

const AVAILABLE_SOLVERS: &str = "The following solvers are available:\n   \
                                 auto\n   brute_force\n   cdcl\n   dpll\n   local_search";

fn main() {
    env_logger::init();
    exit(run());
}

fn run() -> i32 {
    let matches = match parse_args() {
        Ok(matches) => matches,
        Err(e) => match e.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => {
                println!("{}", e.message);
                return 0;
            }
            _ => {
                eprintln!("Error: {}", e.message);
                return 2;
            }
        },
    };

    if matches.is_present("list-solvers") {
        println!("{}", AVAILABLE_SOLVERS);
        return 0;
    }
    if matches.is_present("available-formats") {
        println!("{}", AVAILABLE_FORMATS);
        return 0;
    }

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    // the handler performs only an atomic store into this flag; the
    // orchestrator's monitor reads it
    let interrupt = Arc::new(AtomicUsize::new(0));
    if let Err(e) = signal_hook::flag::register_usize(
        signal_hook::consts::SIGINT,
        Arc::clone(&interrupt),
        signal_hook::consts::SIGINT as usize,
    ) {
        eprintln!("Error: {}", e);
        return 2;
    }

    let console = Console::new(config.verbosity);
    announce(&console, &config);

    let stdin = io::stdin();
    let expr = match read_cnf(stdin.lock()) {
        Ok(expr) => expr,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };
    log::debug!(
        "parsed {} clauses over at most {} variables",
        expr.num_clauses(),
        expr.max_var()
    );

    match Orchestrator::new(config, interrupt).run(&expr) {
        Ok((Status::Success, sol)) => {
            print!("{}", sol);
            if sol.is_valid() {
                0
            } else {
                1
            }
        }
        Ok((_, sol)) => {
            // no answer within budget: a negative solution line
            println!(
                "s {} -1 {} {}",
                sol.problem_type(),
                sol.max_var(),
                sol.num_clauses()
            );
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

fn parse_args() -> clap::Result<ArgMatches<'static>> {
    App::new("sat_solve")
        .about(
            "Solve a CNF satisfiability problem.\n\
             The problem must be provided via standard input.",
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .takes_value(true)
                .min_values(0)
                .max_values(1)
                .help(
                    "set the level of output verbosity; options are\n\
                     0: print only the solution and errors\n\
                     1: print basic orchestration info, solution, warnings, and errors\n\
                     2: print detailed orchestration info, solution, warnings, and errors",
                ),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("equivalent to '--verbose 0'"),
        )
        .arg(
            Arg::with_name("solver")
                .short("s")
                .long("solver")
                .takes_value(true)
                .help("allow only a particular algorithm to be used; see '--list-solvers'"),
        )
        .arg(
            Arg::with_name("list-solvers")
                .short("l")
                .long("list-solvers")
                .help("display the available solver algorithms and exit"),
        )
        .arg(
            Arg::with_name("available-formats")
                .short("f")
                .long("available-formats")
                .help("display the accepted problem formats and exit"),
        )
        .arg(
            Arg::with_name("incomplete")
                .short("i")
                .long("incomplete")
                .help("do not require unsatisfiability to be proven"),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .takes_value(true)
                .help("the maximum number of threads to use for solving (default is all available threads)"),
        )
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .takes_value(true)
                .help(
                    "the (approximate) maximum wall time the solvers may use; a whole number\n\
                     followed immediately by 's', 'm', or 'h' (default is '5m')",
                ),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .help(
                    "the (approximate) maximum memory the program may use; a whole number\n\
                     followed immediately by 'k', 'm', or 'g' (default is '2g')",
                ),
        )
        .get_matches_safe()
}

fn build_config(matches: &ArgMatches<'_>) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if matches.is_present("verbose") {
        config.verbosity = match matches.value_of("verbose") {
            None => 2,
            Some(v) => v.parse().map_err(|_| ConfigError::Verbosity)?,
        };
    } else if matches.is_present("quiet") {
        config.verbosity = 0;
    }

    if let Some(name) = matches.value_of("solver") {
        config.solver = name.parse::<SolverKind>()?;
    }
    if let Some(threads) = matches.value_of("threads") {
        config.threads = threads.parse().map_err(|_| ConfigError::Threads)?;
    }
    if let Some(duration) = matches.value_of("duration") {
        config.duration = duration.parse::<DurationArg>()?.0;
    }
    if let Some(memory) = matches.value_of("memory") {
        config.memory = memory.parse::<MemoryArg>()?.0;
    }
    config.incomplete = matches.is_present("incomplete");

    config.validate()?;
    Ok(config)
}

fn announce(console: &Console, config: &Config) {
    console.comment(2, &format!("The verbosity is set to {}", config.verbosity));
    console.comment(
        2,
        &format!("The solver is set to {}", config.solver.name()),
    );
    console.comment(
        2,
        &format!("The portfolio is set to use {} threads", config.threads),
    );
    if config.incomplete {
        console.comment(
            2,
            "The portfolio is allowed to never prove unsatisfiability",
        );
    }
    console.comment(
        2,
        &format!(
            "The portfolio has a time limit of {} seconds",
            config.duration.as_secs()
        ),
    );
    console.comment(
        2,
        &format!(
            "The portfolio has a memory limit of {}kB",
            config.memory / 1000
        ),
    );
}
