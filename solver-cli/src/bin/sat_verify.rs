use std::fs::File;
use std::io::{self, BufReader};
use std::process::exit;

use clap::{App, Arg, ErrorKind};
use solver::{read_cnf, read_solution, verify_solution};

const AVAILABLE_FORMATS: &str = "The following problem formats are accepted:\n   CNF";

fn main() {
    env_logger::init();
    exit(run());
}

fn run() -> i32 {
    let matches = App::new("sat_verify")
        .about(
            "Verify the solution to a CNF satisfiability problem.\n\
             The problem must be provided via standard input.",
        )
        .arg(
            Arg::with_name("solution")
                .short("s")
                .long("solution")
                .takes_value(true)
                .required_unless("available-formats")
                .help("verify the solution at the provided file path"),
        )
        .arg(
            Arg::with_name("available-formats")
                .short("f")
                .long("available-formats")
                .help("display the accepted problem formats and exit"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("suppress all (non-error) output"),
        )
        .get_matches_safe();

    let matches = match matches {
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

    if matches.is_present("available-formats") {
        println!("{}", AVAILABLE_FORMATS);
        return 0;
    }
    let quiet = matches.is_present("quiet");

    let path = match matches.value_of("solution") {
        Some(path) => path,
        None => {
            eprintln!("Error: a path to a solution file was not provided");
            return 2;
        }
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("Error: could not open file; check that file path is correct");
            return 2;
        }
    };

    let sol = match read_solution(BufReader::new(file)) {
        Ok(sol) => sol,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let stdin = io::stdin();
    let expr = match read_cnf(stdin.lock()) {
        Ok(expr) => expr,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    match verify_solution(&sol, &expr) {
        Ok(true) => {
            if !quiet {
                println!("c the proposed solution satisfies the problem");
            }
            0
        }
        Ok(false) => {
            if !quiet {
                println!("c the proposed solution does not satisfy the problem");
            }
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}
