use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Which solver algorithms the portfolio may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverKind {
    /// Complete solvers on a power-of-two share of the threads, local
    /// search on the rest.
    Auto,
    Dpll,
    Cdcl,
    LocalSearch,
    BruteForce,
}

impl SolverKind {
    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Auto => "auto",
            SolverKind::Dpll => "dpll",
            SolverKind::Cdcl => "cdcl",
            SolverKind::LocalSearch => "local_search",
            SolverKind::BruteForce => "brute_force",
        }
    }
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<SolverKind, ConfigError> {
        match s {
            "auto" => Ok(SolverKind::Auto),
            "dpll" => Ok(SolverKind::Dpll),
            "cdcl" => Ok(SolverKind::Cdcl),
            "local_search" => Ok(SolverKind::LocalSearch),
            "brute_force" => Ok(SolverKind::BruteForce),
            _ => Err(ConfigError::UnknownSolver(s.to_string())),
        }
    }
}

/// Ways the portfolio configuration can be rejected. All of these abort
/// before solving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the requested solver does not exist: {0}")]
    UnknownSolver(String),
    #[error("the provided maximum duration is incorrectly formatted.")]
    InvalidDuration,
    #[error("the provided maximum memory usage is incorrectly formatted.")]
    InvalidMemory,
    #[error("valid verbosity settings are 0, 1, or 2.")]
    Verbosity,
    #[error("the maximum number of threads must be strictly positive.")]
    Threads,
    #[error("one or more program options appears more than once.")]
    RepeatedOption,
}

fn split_unit(s: &str) -> Option<(u64, char)> {
    let unit = s.chars().last()?;
    let count = s[..s.len() - unit.len_utf8()].parse::<u64>().ok()?;
    Some((count, unit))
}

/// A wall-clock budget written as a whole number followed by `s`, `m`,
/// or `h`, e.g. `90s` or `5m`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationArg(pub Duration);

impl FromStr for DurationArg {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<DurationArg, ConfigError> {
        let (count, unit) = split_unit(s).ok_or(ConfigError::InvalidDuration)?;
        let secs = match unit {
            's' => count,
            'm' => count * 60,
            'h' => count * 3600,
            _ => return Err(ConfigError::InvalidDuration),
        };
        Ok(DurationArg(Duration::from_secs(secs)))
    }
}

/// A memory budget written as a whole number followed by `k`, `m`, or
/// `g`, e.g. `512m` or `2g`. Decimal units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryArg(pub u64);

impl FromStr for MemoryArg {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<MemoryArg, ConfigError> {
        let (count, unit) = split_unit(s).ok_or(ConfigError::InvalidMemory)?;
        let bytes = match unit {
            'k' => count * 1_000,
            'm' => count * 1_000_000,
            'g' => count * 1_000_000_000,
            _ => return Err(ConfigError::InvalidMemory),
        };
        Ok(MemoryArg(bytes))
    }
}

/// Portfolio configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Portfolio composition.
    pub solver: SolverKind,
    /// Total worker budget.
    pub threads: usize,
    /// Wall-clock budget.
    pub duration: Duration,
    /// Virtual-memory ceiling in bytes.
    pub memory: u64,
    /// 0 = solution and errors only, 1 = basic orchestration info,
    /// 2 = detailed orchestration info.
    pub verbosity: u8,
    /// Permission to return without proving unsatisfiability. Has no
    /// effect while local search is already part of the portfolio.
    pub incomplete: bool,
    /// Master seed for the per-worker random number generators; a fixed
    /// seed makes multi-worker runs reproducible.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            solver: SolverKind::Auto,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            duration: Duration::from_secs(5 * 60),
            memory: 2_000_000_000,
            verbosity: 1,
            incomplete: false,
            seed: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Threads);
        }
        if self.verbosity > 2 {
            return Err(ConfigError::Verbosity);
        }
        Ok(())
    }
}

/// Verbosity-gated user messaging. Diagnostic comments go to standard
/// output prefixed `c ` so they interleave with the SOL stream; warnings
/// go to standard error.
#[derive(Clone, Debug)]
pub struct Console {
    verbosity: u8,
}

impl Console {
    pub fn new(verbosity: u8) -> Console {
        Console { verbosity }
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn comment(&self, level: u8, message: &str) {
        if level <= self.verbosity {
            println!("c {}", message);
        }
    }

    pub fn warn(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }
}
