/// The enumeration fallback solver
pub mod bruteforce;
/// Cooperative cancellation for solver workers
pub mod cancel;
/// The conflict-driven clause-learning solver
pub mod cdcl;
/// The CNF representation of a formula
pub mod cnf;
/// Portfolio configuration and user messaging
pub mod config;
/// The CNF-format problem reader
pub mod dimacs;
mod divide;
/// The DPLL solver
pub mod dpll;
/// The portfolio orchestrator
pub mod orchestrator;
mod resource;
/// The solution record and the SOL format
pub mod solution;
/// The solution checker
pub mod verify;
/// The stochastic local-search solver
pub mod walksat;

pub use bruteforce::BruteForce;
pub use cancel::CancelToken;
pub use cdcl::Cdcl;
pub use cnf::{ClauseId, Literal, MissingAssignment, Variable, CNF};
pub use config::{Config, ConfigError, Console, DurationArg, MemoryArg, SolverKind};
pub use dimacs::{read_cnf, InputError};
pub use dpll::Dpll;
pub use orchestrator::{Orchestrator, RuntimeError, Status};
pub use solution::{read_solution, ProblemType, SolError, Solution};
pub use verify::{verify_solution, VerifyError};
pub use walksat::WalkSat;
