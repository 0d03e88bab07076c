pub mod file_io;
pub mod logging;
pub mod ode_solvers;
pub mod regularization;
pub mod stopwatch;
