mod explain;
mod kill;
mod launch;

pub use explain::ExplainCommand;
pub use kill::KillCommand;
pub use launch::LaunchCommand;
