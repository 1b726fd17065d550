pub mod env;
pub mod history;
pub mod launcher;
pub mod process;

pub use env::{CondaResolver, EnvironmentResolver, ResolvedEnvironment};
pub use history::RunHistory;
pub use launcher::Launcher;
pub use process::{ProcessExit, ProcessSpawner, ProcessSpec, TokioSpawner};
