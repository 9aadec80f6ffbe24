pub mod clock;
pub mod command;
pub mod filesystem;
pub mod output;

pub use clock::{Clock, SystemClock};
pub use command::{CommandExecutor, RealCommandExecutor};
pub use filesystem::{FileSystem, RealFileSystem};
pub use output::{Output, TerminalOutput};

#[cfg(test)]
pub use clock::FixedClock;
#[cfg(test)]
pub use command::{MockCommandExecutor, MockCommandResult};
#[cfg(test)]
pub use filesystem::MockFileSystem;
#[cfg(test)]
pub use output::{MockOutput, OutputMessage};
