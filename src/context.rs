use crate::traits::{
    Clock, CommandExecutor, FileSystem, Output, RealCommandExecutor, RealFileSystem, SystemClock,
    TerminalOutput,
};
#[cfg(test)]
use crate::traits::{FixedClock, MockCommandExecutor, MockFileSystem, MockOutput};
use std::sync::Arc;

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub fs: Arc<dyn FileSystem>,
    pub output: Arc<dyn Output>,
    pub command: Arc<dyn CommandExecutor>,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    /// Context with real implementations
    pub fn new() -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            output: Arc::new(TerminalOutput),
            command: Arc::new(RealCommandExecutor::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Context with mock implementations
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            fs: Arc::new(MockFileSystem::new()),
            output: Arc::new(MockOutput::new()),
            command: Arc::new(MockCommandExecutor::new()),
            clock: Arc::new(FixedClock::new(
                chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
                chrono::Duration::seconds(1),
            )),
        }
    }

    /// Test context with specific mock implementations
    #[cfg(test)]
    pub fn test_with(
        fs: Arc<dyn FileSystem>,
        output: Arc<dyn Output>,
        command: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            fs,
            output,
            command,
            ..Self::test()
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            output: Arc::clone(&self.output),
            command: Arc::clone(&self.command),
            clock: Arc::clone(&self.clock),
        }
    }
}
