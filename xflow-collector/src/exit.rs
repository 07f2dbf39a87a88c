//! Process exit codes.

use crate::commands::CommandError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments.
    pub const INVALID_ARGS: i32 = 1;
    /// IO error.
    pub const IO_ERROR: i32 = 2;
    /// Sweep, drain or flow table error.
    pub const COLLECTOR_ERROR: i32 = 3;
    /// Time base could not be established.
    pub const CLOCK_ERROR: i32 = 4;
    /// Classifier could not be loaded or attached.
    pub const BPF_ERROR: i32 = 5;
    /// Classifier could not be detached.
    pub const TEARDOWN_ERROR: i32 = 6;
    /// No network interface found.
    pub const NO_INTERFACE: i32 = 7;
    /// Interrupted by signal (128 + signal number).
    pub const SIGINT: i32 = 130;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::INVALID_ARGS,
        CommandError::Filesystem(_) | CommandError::Output(_) => codes::IO_ERROR,
        CommandError::Collector(_) | CommandError::Table(_) => codes::COLLECTOR_ERROR,
        CommandError::Clock(_) => codes::CLOCK_ERROR,
        CommandError::Bpf(_) => codes::BPF_ERROR,
        CommandError::Teardown(_) => codes::TEARDOWN_ERROR,
        CommandError::NoInterface => codes::NO_INTERFACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliError;
    use crate::collector::CollectorError;
    use crate::io::OutputWriterError;
    use xflow_bpf::{BpfError, TableError};
    use xflow_clock::ClockError;
    use xflow_fs::FsError;

    fn detach_error() -> BpfError {
        BpfError::Detach {
            interface: "eth0".to_string(),
            reason: "busy".to_string(),
        }
    }

    #[test]
    fn test_exit_code_invalid_argument() {
        let error = CommandError::InvalidArgument(CliError::InvalidTime(0));
        assert_eq!(exit_code(&error), codes::INVALID_ARGS);
    }

    #[test]
    fn test_exit_code_io() {
        let error = CommandError::Filesystem(FsError::Path("test".to_string()));
        assert_eq!(exit_code(&error), codes::IO_ERROR);

        let error = CommandError::Output(OutputWriterError::CreateDir(FsError::Path(
            "test".to_string(),
        )));
        assert_eq!(exit_code(&error), codes::IO_ERROR);
    }

    #[test]
    fn test_exit_code_collector() {
        let error = CommandError::Collector(CollectorError::Drain(TableError::Delete(
            "busy".to_string(),
        )));
        assert_eq!(exit_code(&error), codes::COLLECTOR_ERROR);

        let error = CommandError::Table(TableError::Read("gone".to_string()));
        assert_eq!(exit_code(&error), codes::COLLECTOR_ERROR);
    }

    #[test]
    fn test_exit_code_clock() {
        let error = CommandError::Clock(ClockError::Monotonic("EINVAL".to_string()));
        assert_eq!(exit_code(&error), codes::CLOCK_ERROR);
    }

    #[test]
    fn test_exit_code_bpf_and_teardown_differ() {
        let attach = CommandError::Bpf(BpfError::InsufficientPermissions);
        let teardown = CommandError::Teardown(detach_error());
        assert_eq!(exit_code(&attach), codes::BPF_ERROR);
        assert_eq!(exit_code(&teardown), codes::TEARDOWN_ERROR);
    }

    #[test]
    fn test_exit_code_no_interface() {
        assert_eq!(exit_code(&CommandError::NoInterface), codes::NO_INTERFACE);
    }

    #[test]
    fn test_exit_codes_constants() {
        assert_eq!(codes::SUCCESS, 0);
        assert_eq!(codes::INVALID_ARGS, 1);
        assert_eq!(codes::IO_ERROR, 2);
        assert_eq!(codes::COLLECTOR_ERROR, 3);
        assert_eq!(codes::CLOCK_ERROR, 4);
        assert_eq!(codes::BPF_ERROR, 5);
        assert_eq!(codes::TEARDOWN_ERROR, 6);
        assert_eq!(codes::NO_INTERFACE, 7);
        assert_eq!(codes::SIGINT, 130);
    }

    #[test]
    fn test_teardown_error_display() {
        let error = CommandError::Teardown(detach_error());
        assert_eq!(
            error.to_string(),
            "teardown failed: failed to detach XDP program from interface 'eth0': busy"
        );
    }
}
