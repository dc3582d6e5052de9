//! Verdicts from exit status
//!
//! The sandbox image reports resource breaches through the exit code of the
//! program (128 + signal) and through messages on stderr. Some codes are
//! ambiguous, so rules are evaluated in order and the first match wins.

use crate::types::Verdict;

/// 128 + SIGXFSZ: file size limit hit
pub const EXIT_FILE_SIZE_EXCEEDED: i32 = 153;

/// 128 + SIGXCPU: CPU time limit hit
pub const EXIT_CPU_TIME_EXCEEDED: i32 = 152;

/// 128 + SIGKILL: killed by the sandbox or the kernel
pub const EXIT_KILLED: i32 = 137;

/// Outcome of one sandbox run before output comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Exited cleanly; comparison decides between AC and WA
    Ready,
    /// Terminal verdict, no comparison
    Verdict(Verdict),
}

/// Map an exit code and captured stderr to a [`Classification`]
pub fn classify_exit(exit_code: i32, stderr: &str) -> Classification {
    if exit_code == 0 {
        return Classification::Ready;
    }

    let stderr = stderr.to_lowercase();
    let mentions_time = stderr.contains("time limit") || stderr.contains("timeout");

    let verdict = if exit_code == EXIT_FILE_SIZE_EXCEEDED || stderr.contains("file too large") {
        Verdict::OutputLimitExceeded
    } else if exit_code == EXIT_CPU_TIME_EXCEEDED || mentions_time {
        Verdict::TimeLimitExceeded
    } else if exit_code == EXIT_KILLED
        || stderr.contains("out of memory")
        || stderr.contains("oom")
    {
        Verdict::MemoryLimitExceeded
    } else {
        Verdict::RuntimeError
    };

    Classification::Verdict(verdict)
}
