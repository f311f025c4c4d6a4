use std::process::ExitStatus;

use lnch_core::{ProcessExit, StopSignal};

/// Quote `s` for a POSIX shell. Safe words are returned unchanged.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if safe {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Join argv into one shell-safe command line.
pub fn shell_join<'a>(argv: impl IntoIterator<Item = &'a str>) -> String {
    argv.into_iter()
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interpret a shell `$?`: values above 128 mean "killed by signal N".
pub fn exit_from_code(code: i32) -> ProcessExit {
    if (129..=192).contains(&code) {
        ProcessExit::Signaled(code - 128)
    } else {
        ProcessExit::Code(code)
    }
}

pub fn exit_from_status(status: ExitStatus) -> ProcessExit {
    if let Some(code) = status.code() {
        return ProcessExit::Code(code);
    }
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map_or(ProcessExit::Vanished, ProcessExit::Signaled)
        } else {
            ProcessExit::Vanished
        }
    }
}

/// Deliver `signal` to the process group led by `pid`, falling back to the
/// process itself.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: StopSignal) -> std::io::Result<()> {
    let sig = match signal {
        StopSignal::Term => libc::SIGTERM,
        StopSignal::Kill => libc::SIGKILL,
    };
    let pid = pid as libc::pid_t;

    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // already gone
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: StopSignal) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "process signals need a unix host",
    ))
}

/// Last `lines` lines of `text`.
pub fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
