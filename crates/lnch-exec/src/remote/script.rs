//! Shell scripts executed on the target host.
//!
//! The spawn script exports the environment, applies the core-dump limit and
//! starts the binary in its own session with output in the log file. The
//! binary's exit status lands next to the log as `<log>.exit`.
use std::{fmt::Write as _, path::Path};

use lnch_core::StopSignal;
use lnch_model::{CorePolicy, LaunchSpec};

use crate::util::{shell_join, shell_quote};

/// Exit status the spawn script uses when the binary cannot be found.
pub const NOT_FOUND: i32 = 127;

/// Runs `"$@"` with output in `$0` and records its status in `$0.exit`.
const RUNNER: &str =
    r#""$@" > "$0" 2>&1 < /dev/null; echo $? > "$0.exit.tmp"; mv -f "$0.exit.tmp" "$0.exit""#;

pub fn exit_path(log: &Path) -> String {
    format!("{}.exit", log.display())
}

pub fn spawn(spec: &LaunchSpec, log: &Path, workdir: Option<&Path>) -> String {
    let log_s = log.display().to_string();
    let log_dir = log
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".into());

    let mut s = String::new();
    let _ = writeln!(s, "set -e");
    if let Some(dir) = workdir {
        let _ = writeln!(s, "cd {}", shell_quote(&dir.display().to_string()));
    }
    let _ = writeln!(s, "mkdir -p {}", shell_quote(&log_dir));
    let _ = writeln!(s, "rm -f {}", shell_quote(&exit_path(log)));
    let _ = writeln!(s, "{}", core_limit(spec.core));
    for kv in spec.env.iter() {
        let _ = writeln!(s, "export {}={}", kv.key(), shell_quote(kv.value()));
    }
    let _ = writeln!(
        s,
        "command -v {bin} >/dev/null 2>&1 || {{ echo 'binary not found: '{bin} >&2; exit {NOT_FOUND}; }}",
        bin = shell_quote(&spec.binary)
    );

    let argv = std::iter::once(spec.binary.as_str()).chain(spec.args.iter().map(String::as_str));
    let _ = writeln!(
        s,
        "setsid sh -c {} {} {} > /dev/null 2>&1 < /dev/null &",
        shell_quote(RUNNER),
        shell_quote(&log_s),
        shell_join(argv)
    );
    let _ = writeln!(s, "echo $!");
    s
}

/// Core-size command. Enabled raises the soft limit to the hard one and never
/// tries to raise the hard limit itself, like the local backend.
pub fn core_limit(policy: CorePolicy) -> &'static str {
    match policy {
        CorePolicy::Enabled => r#"ulimit -c "$(ulimit -H -c)""#,
        CorePolicy::Disabled => "ulimit -c 0",
    }
}

/// Prints `exited <code>`, `running` or `vanished`.
///
/// The status file is checked first; an unreaped zombie still answers `kill -0`.
pub fn poll(pid: u32, log: &Path) -> String {
    let exit = shell_quote(&exit_path(log));
    format!(
        "if [ -f {exit} ]; then echo \"exited $(cat {exit})\"; \
         elif kill -0 {pid} 2>/dev/null && ! ps -o stat= -p {pid} 2>/dev/null | grep -q Z; then echo running; \
         else echo vanished; fi\n"
    )
}

/// Signal the process group, then the process, ignoring already-gone targets.
pub fn signal(pid: u32, signal: StopSignal) -> String {
    let sig = signal.as_str();
    format!("kill -s {sig} -- -{pid} 2>/dev/null || kill -s {sig} {pid} 2>/dev/null || true\n")
}

pub fn tail(log: &Path, lines: usize) -> String {
    format!(
        "tail -n {lines} {} 2>/dev/null || true\n",
        shell_quote(&log.display().to_string())
    )
}

pub fn kill_matching(pattern: &str) -> String {
    format!("pkill -f -- {} || true\n", shell_quote(pattern))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use lnch_model::{EnvironmentSpec, HostEntry, NodeId, Role};

    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            node: NodeId::Worker(0),
            host: HostEntry::new("proj5", None, Role::Worker),
            binary: "release/DenseLRExample".into(),
            args: vec!["--url".into(), "/jasper/avazu app".into()],
            env: EnvironmentSpec::parse("GLOG_logtostderr=true GLOG_v=-1").unwrap(),
            core: CorePolicy::Disabled,
        }
    }

    #[test]
    fn spawn_script_exports_env_and_limits_core() {
        let log = PathBuf::from("/tmp/lnch/s1/worker-0-proj5.log");
        let script = spawn(&spec(), &log, None);

        assert!(script.contains("mkdir -p /tmp/lnch/s1\n"));
        assert!(script.contains("ulimit -c 0\n"));
        assert!(script.contains("export GLOG_logtostderr=true\n"));
        assert!(script.contains("export GLOG_v=-1\n"));
        assert!(script.contains(
            " /tmp/lnch/s1/worker-0-proj5.log release/DenseLRExample --url '/jasper/avazu app' > /dev/null"
        ));
        assert!(script.ends_with("echo $!\n"));
    }

    #[test]
    fn enabled_core_follows_the_hard_limit() {
        let mut s = spec();
        s.core = CorePolicy::Enabled;
        let script = spawn(&s, &PathBuf::from("/tmp/x.log"), Some(Path::new("/work dir")));
        assert!(script.contains("ulimit -c \"$(ulimit -H -c)\"\n"));
        assert!(!script.contains("unlimited"));
        assert!(script.contains("cd '/work dir'\n"));
    }

    #[test]
    fn env_values_are_quoted_and_keys_are_plain_names() {
        let mut s = spec();
        s.env = EnvironmentSpec::parse("OPTS=a$(id)b HDFS=/x/y").unwrap();
        let script = spawn(&s, &PathBuf::from("/tmp/x.log"), None);

        assert!(script.contains("export OPTS='a$(id)b'\n"), "{script}");
        assert!(script.contains("export HDFS=/x/y\n"), "{script}");
        for line in script.lines().filter(|l| l.starts_with("export ")) {
            let key = line["export ".len()..].split('=').next().unwrap();
            assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'), "{line}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn core_limit_line_clamps_to_hard_limit() {
        let out = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!(
                "ulimit -c 0; ulimit -H -c 2048; {}; ulimit -c",
                core_limit(CorePolicy::Enabled)
            ))
            .output()
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "2048");
    }

    #[test]
    fn poll_checks_status_file_before_liveness() {
        let script = poll(42, Path::new("/tmp/x.log"));
        assert!(script.starts_with("if [ -f /tmp/x.log.exit ]; then echo \"exited $(cat /tmp/x.log.exit)\";"));
        assert!(script.contains("kill -0 42"));
    }

    #[test]
    fn signal_targets_group_first() {
        assert_eq!(
            signal(42, StopSignal::Term),
            "kill -s TERM -- -42 2>/dev/null || kill -s TERM 42 2>/dev/null || true\n"
        );
    }
}
