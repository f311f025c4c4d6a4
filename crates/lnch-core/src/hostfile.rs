//! Hostfile parsing.
//!
//! ## Format
//!
//! One host per line; blank lines and everything after `#` are ignored.
//!
//! ```text
//! # address[:port] [port] [scheduler|worker]
//! proj10:33224
//! proj5
//! proj6 worker
//! [fe80::1]:4000
//! ```
//!
//! Role policy: the first host is the scheduler and every other host is a worker,
//! unless exactly one line carries an explicit `scheduler` annotation, in which case that
//! line is the scheduler. Output order always follows the file.
use std::{collections::HashMap, path::Path};

use lnch_model::{HostEntry, Role};
use tracing::debug;

use crate::error::HostfileError;

/// Parse hostfile text into an ordered node list.
pub fn parse(text: &str) -> Result<Vec<HostEntry>, HostfileError> {
    let mut lines: Vec<ParsedLine> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let parsed = parse_line(content, line_no)?;
        let key = parsed.address.to_ascii_lowercase();
        if let Some(&first_line) = seen.get(&key) {
            return Err(HostfileError::Duplicate {
                address: parsed.address,
                line: line_no,
                first_line,
            });
        }
        seen.insert(key, line_no);
        lines.push(parsed);
    }

    if lines.is_empty() {
        return Err(HostfileError::Empty);
    }

    let scheduler_idx = pick_scheduler(&lines)?;
    let hosts: Vec<HostEntry> = lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| {
            let role = if i == scheduler_idx {
                Role::Scheduler
            } else {
                Role::Worker
            };
            HostEntry::new(l.address, l.port, role)
        })
        .collect();

    debug!(target: "lnch.core.hostfile", hosts = hosts.len(), "hostfile parsed");
    Ok(hosts)
}

/// Read and parse a hostfile from disk.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<HostEntry>, HostfileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| HostfileError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse(&text)
}

struct ParsedLine {
    line: usize,
    address: String,
    port: Option<u16>,
    role: Option<Role>,
}

fn pick_scheduler(lines: &[ParsedLine]) -> Result<usize, HostfileError> {
    let mut explicit: Option<usize> = None;
    for (i, l) in lines.iter().enumerate() {
        if l.role == Some(Role::Scheduler) {
            if let Some(first) = explicit {
                return Err(HostfileError::MultipleSchedulers {
                    first_line: lines[first].line,
                    line: l.line,
                });
            }
            explicit = Some(i);
        }
    }
    match explicit {
        Some(i) => Ok(i),
        None if lines[0].role == Some(Role::Worker) => Err(HostfileError::MissingScheduler),
        None => Ok(0),
    }
}

fn parse_line(content: &str, line: usize) -> Result<ParsedLine, HostfileError> {
    let malformed = |reason: String| HostfileError::Malformed { line, reason };

    let mut tokens = content.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    let (address, mut port) = split_address(first).map_err(malformed)?;
    let mut role = None;

    for token in tokens {
        if let Ok(p) = token.parse::<u16>() {
            if port.is_some() {
                return Err(malformed(format!("port given twice for '{address}'")));
            }
            port = Some(check_port(p).map_err(malformed)?);
        } else if let Ok(r) = token.parse::<Role>() {
            if role.is_some() {
                return Err(malformed(format!("role given twice for '{address}'")));
            }
            role = Some(r);
        } else {
            return Err(malformed(format!(
                "unexpected token '{token}' (expected a port or scheduler|worker)"
            )));
        }
    }

    Ok(ParsedLine {
        line,
        address,
        port,
        role,
    })
}

/// Split `address[:port]`; bracketed IPv6 (`[::1]:22`) and bare IPv6 (`fe80::1`) are accepted.
fn split_address(token: &str) -> Result<(String, Option<u16>), String> {
    if let Some(rest) = token.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in '{token}'"))?;
        if addr.is_empty() {
            return Err("empty address".to_string());
        }
        let port = match tail {
            "" => None,
            t => Some(parse_port(t.strip_prefix(':').ok_or_else(|| {
                format!("unexpected '{t}' after ']' in '{token}'")
            })?)?),
        };
        return Ok((addr.to_string(), port));
    }

    match token.matches(':').count() {
        0 => Ok((token.to_string(), None)),
        1 => {
            let (addr, port) = token.split_once(':').unwrap_or((token, ""));
            if addr.is_empty() {
                return Err(format!("empty address in '{token}'"));
            }
            Ok((addr.to_string(), Some(parse_port(port)?)))
        }
        _ => Ok((token.to_string(), None)),
    }
}

fn parse_port(s: &str) -> Result<u16, String> {
    let p = s
        .parse::<u16>()
        .map_err(|_| format!("invalid port '{s}'"))?;
    check_port(p)
}

fn check_port(p: u16) -> Result<u16, String> {
    if p == 0 {
        Err("port must be non-zero".to_string())
    } else {
        Ok(p)
    }
}
