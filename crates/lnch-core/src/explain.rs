//! Dry-run rendering of a launch plan.
//!
//! Output depends only on the plan, so identical inputs render byte-identical text.
use std::fmt::Write as _;

use lnch_model::LaunchSpec;

use crate::plan::LaunchPlan;

/// Render the plan as operator-readable text.
pub fn render(plan: &LaunchPlan) -> String {
    let mut out = String::new();
    let core = plan.core_policy();

    let _ = writeln!(
        out,
        "# launch plan: 1 scheduler, {} worker(s)",
        plan.workers.len()
    );
    let _ = writeln!(out, "# scheduler endpoint: {}", plan.endpoint);
    let _ = writeln!(
        out,
        "# core dumps: {} (ulimit -c {})",
        if core.is_enabled() { "enabled" } else { "disabled" },
        core.ulimit_value()
    );

    for spec in plan.specs() {
        out.push('\n');
        render_spec(&mut out, spec);
    }
    out
}

/// Render the plan as pretty-printed JSON.
pub fn render_json(plan: &LaunchPlan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(plan)
}

fn render_spec(out: &mut String, spec: &LaunchSpec) {
    let _ = writeln!(out, "[{}] {}", spec.node, spec.host);
    let _ = writeln!(out, "  command: {}", spec.command_line());
    if spec.env.is_empty() {
        let _ = writeln!(out, "  env: (none)");
    } else {
        let _ = writeln!(out, "  env:");
        for kv in spec.env.iter() {
            let _ = writeln!(out, "    {}={}", kv.key(), kv.value());
        }
    }
    let _ = writeln!(out, "  limits: ulimit -c {}", spec.core.ulimit_value());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::ArgStyle, plan::tests::lr_job};

    #[test]
    fn render_is_byte_stable() {
        let job = lr_job("proj10\nproj5\nproj6\n");
        let a = render(&LaunchPlan::build(&job, ArgStyle::Split).unwrap());
        let b = render(&LaunchPlan::build(&job, ArgStyle::Split).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn render_lists_every_node() {
        let job = lr_job("proj10\nproj5\nproj6\n");
        let text = render(&LaunchPlan::build(&job, ArgStyle::Split).unwrap());

        assert!(text.starts_with("# launch plan: 1 scheduler, 2 worker(s)\n"));
        assert!(text.contains("# scheduler endpoint: proj10:33224\n"));
        assert!(text.contains("# core dumps: disabled (ulimit -c 0)\n"));
        assert!(text.contains("[scheduler] proj10\n"));
        assert!(text.contains(
            "  command: release/SchedulerMain --scheduler proj10 --scheduler_port 33224 \
             --hdfs_namenode proj10 --hdfs_port 9000 --dag_runner_type sequential --num_workers 2\n"
        ));
        assert!(text.contains("[worker-1] proj6\n"));
        assert!(text.contains("--node_id 1"));
        assert_eq!(text.matches("    GLOG_v=-1\n").count(), 3);
        assert_eq!(text.matches("  limits: ulimit -c 0\n").count(), 3);
    }

    #[test]
    fn json_contains_specs() {
        let job = lr_job("proj10\nproj5\n");
        let json = render_json(&LaunchPlan::build(&job, ArgStyle::Split).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["workers"].as_array().map(|w| w.len()), Some(1));
        assert_eq!(value["endpoint"]["port"], 33224);
    }
}
