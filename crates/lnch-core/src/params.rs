//! Parameter layering and command-line rendering.
use serde::{Deserialize, Serialize};

use lnch_model::{ParamValue, ParameterSet, ResolvedParameters, Role};

/// How a `key`/`value` pair becomes command-line tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgStyle {
    /// Two tokens: `--key value`.
    #[default]
    Split,
    /// One token: `--key=value`.
    Joined,
}

/// Merge parameter layers; a later layer overrides an earlier one on key collision.
///
/// Keys keep the position of their first appearance, so output order is deterministic.
pub fn merge(layers: &[&ParameterSet]) -> ParameterSet {
    let mut out = ParameterSet::new();
    for layer in layers {
        for (k, v) in layer.iter() {
            out.insert(k, v.clone());
        }
    }
    out
}

/// Resolve the parameter set a process of `role` is started with.
///
/// - scheduler: `common`, then `scheduler`
/// - worker: `common`, then `program`
pub fn resolve(
    role: Role,
    common: &ParameterSet,
    scheduler: &ParameterSet,
    program: &ParameterSet,
) -> ResolvedParameters {
    let params = match role {
        Role::Scheduler => merge(&[common, scheduler]),
        Role::Worker => merge(&[common, program]),
    };
    ResolvedParameters::new(role, params)
}

/// Render one flag.
pub fn render_flag(key: &str, value: &ParamValue, style: ArgStyle) -> Vec<String> {
    match style {
        ArgStyle::Split => vec![format!("--{key}"), value.to_string()],
        ArgStyle::Joined => vec![format!("--{key}={value}")],
    }
}

/// Render a whole set in its insertion order. Every key appears exactly once.
pub fn render_args(params: &ParameterSet, style: ArgStyle) -> Vec<String> {
    params
        .iter()
        .flat_map(|(k, v)| render_flag(k, v, style))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lr_common() -> ParameterSet {
        ParameterSet::new()
            .with("scheduler", "proj10")
            .with("scheduler_port", "33224")
            .with("hdfs_namenode", "proj10")
            .with("hdfs_port", 9000)
            .with("alpha", 0.01)
            .with("staleness", 0)
    }

    #[test]
    fn program_overrides_common() {
        let program = ParameterSet::new().with("alpha", 0.005).with("num_iter", 50);
        let resolved = resolve(Role::Worker, &lr_common(), &ParameterSet::new(), &program);

        assert_eq!(resolved.get("alpha"), Some(&ParamValue::Float(0.005)));
        assert_eq!(resolved.get("staleness"), Some(&ParamValue::Int(0)));
        assert_eq!(resolved.get("num_iter"), Some(&ParamValue::Int(50)));
    }

    #[test]
    fn later_layer_wins_for_all_three() {
        let common = ParameterSet::new().with("k", "common").with("only_common", true);
        let scheduler = ParameterSet::new().with("k", "scheduler");
        let program = ParameterSet::new().with("k", "program");

        let merged = merge(&[&common, &scheduler, &program]);
        assert_eq!(merged.get("k"), Some(&ParamValue::from("program")));
        assert_eq!(merged.get("only_common"), Some(&ParamValue::Bool(true)));

        let merged = merge(&[&common, &scheduler]);
        assert_eq!(merged.get("k"), Some(&ParamValue::from("scheduler")));
    }

    #[test]
    fn roles_see_their_own_layer_only() {
        let scheduler = ParameterSet::new().with("dag_runner_type", "sequential");
        let program = ParameterSet::new().with("url", "/jasper/avazu-app");

        let s = resolve(Role::Scheduler, &lr_common(), &scheduler, &program);
        let w = resolve(Role::Worker, &lr_common(), &scheduler, &program);

        assert!(s.get("dag_runner_type").is_some());
        assert!(s.get("url").is_none());
        assert!(w.get("url").is_some());
        assert!(w.get("dag_runner_type").is_none());
        assert_eq!(s.role(), Role::Scheduler);
    }

    #[test]
    fn no_key_is_lost() {
        let common = lr_common();
        let program = ParameterSet::new().with("alpha", 0.005).with("batch_size", 800);
        let resolved = resolve(Role::Worker, &common, &ParameterSet::new(), &program);

        for key in common.keys().chain(program.keys()) {
            assert!(resolved.params().contains_key(key), "lost {key}");
        }
    }

    #[test]
    fn render_split_in_insertion_order() {
        let set = ParameterSet::new()
            .with("url", "/ml/webspam")
            .with("alpha", 0.005)
            .with("is_sparse", false)
            .with("num_iter", 50);

        assert_eq!(
            render_args(&set, ArgStyle::Split),
            vec![
                "--url", "/ml/webspam", "--alpha", "0.005", "--is_sparse", "false", "--num_iter",
                "50"
            ]
        );
    }

    #[test]
    fn render_joined() {
        let set = ParameterSet::new().with("alpha", 1.0).with("url", "a b");
        assert_eq!(
            render_args(&set, ArgStyle::Joined),
            vec!["--alpha=1.0", "--url=a b"]
        );
    }
}
