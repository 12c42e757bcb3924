//! Target resolution against the live pod list.
//!
//! Resolution is a one-shot snapshot at supervisor start: target patterns
//! are matched against the pod names listed at that moment, and the result
//! is fixed for the lifetime of the process. Pods created later are not
//! picked up.

use crate::config::CompiledTarget;

/// One concrete (pod, container) pair being actively tailed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedSource {
    pub pod: String,
    pub container: String,
}

impl std::fmt::Display for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pod, self.container)
    }
}

/// Match every target pattern against the pod list.
///
/// Order is deterministic: targets in declared order, pods in listing order,
/// containers in declared order. A target that matches no pod is logged but
/// is not an error; the caller decides whether an empty overall result is
/// fatal.
pub fn resolve_sources(targets: &[CompiledTarget], pod_names: &[String]) -> Vec<ResolvedSource> {
    let mut sources = Vec::new();

    for target in targets {
        let matched: Vec<&String> = pod_names
            .iter()
            .filter(|name| target.pod.is_match(name))
            .collect();

        if matched.is_empty() {
            tracing::warn!(pattern = %target.pod, "target matched no pods");
            continue;
        }

        for pod in matched {
            for container in &target.containers {
                sources.push(ResolvedSource {
                    pod: pod.clone(),
                    container: container.clone(),
                });
            }
        }
    }

    sources
}
