use crate::errors::{EngineError, EngineResult};
use crate::tasks::{Task, TaskList};
use std::collections::{HashMap, HashSet, VecDeque};

/// Scheduler-style dependency match: `*` matches any run of characters,
/// anything else is literal. `pricing.*` matches `pricing.0`, `pricing.17`.
/// `?` and `[` are ordinary characters here, so prefixes like `run[1].` work.
pub fn matches_pattern(pattern: &str, id: &str) -> bool {
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or("");
    let Some(mut rest) = id.strip_prefix(first) else {
        return false;
    };

    let middle: Vec<&str> = segments.collect();
    let Some((last, middle)) = middle.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for seg in middle {
        match rest.find(seg) {
            Some(pos) => rest = &rest[pos + seg.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

impl TaskList {
    /// Concrete ids `task` waits on, in list order. Self matches are dropped.
    pub fn resolve_deps(&self, task: &Task) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|other| other.id != task.id)
            .filter(|other| task.deps.iter().any(|d| matches_pattern(d, &other.id)))
            .map(|other| other.id.as_str())
            .collect()
    }

    /// Check the list is a well-formed DAG before handing it to the scheduler:
    /// - ids are unique
    /// - no task depends on itself
    /// - every dependency pattern matches at least one other task
    /// - there are no cycles
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen = HashSet::with_capacity(self.tasks.len());
        for t in &self.tasks {
            if !seen.insert(t.id.as_str()) {
                return Err(EngineError::InvalidTaskGraph(format!("duplicate task id {}", t.id)));
            }
        }

        for t in &self.tasks {
            for dep in &t.deps {
                if matches_pattern(dep, &t.id) {
                    return Err(EngineError::InvalidTaskGraph(format!(
                        "task {} depends on itself via {dep}",
                        t.id
                    )));
                }
                if !self.tasks.iter().any(|o| matches_pattern(dep, &o.id)) {
                    return Err(EngineError::InvalidTaskGraph(format!(
                        "dependency {dep} of task {} matches no task",
                        t.id
                    )));
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm. Ties keep list order, so leaves come out first.
    pub fn topological_order(&self) -> EngineResult<Vec<&str>> {
        let mut indegree: HashMap<&str, usize> =
            self.tasks.iter().map(|t| (t.id.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for t in &self.tasks {
            for dep in self.resolve_deps(t) {
                *indegree.entry(t.id.as_str()).or_default() += 1;
                dependents.entry(dep).or_default().push(t.id.as_str());
            }
        }

        let mut ready: VecDeque<&str> = self
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| indegree.get(id).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &next in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        if order.len() != self.tasks.len() {
            return Err(EngineError::InvalidTaskGraph("dependency cycle detected".into()));
        }
        Ok(order)
    }
}
