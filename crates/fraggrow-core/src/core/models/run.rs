use std::path::{Path, PathBuf};

/// What to grow: the complex to start from and the fragment to attach at a pair of anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthTarget {
    pub complex: PathBuf,
    pub fragment_id: String,
    pub core_anchor: String,
    pub fragment_anchor: String,
}

/// One growth attempt. Immutable for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthRun {
    target: GrowthTarget,
    iterations: usize,
    criterion: String,
    resource_budget: usize,
    identifier: String,
}

impl GrowthRun {
    pub fn new(
        target: GrowthTarget,
        iterations: usize,
        criterion: impl Into<String>,
        resource_budget: usize,
    ) -> Self {
        let identifier = derive_identifier(
            &target.fragment_id,
            &target.core_anchor,
            &target.fragment_anchor,
        );
        Self {
            target,
            iterations,
            criterion: criterion.into(),
            resource_budget,
            identifier,
        }
    }

    /// Stable name used to namespace every folder the run owns.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn target(&self) -> &GrowthTarget {
        &self.target
    }

    pub fn complex(&self) -> &Path {
        &self.target.complex
    }

    pub fn fragment_id(&self) -> &str {
        &self.target.fragment_id
    }

    pub fn core_anchor(&self) -> &str {
        &self.target.core_anchor
    }

    pub fn fragment_anchor(&self) -> &str {
        &self.target.fragment_anchor
    }

    /// The final iteration index `N`.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn criterion(&self) -> &str {
        &self.criterion
    }

    pub fn resource_budget(&self) -> usize {
        self.resource_budget
    }

    /// Number of candidates each selection step should produce: one per worker,
    /// minus the worker that coordinates the simulation.
    pub fn pool_capacity(&self) -> usize {
        self.resource_budget.saturating_sub(1).max(1)
    }
}

fn derive_identifier(fragment_id: &str, core_anchor: &str, fragment_anchor: &str) -> String {
    let fragment = Path::new(fragment_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| fragment_id.to_string());

    format!("{}{}{}", fragment, core_anchor, fragment_anchor)
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
