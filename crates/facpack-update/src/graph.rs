use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use facpack_mod::AccurateVersion;
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::{UpdateError, UpdateStep, UpdateTarget};

/// Every known [`UpdateStep`], searchable as a graph of versions.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
#[must_use]
pub struct UpdateGraph {
    steps: Vec<UpdateStep>,
}

/// The result of [`UpdateGraph::update_targets`].
#[derive(Clone, PartialEq, Eq, Default, Debug)]
#[must_use]
pub struct Resolution {
    /// Reachable targets, newest first.
    pub targets: Vec<UpdateTarget>,
    /// Candidate targets that no chain of steps leads to.
    pub unreachable: Vec<UpdateError>,
}

impl UpdateGraph {
    pub fn new(steps: impl IntoIterator<Item = UpdateStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[UpdateStep] {
        &self.steps
    }

    /// The step from `from` that gets furthest without passing `max_to`.
    #[must_use]
    pub fn optimal_step(
        &self,
        from: AccurateVersion,
        max_to: AccurateVersion,
    ) -> Option<UpdateStep> {
        self.steps
            .iter()
            .filter(|step| step.from == from && step.to <= max_to)
            .max_by_key(|step| step.to)
            .copied()
    }

    /// The shortest chain of steps leading from `from` to exactly `to`.
    ///
    /// Steps never go past `to`. If several chains are equally short, the
    /// one that jumps furthest at every hop wins. Each version is visited at
    /// most once, so the search ends after at most one round per step.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::NoUpdatePath`] if `to` can't be reached.
    pub fn step_chain(
        &self,
        from: AccurateVersion,
        to: AccurateVersion,
    ) -> Result<Vec<UpdateStep>, UpdateError> {
        let no_path = UpdateError::NoUpdatePath { from, to };
        if from == to {
            return Ok(vec![]);
        }

        let mut reached_by: HashMap<AccurateVersion, UpdateStep> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(version) = queue.pop_front() {
            if version == to {
                break;
            }

            let next = self
                .steps
                .iter()
                .filter(|step| step.from == version && step.to > version && step.to <= to)
                .sorted_by(|a, b| b.to.cmp(&a.to));
            for step in next {
                if visited.insert(step.to) {
                    reached_by.insert(step.to, *step);
                    queue.push_back(step.to);
                }
            }
        }

        let mut chain = vec![];
        let mut cursor = to;
        while cursor != from {
            let step = *reached_by.get(&cursor).ok_or_else(|| no_path.clone())?;
            chain.push(step);
            cursor = step.from;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every version worth updating to from `current`.
    ///
    /// Steps past `current` are grouped by the game version they lead to.
    /// Each group offers its newest version, plus its newest stable version
    /// if the newest one is experimental. A target is invalid if one of the
    /// `installed` versions other than `current` already covers its game
    /// version.
    #[instrument(skip(self, installed), fields(steps = self.steps.len()))]
    pub fn update_targets(
        &self,
        current: AccurateVersion,
        installed: &[AccurateVersion],
    ) -> Resolution {
        let groups = self
            .steps
            .iter()
            .filter(|step| step.to > current)
            .into_group_map_by(|step| step.to.family());

        let mut resolution = Resolution::default();
        for (family, steps) in groups {
            let Some(newest) = steps.iter().max_by_key(|step| (step.to, step.is_stable)) else {
                continue;
            };

            let mut candidates = vec![(newest.to, newest.is_stable)];
            if !newest.is_stable {
                candidates.extend(
                    steps
                        .iter()
                        .filter(|step| step.is_stable)
                        .max_by_key(|step| step.to)
                        .map(|step| (step.to, true)),
                );
            }

            let is_valid = !installed
                .iter()
                .any(|version| *version != current && version.family() == family);

            for (target_version, is_stable) in candidates {
                match self.step_chain(current, target_version) {
                    Ok(steps) => {
                        debug!(%target_version, steps = steps.len(), is_stable, is_valid, "Found update target");
                        resolution.targets.push(UpdateTarget {
                            steps,
                            target_version,
                            is_stable,
                            is_valid,
                        });
                    }
                    Err(error) => {
                        warn!(%error, "Skipping unreachable update target");
                        resolution.unreachable.push(error);
                    }
                }
            }
        }

        resolution
            .targets
            .sort_by(|a, b| b.target_version.cmp(&a.target_version));
        resolution.unreachable.sort_by_key(|error| {
            let UpdateError::NoUpdatePath { to, .. } = error;
            Reverse(*to)
        });
        resolution
    }
}
