//! Running a whole registry.
//!
//! Sequential by default. With [`Schedule::PerDevice`], experiments bound to
//! different devices run concurrently while experiments sharing a device
//! stay serialized, so no two processes ever submit to the same device at
//! once. A selector without an index (`gpu`) claims every device of its
//! kind. Experiments with no device run alone after the parallel phase.
//! Results always come back in registry order.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::info;

use crate::aggregate::{ExperimentResult, aggregate};
use crate::executor::{InvocationResult, SweepExecutor};
use crate::launch::Launcher;
use crate::registry::{DeviceSelector, ExperimentRegistry, ExperimentSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    #[default]
    Sequential,
    PerDevice,
}

impl Schedule {
    pub fn from_parallel_flag(parallel_devices: bool) -> Self {
        if parallel_devices { Self::PerDevice } else { Self::Sequential }
    }
}

/// Progress callbacks. All methods default to no-ops.
pub trait SweepObserver: Sync {
    fn experiment_started(&self, _spec: &ExperimentSpec) {}
    fn point_finished(&self, _spec: &ExperimentSpec, _result: &InvocationResult) {}
    fn experiment_finished(&self, _result: &ExperimentResult) {}
}

impl SweepObserver for () {}

/// A registry run with a given executor and schedule.
pub struct Sweep<'a, L> {
    executor: &'a SweepExecutor<L>,
    schedule: Schedule,
}

impl<'a, L: Launcher> Sweep<'a, L> {
    pub fn new(executor: &'a SweepExecutor<L>, schedule: Schedule) -> Self {
        Self { executor, schedule }
    }

    /// Sweep and aggregate every experiment.
    pub fn run(
        &self,
        registry: &ExperimentRegistry,
        observer: &dyn SweepObserver,
    ) -> Vec<ExperimentResult> {
        let specs = registry.specs();
        match self.schedule {
            Schedule::Sequential => {
                specs.iter().map(|spec| self.run_experiment(spec, observer)).collect()
            }
            Schedule::PerDevice => {
                let DeviceGroups { groups, unbound } = device_groups(specs);
                info!(
                    experiments = specs.len(),
                    devices = groups.len(),
                    unbound = unbound.len(),
                    "per-device schedule"
                );
                let mut indexed: Vec<(usize, ExperimentResult)> = groups
                    .into_par_iter()
                    .flat_map_iter(|indices| {
                        indices
                            .into_iter()
                            .map(|i| (i, self.run_experiment(&specs[i], observer)))
                            .collect::<Vec<_>>()
                    })
                    .collect();
                indexed.extend(
                    unbound.into_iter().map(|i| (i, self.run_experiment(&specs[i], observer))),
                );
                indexed.sort_by_key(|(i, _)| *i);
                indexed.into_iter().map(|(_, result)| result).collect()
            }
        }
    }

    fn run_experiment(
        &self,
        spec: &ExperimentSpec,
        observer: &dyn SweepObserver,
    ) -> ExperimentResult {
        observer.experiment_started(spec);
        let invocations = self.executor.run_with(spec, |r| observer.point_finished(spec, r));
        let result = aggregate(spec.label.clone(), &invocations);
        info!(
            label = %result.label,
            attempted = result.attempted,
            failed = result.failed,
            best = ?result.best.map(|b| b.seconds),
            "experiment finished"
        );
        observer.experiment_finished(&result);
        result
    }
}

/// Registry indices partitioned for [`Schedule::PerDevice`].
#[derive(Debug, Default, PartialEq, Eq)]
struct DeviceGroups {
    /// Mutually exclusive device sets, in first-appearance order.
    groups: Vec<Vec<usize>>,
    /// Experiments with no device; run sequentially on their own.
    unbound: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    /// Every index of a kind, claimed by an index-less selector.
    Kind(&'a str),
    Device(&'a str, u32),
}

fn group_key<'a>(device: &'a DeviceSelector, whole_kinds: &HashSet<&str>) -> GroupKey<'a> {
    match device.index {
        Some(index) if !whole_kinds.contains(device.kind.as_str()) => {
            GroupKey::Device(&device.kind, index)
        }
        _ => GroupKey::Kind(&device.kind),
    }
}

fn device_groups(specs: &[ExperimentSpec]) -> DeviceGroups {
    let whole_kinds: HashSet<&str> = specs
        .iter()
        .filter_map(|s| s.device.as_ref())
        .filter(|d| d.index.is_none())
        .map(|d| d.kind.as_str())
        .collect();

    let mut slots: HashMap<GroupKey<'_>, usize> = HashMap::new();
    let mut partition = DeviceGroups::default();
    for (i, spec) in specs.iter().enumerate() {
        let Some(device) = spec.device.as_ref() else {
            partition.unbound.push(i);
            continue;
        };
        let groups = &mut partition.groups;
        let slot = *slots.entry(group_key(device, &whole_kinds)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    partition
}
