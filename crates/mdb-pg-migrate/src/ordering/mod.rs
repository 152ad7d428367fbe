//! Table ordering by foreign-key dependency.
//!
//! Tables are created and loaded in an order where every referenced table
//! comes before the tables that reference it.

use crate::ddl::TablePlan;
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How tables are ordered for DDL and transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingStrategy {
    /// Layered topological sort over the foreign-key graph.
    #[default]
    Topological,
    /// Independent tables first, then every table with a foreign key.
    /// Does not order chains of dependent tables.
    Partition,
}

impl fmt::Display for OrderingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingStrategy::Topological => write!(f, "topological"),
            OrderingStrategy::Partition => write!(f, "partition"),
        }
    }
}

impl FromStr for OrderingStrategy {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "topological" => Ok(OrderingStrategy::Topological),
            "partition" => Ok(OrderingStrategy::Partition),
            other => Err(MigrateError::Config(format!(
                "unknown ordering '{}', expected 'topological' or 'partition'",
                other
            ))),
        }
    }
}

/// Independent tables in discovery order, followed by dependent tables in
/// discovery order.
pub fn partition_by_foreign_keys(plans: Vec<TablePlan>) -> Vec<TablePlan> {
    let (independent, dependent): (Vec<_>, Vec<_>) =
        plans.into_iter().partition(|p| !p.has_foreign_keys());
    independent.into_iter().chain(dependent).collect()
}

/// Layered Kahn ordering.
///
/// Layer 0 is every table without outgoing edges; each later layer holds the
/// tables whose referenced tables all sit in earlier layers. Within a layer
/// discovery order is kept, except that tables with no foreign keys at all
/// open layer 0. Self-references and references to tables outside `plans`
/// are not edges.
///
/// # Errors
///
/// [`MigrateError::CyclicDependency`] with the tables that could not be
/// placed.
pub fn topological_order(plans: Vec<TablePlan>) -> Result<Vec<TablePlan>> {
    let names: HashSet<&str> = plans.iter().map(|p| p.name.as_str()).collect();

    // Referenced tables each plan still waits on.
    let mut waiting: Vec<HashSet<String>> = plans
        .iter()
        .map(|p| {
            p.foreign_keys
                .iter()
                .map(|fk| fk.ref_table.as_str())
                .filter(|r| *r != p.name && names.contains(r))
                .map(str::to_string)
                .collect()
        })
        .collect();

    let mut placed = vec![false; plans.len()];
    let mut order = Vec::with_capacity(plans.len());
    let mut layer_no = 0;

    while order.len() < plans.len() {
        let mut layer: Vec<usize> = (0..plans.len())
            .filter(|&i| !placed[i] && waiting[i].is_empty())
            .collect();
        // Self-referencing tables land in layer 0 but still follow the
        // tables with no foreign keys at all.
        layer.sort_by_key(|&i| plans[i].has_foreign_keys());

        if layer.is_empty() {
            let remaining = (0..plans.len())
                .filter(|&i| !placed[i])
                .map(|i| plans[i].name.clone())
                .collect();
            return Err(MigrateError::CyclicDependency(remaining));
        }

        let done: Vec<&str> = layer.iter().map(|&i| plans[i].name.as_str()).collect();
        debug!("Ordering layer {}: {}", layer_no, done.join(", "));
        for deps in waiting.iter_mut() {
            for name in &done {
                deps.remove(*name);
            }
        }
        for &i in &layer {
            placed[i] = true;
        }
        order.extend(layer);
        layer_no += 1;
    }

    let mut slots: Vec<Option<TablePlan>> = plans.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Order plans with the chosen strategy.
pub fn order_tables(plans: Vec<TablePlan>, strategy: OrderingStrategy) -> Result<Vec<TablePlan>> {
    match strategy {
        OrderingStrategy::Topological => topological_order(plans),
        OrderingStrategy::Partition => Ok(partition_by_foreign_keys(plans)),
    }
}
