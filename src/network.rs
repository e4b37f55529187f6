//! Contact network between populations.

use crate::config::PopulationConfig;
use anyhow::{Context, Result, bail};

/// Directed contact toward one population, with its normalized weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub id: usize,
    pub weight: f64,
}

/// Row-normalized weighted graph over populations.
///
/// Each row lists the populations a population is exposed to (itself included)
/// and the weights of those contacts, which sum to 1.
#[derive(Debug, Clone)]
pub struct ContactNetwork {
    rows: Vec<Vec<Contact>>,
}

impl ContactNetwork {
    /// Build the network from the raw per-population neighbor lists and weights.
    pub fn new(pop_cfg_vec: &[PopulationConfig]) -> Result<Self> {
        let n_pop = pop_cfg_vec.len();
        let rows = pop_cfg_vec
            .iter()
            .enumerate()
            .map(|(i_pop, pop_cfg)| {
                normalize(i_pop, n_pop, &pop_cfg.neighbors, &pop_cfg.weights)
                    .with_context(|| format!("invalid contacts of population {i_pop}"))
            })
            .collect::<Result<_>>()?;
        Ok(Self { rows })
    }

    pub fn n_pop(&self) -> usize {
        self.rows.len()
    }

    /// Contacts of population `id`, the population itself included.
    pub fn contacts(&self, id: usize) -> &[Contact] {
        &self.rows[id]
    }
}

fn normalize(i_pop: usize, n_pop: usize, neighbors: &[usize], weights: &[f64]) -> Result<Vec<Contact>> {
    if neighbors.len() != weights.len() {
        bail!(
            "got {} neighbors but {} weights",
            neighbors.len(),
            weights.len()
        );
    }
    if !neighbors.contains(&i_pop) {
        bail!("neighbors must include the population itself");
    }
    if let Some(&id) = neighbors.iter().find(|&&id| id >= n_pop) {
        bail!("neighbor {id} does not exist");
    }
    if weights.iter().any(|&w| !(w >= 0.0)) {
        bail!("weights must be non-negative");
    }
    let sum: f64 = weights.iter().sum();
    if !(sum > 0.0) {
        bail!("weights must have a positive sum, but sum to {sum}");
    }

    Ok(neighbors
        .iter()
        .zip(weights)
        .map(|(&id, &w)| Contact { id, weight: w / sum })
        .collect())
}
