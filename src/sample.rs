//! Genetic sampling of active pathogens.

use crate::genome::Genome;
use crate::infection::multinomial;
use crate::metapop::Metapopulation;
use anyhow::{Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sampled pathogen: its reconstructed genome and the population it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Isolate {
    pub genome: Genome,
    pub pop: usize,
}

/// Ordered collection of isolates, independent of the live simulation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    isolates: Vec<Isolate>,
}

impl Sample {
    pub fn new(isolates: Vec<Isolate>) -> Self {
        Self { isolates }
    }

    pub fn isolates(&self) -> &[Isolate] {
        &self.isolates
    }

    pub fn len(&self) -> usize {
        self.isolates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isolates.is_empty()
    }

    pub fn genomes(&self) -> impl Iterator<Item = &Genome> {
        self.isolates.iter().map(|iso| &iso.genome)
    }

    /// Concatenate samples, keeping isolate order and source populations.
    pub fn merge<'a, I>(samples: I) -> Sample
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let isolates = samples
            .into_iter()
            .flat_map(|smp| smp.isolates.iter().cloned())
            .collect();
        Sample { isolates }
    }

    /// Split into one sample per source population, by increasing population id.
    pub fn split_by_population(&self) -> Vec<Sample> {
        let mut groups: BTreeMap<usize, Vec<Isolate>> = BTreeMap::new();
        for iso in &self.isolates {
            groups.entry(iso.pop).or_default().push(iso.clone());
        }
        groups.into_values().map(Sample::new).collect()
    }

    /// Number of distinct source populations.
    pub fn population_count(&self) -> usize {
        let mut pops: Vec<_> = self.isolates.iter().map(|iso| iso.pop).collect();
        pops.sort_unstable();
        pops.dedup();
        pops.len()
    }
}

/// Draw `n` isolates from the whole metapopulation.
///
/// Isolates are allocated to populations in proportion to their number of
/// exposed and infectious hosts, then picked uniformly (with replacement)
/// within each population. Returns `None` when no host is infected.
pub fn draw_sample<R: Rng>(metapop: &Metapopulation, n: usize, rng: &mut R) -> Result<Option<Sample>> {
    let avail_vec: Vec<f64> = metapop
        .populations()
        .iter()
        .map(|pop| pop.counts().n_active() as f64)
        .collect();
    if avail_vec.iter().all(|&n_avail| n_avail == 0.0) {
        return Ok(None);
    }

    let mut n_per_pop = Vec::with_capacity(avail_vec.len());
    multinomial(rng, n as u64, &avail_vec, &mut n_per_pop)
        .context("failed to allocate isolates to populations")?;

    let mut isolates = Vec::with_capacity(n);
    for (pop, &n_iso) in metapop.populations().iter().zip(&n_per_pop) {
        for _ in 0..n_iso {
            let id = pop
                .random_active(rng)
                .with_context(|| format!("population {} has no active pathogen", pop.id()))?;
            isolates.push(Isolate {
                genome: metapop.reconstruct(id),
                pop: pop.id(),
            });
        }
    }

    Ok(Some(Sample::new(isolates)))
}

/// Draw `n` isolates from population `pop` only.
///
/// Returns `None` when the population has no infected host.
pub fn draw_from_population<R: Rng>(
    metapop: &Metapopulation,
    pop: usize,
    n: usize,
    rng: &mut R,
) -> Option<Sample> {
    let population = metapop.population(pop);
    if population.counts().n_active() == 0 {
        return None;
    }

    let isolates = (0..n)
        .filter_map(|_| population.random_active(rng))
        .map(|id| Isolate {
            genome: metapop.reconstruct(id),
            pop,
        })
        .collect();

    Some(Sample::new(isolates))
}
