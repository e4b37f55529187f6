//! Force of infection, ancestor attribution and replication of new infections.

use crate::config::{Config, GenomeModel};
use crate::metapop::Metapopulation;
use crate::network::ContactNetwork;
use crate::pathogen::{Mutator, Pathogen};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Binomial;

/// Seeds new infections in a population from all of its contacts.
///
/// Holds reusable buffers so a step does not reallocate.
#[derive(Debug, Clone)]
pub struct InfectionEngine {
    beta: f64,
    mutator: Mutator,
    lambda_vec: Vec<f64>,
    n_new_vec: Vec<u64>,
    new_pathogens: Vec<Pathogen>,
}

impl InfectionEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let mutator = Mutator::new(&cfg.genome).context("failed to construct mutator")?;
        Ok(Self {
            beta: cfg.epidemic.beta,
            mutator,
            lambda_vec: Vec::new(),
            n_new_vec: Vec::new(),
            new_pathogens: Vec::new(),
        })
    }

    /// Draw and append the new infections of population `target` for one step.
    ///
    /// Returns the number of new infections.
    pub fn infect_step<R: Rng>(
        &mut self,
        target: usize,
        metapop: &mut Metapopulation,
        network: &ContactNetwork,
        rng: &mut R,
    ) -> Result<u64> {
        let contacts = network.contacts(target);

        // Force of infection exerted by each contact.
        self.lambda_vec.clear();
        for contact in contacts {
            let source = metapop.population(contact.id);
            let capacity = source.capacity();
            let lambda = if capacity == 0 {
                0.0
            } else {
                let prevalence = source.counts().n_inf as f64 / capacity as f64;
                (self.beta * contact.weight * prevalence).max(0.0)
            };
            self.lambda_vec.push(lambda);
        }
        let lambda: f64 = self.lambda_vec.iter().sum();

        let n_sus = metapop.population(target).counts().n_sus;
        if n_sus == 0 || !(lambda > 0.0) {
            return Ok(0);
        }

        let prob = (1.0 - (-lambda).exp()).clamp(0.0, 1.0);
        let n_new = Binomial::new(n_sus as u64, prob)
            .context("failed to build infection distribution")?
            .sample(rng);

        // Attribute each new infection to the contact it came from.
        multinomial(rng, n_new, &self.lambda_vec, &mut self.n_new_vec)
            .context("failed to attribute new infections")?;

        self.new_pathogens.clear();
        for (contact, &n_from) in contacts.iter().zip(&self.n_new_vec) {
            let source = metapop.population(contact.id);
            for _ in 0..n_from {
                let ancestor = source
                    .random_infectious(rng)
                    .with_context(|| format!("population {} has no infectious pathogen", contact.id))?;
                let lineage = match self.mutator.model() {
                    GenomeModel::Unique => Some(metapop.reconstruct(ancestor)),
                    GenomeModel::Cancelling => None,
                };
                let pat = self.mutator.replicate(ancestor, lineage.as_ref(), rng);
                self.new_pathogens.push(pat);
            }
        }

        metapop
            .population_mut(target)
            .admit(&mut self.new_pathogens);

        Ok(n_new)
    }
}

/// Draw multinomial counts of `n` trials over unnormalized `weights` into `out`.
///
/// Uses conditional binomial draws, one per category, in order. Categories
/// with zero weight always get zero trials.
pub fn multinomial<R: Rng>(rng: &mut R, n: u64, weights: &[f64], out: &mut Vec<u64>) -> Result<()> {
    out.clear();
    out.resize(weights.len(), 0);
    if n == 0 {
        return Ok(());
    }

    if weights.iter().any(|&w| !(w >= 0.0)) {
        bail!("weights must be non-negative");
    }
    let norm: f64 = weights.iter().sum();
    let Some(i_last) = weights.iter().rposition(|&w| w > 0.0) else {
        bail!("weights must have a positive sum");
    };

    let mut sum_w = 0.0;
    let mut sum_n = 0;
    for (i_cat, &w) in weights.iter().enumerate() {
        if sum_n == n {
            break;
        }
        if w > 0.0 {
            let n_cat = if i_cat == i_last {
                n - sum_n
            } else {
                let prob = (w / (norm - sum_w)).clamp(0.0, 1.0);
                Binomial::new(n - sum_n, prob)
                    .context("failed to build category distribution")?
                    .sample(rng)
            };
            out[i_cat] = n_cat;
            sum_n += n_cat;
        }
        sum_w += w;
    }

    Ok(())
}
