//! Pathogen instances and their replication.

use crate::config::{GenomeConfig, GenomeModel};
use crate::genome::Genome;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Poisson;

/// Handle of a pathogen: its population and its slot in that population.
///
/// Slots are never reused, so a handle stays valid for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathogenId {
    pub pop: usize,
    pub slot: usize,
}

/// One pathogen genome instance.
///
/// `mutations` holds the edits made when this pathogen was replicated from its
/// ancestor, not its absolute genotype (see [`crate::metapop::Metapopulation::reconstruct`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Pathogen {
    mutations: Vec<u32>,
    age: Option<u32>,
    ancestor: Option<PathogenId>,
}

impl Pathogen {
    /// Create a founding wild type pathogen.
    pub fn wild_type() -> Self {
        Self {
            mutations: Vec::new(),
            age: Some(0),
            ancestor: None,
        }
    }

    pub fn mutations(&self) -> &[u32] {
        &self.mutations
    }

    /// Age in steps, or `None` once removed.
    #[cfg(test)]
    pub fn age(&self) -> Option<u32> {
        self.age
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.age.is_some()
    }

    pub fn ancestor(&self) -> Option<PathogenId> {
        self.ancestor
    }

    /// Increment the age of an active pathogen and return it.
    pub fn grow_older(&mut self) -> Option<u32> {
        if let Some(age) = self.age.as_mut() {
            *age += 1;
        }
        self.age
    }

    /// Permanently inactivate the pathogen.
    pub fn remove(&mut self) {
        self.age = None;
    }

    #[cfg(test)]
    pub fn with_edits(mutations: Vec<u32>, ancestor: Option<PathogenId>) -> Self {
        Self {
            mutations,
            age: Some(0),
            ancestor,
        }
    }
}

/// Draws the edits of new pathogens.
#[derive(Debug, Clone)]
pub struct Mutator {
    length: u32,
    model: GenomeModel,
    n_mut_dist: Option<Poisson<f64>>,
}

impl Mutator {
    pub fn new(cfg: &GenomeConfig) -> Result<Self> {
        let mean_mut = cfg.mean_mutations();
        let n_mut_dist = if mean_mut > 0.0 {
            Some(Poisson::new(mean_mut).context("failed to build mutation count distribution")?)
        } else {
            None
        };
        Ok(Self {
            length: cfg.length,
            model: cfg.model,
            n_mut_dist,
        })
    }

    pub fn model(&self) -> GenomeModel {
        self.model
    }

    /// Replicate the pathogen `ancestor` into a new pathogen of age 0.
    ///
    /// `lineage` is the reconstructed genome of the ancestor; it is only read
    /// by [`GenomeModel::Unique`], which never edits a site already mutated
    /// in the lineage.
    pub fn replicate<R: Rng>(
        &self,
        ancestor: PathogenId,
        lineage: Option<&Genome>,
        rng: &mut R,
    ) -> Pathogen {
        let n_mut = match &self.n_mut_dist {
            Some(dist) => dist.sample(rng) as usize,
            None => 0,
        };

        let mutations = match (self.model, lineage) {
            (GenomeModel::Unique, Some(lineage)) => {
                self.draw_unique_sites(n_mut, lineage, rng)
            }
            _ => (0..n_mut)
                .map(|_| rng.random_range(1..=self.length))
                .collect(),
        };

        Pathogen {
            mutations,
            age: Some(0),
            ancestor: Some(ancestor),
        }
    }

    fn draw_unique_sites<R: Rng>(&self, n_mut: usize, lineage: &Genome, rng: &mut R) -> Vec<u32> {
        let n_free = self.length as usize - lineage.n_sites();
        let n_mut = n_mut.min(n_free);

        let mut sites = Vec::with_capacity(n_mut);
        while sites.len() < n_mut {
            let site = rng.random_range(1..=self.length);
            if !lineage.contains(site) && !sites.contains(&site) {
                sites.push(site);
            }
        }
        sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    const ROOT: PathogenId = PathogenId { pop: 0, slot: 0 };

    fn genome_cfg(length: u32, mut_rate: f64, model: GenomeModel) -> GenomeConfig {
        GenomeConfig {
            length,
            mut_rate,
            model,
        }
    }

    #[test]
    fn aging_and_removal() {
        let mut pat = Pathogen::wild_type();
        assert_eq!(pat.age(), Some(0));
        assert_eq!(pat.grow_older(), Some(1));
        pat.remove();
        assert!(!pat.is_active());
        assert_eq!(pat.grow_older(), None);
    }

    #[test]
    fn replicate_keeps_only_new_edits() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mutator = Mutator::new(&genome_cfg(50, 0.2, GenomeModel::Cancelling)).unwrap();

        let child = mutator.replicate(ROOT, None, &mut rng);
        assert_eq!(child.age(), Some(0));
        assert_eq!(child.ancestor(), Some(ROOT));
        assert!(child.mutations().iter().all(|&s| (1..=50).contains(&s)));
    }

    #[test]
    fn zero_mutation_rate_gives_no_edits() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mutator = Mutator::new(&genome_cfg(1000, 0.0, GenomeModel::Cancelling)).unwrap();
        for _ in 0..100 {
            assert!(mutator.replicate(ROOT, None, &mut rng).mutations().is_empty());
        }
    }

    #[test]
    fn unique_model_avoids_lineage_sites() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mutator = Mutator::new(&genome_cfg(10, 0.5, GenomeModel::Unique)).unwrap();
        let lineage = Genome::from_edits([1, 2, 3, 4, 5, 6, 7]);

        for _ in 0..200 {
            let child = mutator.replicate(ROOT, Some(&lineage), &mut rng);
            assert!(child.mutations().len() <= 3);
            assert!(child.mutations().iter().all(|&s| s > 7));
            let mut sites = child.mutations().to_vec();
            sites.sort_unstable();
            sites.dedup();
            assert_eq!(sites.len(), child.mutations().len());
        }
    }
}
