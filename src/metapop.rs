use crate::config::Config;
use crate::genome::Genome;
use crate::pathogen::{Pathogen, PathogenId};
use crate::population::{Counts, Population};

/// Set of populations making up the simulated host community.
///
/// Totals are always summed over populations, never cached.
#[derive(Debug, Clone)]
pub struct Metapopulation {
    pop_vec: Vec<Population>,
}

impl Metapopulation {
    /// Create one population per configured entry and seed population 0.
    pub fn new(cfg: &Config) -> Self {
        let mut pop_vec: Vec<_> = cfg
            .populations
            .iter()
            .enumerate()
            .map(|(id, pop_cfg)| Population::new(id, pop_cfg.capacity))
            .collect();
        pop_vec[0].seed_initial(cfg.epidemic.n_seed);
        Self { pop_vec }
    }

    pub fn n_pop(&self) -> usize {
        self.pop_vec.len()
    }

    pub fn populations(&self) -> &[Population] {
        &self.pop_vec
    }

    pub fn population(&self, id: usize) -> &Population {
        &self.pop_vec[id]
    }

    pub fn population_mut(&mut self, id: usize) -> &mut Population {
        &mut self.pop_vec[id]
    }

    pub fn pathogen(&self, id: PathogenId) -> &Pathogen {
        self.pop_vec[id.pop].pathogen(id.slot)
    }

    /// Compartment sizes summed over all populations.
    pub fn totals(&self) -> Counts {
        let mut totals = Counts::default();
        for pop in &self.pop_vec {
            totals += pop.counts();
        }
        totals
    }

    pub fn age_one_step(&mut self, t_latent: u32, t_removal: u32) {
        for pop in &mut self.pop_vec {
            pop.age_one_step(t_latent, t_removal);
        }
    }

    /// Reconstruct the full genome of a pathogen from its ancestry.
    ///
    /// Walks the ancestor chain up to the founding wild type, pooling the edits
    /// of every pathogen on the way.
    pub fn reconstruct(&self, id: PathogenId) -> Genome {
        let mut edits = Vec::new();
        let mut next = Some(id);
        while let Some(id) = next {
            let pat = self.pathogen(id);
            edits.extend_from_slice(pat.mutations());
            next = pat.ancestor();
        }
        Genome::from_edits(edits)
    }

    #[cfg(test)]
    pub fn from_populations(pop_vec: Vec<Population>) -> Self {
        Self { pop_vec }
    }
}
