//! Compartment state machine of a single population.
//!
//! Pathogens are stored in infection order and all share the same latency and
//! removal thresholds, so they change state in storage order. The slot array is
//! therefore always partitioned into three contiguous ranges:
//!
//! * `[0, n_rec)`: removed,
//! * `[n_rec, n_rec + n_inf)`: infectious,
//! * `[n_rec + n_inf, n_exp_cum)`: exposed.
//!
//! This partition only holds because the thresholds are population-wide
//! constants; per-individual durations would need an ordered event structure.

use crate::pathogen::{Pathogen, PathogenId};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Range};

/// Compartment sizes of a population (or a sum of populations).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Susceptible hosts.
    pub n_sus: usize,
    /// Exposed (infected, not yet infectious) hosts.
    pub n_exp: usize,
    /// Infectious hosts.
    pub n_inf: usize,
    /// Recovered (removed) hosts.
    pub n_rec: usize,
    /// Hosts ever infected.
    pub n_exp_cum: usize,
}

impl Counts {
    /// Hosts currently carrying an active pathogen.
    pub fn n_active(&self) -> usize {
        self.n_exp + self.n_inf
    }

    #[cfg(test)]
    pub fn n_hosts(&self) -> usize {
        self.n_sus + self.n_exp + self.n_inf + self.n_rec
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Self) {
        self.n_sus += other.n_sus;
        self.n_exp += other.n_exp;
        self.n_inf += other.n_inf;
        self.n_rec += other.n_rec;
        self.n_exp_cum += other.n_exp_cum;
    }
}

/// One sub-population: compartment counts and the pathogen slot array.
#[derive(Debug, Clone)]
pub struct Population {
    id: usize,
    capacity: usize,
    counts: Counts,
    pathogens: Vec<Pathogen>,
}

impl Population {
    /// Create an entirely susceptible population of `capacity` hosts.
    pub fn new(id: usize, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            counts: Counts {
                n_sus: capacity,
                ..Counts::default()
            },
            pathogens: Vec::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn pathogen(&self, slot: usize) -> &Pathogen {
        &self.pathogens[slot]
    }

    /// Slots of the currently infectious pathogens.
    pub fn infectious_range(&self) -> Range<usize> {
        let start = self.counts.n_rec;
        start..start + self.counts.n_inf
    }

    /// Slots of the currently exposed or infectious pathogens.
    pub fn active_range(&self) -> Range<usize> {
        self.counts.n_rec..self.counts.n_exp_cum
    }

    /// Infect `n_seed` hosts with the wild type.
    pub fn seed_initial(&mut self, n_seed: usize) {
        for _ in 0..n_seed {
            self.push(Pathogen::wild_type());
        }
        self.counts.n_sus -= n_seed;
        self.counts.n_exp += n_seed;
        self.counts.n_exp_cum += n_seed;
    }

    /// Age every active pathogen by one step and move it across compartments.
    ///
    /// Pathogens reaching `t_latent` become infectious and pathogens reaching
    /// `t_removal` are removed.
    pub fn age_one_step(&mut self, t_latent: u32, t_removal: u32) {
        let mut n_new_inf = 0;
        let mut n_new_rec = 0;

        let span = self.active_range();
        for pat in &mut self.pathogens[span] {
            if let Some(age) = pat.grow_older() {
                if age == t_latent {
                    n_new_inf += 1;
                }
                if age >= t_removal {
                    pat.remove();
                    n_new_rec += 1;
                }
            }
        }

        self.counts.n_exp -= n_new_inf;
        self.counts.n_inf = self.counts.n_inf + n_new_inf - n_new_rec;
        self.counts.n_rec += n_new_rec;
    }

    /// Append newly infected hosts, draining `new_pathogens`.
    pub fn admit(&mut self, new_pathogens: &mut Vec<Pathogen>) {
        let n_new = new_pathogens.len();
        assert!(
            n_new <= self.counts.n_sus,
            "population {} cannot admit {n_new} infections with counts {:?}",
            self.id,
            self.counts
        );
        for pat in new_pathogens.drain(..) {
            self.push(pat);
        }
        self.counts.n_sus -= n_new;
        self.counts.n_exp += n_new;
        self.counts.n_exp_cum += n_new;
    }

    /// Pick a uniformly random infectious pathogen.
    pub fn random_infectious<R: Rng>(&self, rng: &mut R) -> Option<PathogenId> {
        self.random_in(self.infectious_range(), rng)
    }

    /// Pick a uniformly random exposed or infectious pathogen.
    pub fn random_active<R: Rng>(&self, rng: &mut R) -> Option<PathogenId> {
        self.random_in(self.active_range(), rng)
    }

    fn random_in<R: Rng>(&self, range: Range<usize>, rng: &mut R) -> Option<PathogenId> {
        if range.is_empty() {
            return None;
        }
        let slot = rng.random_range(range);
        Some(PathogenId { pop: self.id, slot })
    }

    fn push(&mut self, pat: Pathogen) {
        // Capacity equals the number of hosts, so a full array means the
        // compartment counts are corrupt.
        assert!(
            self.pathogens.len() < self.capacity,
            "pathogen slots of population {} exhausted (capacity {}, counts {:?})",
            self.id,
            self.capacity,
            self.counts
        );
        self.pathogens.push(pat);
    }

    #[cfg(test)]
    pub fn check_partition(&self) {
        let c = self.counts;
        assert_eq!(c.n_hosts(), self.capacity);
        assert_eq!(c.n_rec + c.n_inf + c.n_exp, c.n_exp_cum);
        assert_eq!(self.pathogens.len(), c.n_exp_cum);
        assert!(self.pathogens[..c.n_rec].iter().all(|p| !p.is_active()));
        assert!(self.pathogens[c.n_rec..].iter().all(|p| p.is_active()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn seed_fills_first_slots() {
        let mut pop = Population::new(0, 10);
        pop.seed_initial(3);
        pop.check_partition();
        assert_eq!(pop.active_range(), 0..3);
        assert!(pop.infectious_range().is_empty());
        assert_eq!(pop.counts().n_sus, 7);
    }

    #[test]
    fn aging_moves_through_compartments() {
        let mut pop = Population::new(0, 10);
        pop.seed_initial(4);

        pop.age_one_step(2, 3);
        assert_eq!(pop.counts().n_exp, 4);
        pop.check_partition();

        pop.age_one_step(2, 3);
        assert_eq!(pop.counts().n_inf, 4);
        assert_eq!(pop.infectious_range(), 0..4);
        pop.check_partition();

        pop.age_one_step(2, 3);
        assert_eq!(pop.counts().n_rec, 4);
        assert!(pop.active_range().is_empty());
        pop.check_partition();
    }

    #[test]
    fn equal_thresholds_remove_immediately() {
        let mut pop = Population::new(0, 5);
        pop.seed_initial(2);
        pop.age_one_step(1, 1);
        let c = pop.counts();
        assert_eq!((c.n_exp, c.n_inf, c.n_rec), (0, 0, 2));
        pop.check_partition();
    }

    #[test]
    fn partition_holds_with_staggered_infections() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut pop = Population::new(0, 100);
        pop.seed_initial(1);

        for _ in 0..30 {
            pop.age_one_step(2, 4);
            let n_new = rng.random_range(0..=pop.counts().n_sus.min(5));
            let ancestor = PathogenId { pop: 0, slot: 0 };
            let mut new_pathogens: Vec<_> = (0..n_new)
                .map(|_| Pathogen::with_edits(vec![], Some(ancestor)))
                .collect();
            pop.admit(&mut new_pathogens);
            assert!(new_pathogens.is_empty());
            pop.check_partition();

            for slot in pop.infectious_range() {
                let age = pop.pathogen(slot).age().unwrap();
                assert!((2..4).contains(&age));
            }
        }
    }

    #[test]
    fn random_picks_stay_in_range() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let mut pop = Population::new(3, 10);
        assert_eq!(pop.random_active(&mut rng), None);

        pop.seed_initial(5);
        pop.age_one_step(1, 5);
        for _ in 0..50 {
            let id = pop.random_infectious(&mut rng).unwrap();
            assert_eq!(id.pop, 3);
            assert!(pop.infectious_range().contains(&id.slot));
        }
    }

    #[test]
    #[should_panic]
    fn admitting_beyond_susceptibles_panics() {
        let mut pop = Population::new(0, 2);
        pop.seed_initial(2);
        let mut extra = vec![Pathogen::wild_type()];
        pop.admit(&mut extra);
    }
}
