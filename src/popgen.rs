//! Population genetics summary statistics of a sample.
//!
//! All statistics read reconstructed genomes only. Means and variances of too
//! few values are `NaN`; the fixation index is `None` when undefined.

use crate::sample::Sample;
use crate::stats::{compute_mean, compute_var};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frequency of every site mutated in at least one genome, by increasing site.
pub fn allele_frequencies(sample: &Sample) -> Vec<(u32, f64)> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for genome in sample.genomes() {
        for &site in genome.sites() {
            *counts.entry(site).or_default() += 1;
        }
    }
    let n = sample.len() as f64;
    counts
        .into_iter()
        .map(|(site, count)| (site, count as f64 / n))
        .collect()
}

/// Number of distinct mutated sites in the sample.
pub fn segregating_sites(sample: &Sample) -> usize {
    let mut sites: Vec<u32> = sample
        .genomes()
        .flat_map(|g| g.sites().iter().copied())
        .collect();
    sites.sort_unstable();
    sites.dedup();
    sites.len()
}

/// Expected heterozygosity averaged over the observed variable sites.
///
/// A non-empty sample without any mutated site has no diversity (0).
pub fn expected_heterozygosity(sample: &Sample) -> f64 {
    if sample.is_empty() {
        return f64::NAN;
    }
    let freqs = allele_frequencies(sample);
    if freqs.is_empty() {
        return 0.0;
    }
    let sum_f2: f64 = freqs.iter().map(|&(_, f)| f * f).sum();
    1.0 - sum_f2 / freqs.len() as f64
}

/// Expected heterozygosity over the whole genome of `length` sites.
///
/// Sites never observed mutated count as fixed.
pub fn expected_heterozygosity_full(sample: &Sample, length: u32) -> f64 {
    if sample.is_empty() {
        return f64::NAN;
    }
    let freqs = allele_frequencies(sample);
    let sum_f2: f64 = freqs.iter().map(|&(_, f)| f * f).sum();
    let n_fixed = length as f64 - freqs.len() as f64;
    1.0 - (sum_f2 + n_fixed) / length as f64
}

fn mutation_counts(sample: &Sample) -> Vec<f64> {
    sample.genomes().map(|g| g.n_sites() as f64).collect()
}

pub fn mean_mutation_count(sample: &Sample) -> f64 {
    compute_mean(&mutation_counts(sample))
}

pub fn variance_mutation_count(sample: &Sample) -> f64 {
    compute_var(&mutation_counts(sample))
}

/// Condensed upper-triangular distances: pairs `(0,1), (0,2), ..., (n-2,n-1)`.
pub fn pairwise_distances(sample: &Sample) -> Vec<usize> {
    let isolates = sample.isolates();
    let n = isolates.len();
    let mut distances = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            distances.push(isolates[i].genome.distance(&isolates[j].genome));
        }
    }
    distances
}

fn distance_vals(sample: &Sample) -> Vec<f64> {
    pairwise_distances(sample)
        .into_iter()
        .map(|d| d as f64)
        .collect()
}

pub fn mean_pairwise_distance(sample: &Sample) -> f64 {
    compute_mean(&distance_vals(sample))
}

pub fn variance_pairwise_distance(sample: &Sample) -> f64 {
    compute_var(&distance_vals(sample))
}

/// Mean pairwise distance per segregating site.
pub fn mean_pairwise_distance_std(sample: &Sample) -> f64 {
    mean_pairwise_distance(sample) / segregating_sites(sample) as f64
}

/// Variance of pairwise distances per squared segregating site.
pub fn variance_pairwise_distance_std(sample: &Sample) -> f64 {
    let n_seg = segregating_sites(sample) as f64;
    variance_pairwise_distance(sample) / (n_seg * n_seg)
}

/// Fixation index: `1 - Hs_bar / Ht`.
///
/// `Hs_bar` is the per-population heterozygosity averaged with weights equal to
/// the population sample sizes, `Ht` the heterozygosity of the pooled sample.
/// Undefined when the pooled sample has no diversity, and 0 when it comes
/// from a single population.
pub fn fst(sample: &Sample) -> Option<f64> {
    let ht = expected_heterozygosity(sample);
    if !(ht > 0.0) {
        return None;
    }
    if sample.population_count() < 2 {
        return Some(0.0);
    }

    let mut hs_sum = 0.0;
    let mut weight_sum = 0;
    for sub in sample.split_by_population() {
        hs_sum += expected_heterozygosity(&sub) * sub.len() as f64;
        weight_sum += sub.len();
    }
    let hs_bar = hs_sum / weight_sum as f64;

    Some(1.0 - hs_bar / ht)
}

/// Summary statistics of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumstatRecord {
    /// Step at which the sample was drawn.
    pub step: usize,
    /// Source population, or `None` for a metapopulation-wide sample.
    pub pop: Option<usize>,
    pub n_isolates: usize,
    pub segregating_sites: usize,
    pub hs: f64,
    pub hs_full_genome: f64,
    pub mean_mutation_count: f64,
    pub variance_mutation_count: f64,
    pub mean_pairwise_distance: f64,
    pub variance_pairwise_distance: f64,
    pub mean_pairwise_distance_std: f64,
    pub variance_pairwise_distance_std: f64,
    pub fst: Option<f64>,
}

impl SumstatRecord {
    pub fn compute(step: usize, pop: Option<usize>, sample: &Sample, length: u32) -> Self {
        Self {
            step,
            pop,
            n_isolates: sample.len(),
            segregating_sites: segregating_sites(sample),
            hs: expected_heterozygosity(sample),
            hs_full_genome: expected_heterozygosity_full(sample, length),
            mean_mutation_count: mean_mutation_count(sample),
            variance_mutation_count: variance_mutation_count(sample),
            mean_pairwise_distance: mean_pairwise_distance(sample),
            variance_pairwise_distance: variance_pairwise_distance(sample),
            mean_pairwise_distance_std: mean_pairwise_distance_std(sample),
            variance_pairwise_distance_std: variance_pairwise_distance_std(sample),
            fst: fst(sample),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;
    use crate::sample::Isolate;

    fn sample(genomes: &[(&[u32], usize)]) -> Sample {
        Sample::new(
            genomes
                .iter()
                .map(|&(sites, pop)| Isolate {
                    genome: Genome::from_edits(sites.iter().copied()),
                    pop,
                })
                .collect(),
        )
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn frequencies_and_heterozygosity() {
        let smp = sample(&[(&[1, 2], 0), (&[2], 0), (&[2, 3], 0), (&[], 0)]);

        let freqs = allele_frequencies(&smp);
        assert_eq!(freqs, vec![(1, 0.25), (2, 0.75), (3, 0.25)]);
        assert_eq!(segregating_sites(&smp), 3);

        let sum_f2 = 0.0625 + 0.5625 + 0.0625;
        assert_close(expected_heterozygosity(&smp), 1.0 - sum_f2 / 3.0);
        assert_close(
            expected_heterozygosity_full(&smp, 10),
            1.0 - (sum_f2 + 7.0) / 10.0,
        );
    }

    #[test]
    fn monomorphic_sample_has_no_diversity() {
        let smp = sample(&[(&[], 0), (&[], 1)]);
        assert_eq!(expected_heterozygosity(&smp), 0.0);
        assert_eq!(expected_heterozygosity_full(&smp, 100), 0.0);
        assert_eq!(fst(&smp), None);
        assert!(expected_heterozygosity(&Sample::default()).is_nan());
    }

    #[test]
    fn condensed_distances() {
        let smp = sample(&[(&[1, 2], 0), (&[1, 2], 0), (&[3], 0)]);
        assert_eq!(pairwise_distances(&smp), vec![0, 3, 3]);
        assert_close(mean_pairwise_distance(&smp), 2.0);
        assert_close(variance_pairwise_distance(&smp), 3.0);
        assert_close(mean_pairwise_distance_std(&smp), 2.0 / 3.0);
        assert_close(variance_pairwise_distance_std(&smp), 3.0 / 9.0);
        assert!(pairwise_distances(&sample(&[(&[1], 0)])).is_empty());
    }

    #[test]
    fn mutation_count_moments() {
        let smp = sample(&[(&[1, 2], 0), (&[4], 0), (&[], 0)]);
        assert_close(mean_mutation_count(&smp), 1.0);
        assert_close(variance_mutation_count(&smp), 1.0);
    }

    #[test]
    fn fst_zero_without_structure() {
        let smp = sample(&[(&[1], 0), (&[], 0), (&[1], 1), (&[], 1)]);
        assert_close(fst(&smp).unwrap(), 0.0);
    }

    #[test]
    fn fst_zero_for_single_population() {
        let smp = sample(&[(&[1], 3), (&[2], 3), (&[], 3)]);
        assert_eq!(fst(&smp), Some(0.0));
    }

    #[test]
    fn fst_one_for_fixed_differences() {
        let smp = sample(&[(&[1], 0), (&[1], 0), (&[2], 1), (&[2], 1)]);
        // Pooled frequencies 0.5 each; each population carries one fixed site.
        assert_close(expected_heterozygosity(&smp), 0.75);
        assert_close(fst(&smp).unwrap(), 1.0);
    }

    #[test]
    fn record_collects_statistics() {
        let smp = sample(&[(&[1], 0), (&[2], 1)]);
        let rec = SumstatRecord::compute(4, None, &smp, 100);
        assert_eq!(rec.step, 4);
        assert_eq!(rec.n_isolates, 2);
        assert_eq!(rec.segregating_sites, 2);
        assert_close(rec.mean_pairwise_distance, 2.0);
        assert!(rec.variance_pairwise_distance.is_nan());
        assert!(rec.fst.is_some());
    }
}
