use serde::{Deserialize, Serialize};

/// Absolute genotype of a pathogen: the sites that differ from the wild type.
///
/// Sites are kept sorted and distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    sites: Vec<u32>,
}

impl Genome {
    /// Wild type genome (no mutated sites).
    #[cfg(test)]
    pub fn wild_type() -> Self {
        Self::default()
    }

    /// Build a genome from the edits accumulated along a lineage.
    ///
    /// Every edit flips its site, so only sites edited an odd number of times
    /// differ from the wild type.
    pub fn from_edits<I: IntoIterator<Item = u32>>(edits: I) -> Self {
        let mut edits: Vec<u32> = edits.into_iter().collect();
        edits.sort_unstable();

        let mut sites = Vec::with_capacity(edits.len());
        let mut i_edit = 0;
        while i_edit < edits.len() {
            let site = edits[i_edit];
            let run = edits[i_edit..].iter().take_while(|&&s| s == site).count();
            if run % 2 == 1 {
                sites.push(site);
            }
            i_edit += run;
        }

        Self { sites }
    }

    pub fn sites(&self) -> &[u32] {
        &self.sites
    }

    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn contains(&self, site: u32) -> bool {
        self.sites.binary_search(&site).is_ok()
    }

    /// Number of sites mutated in exactly one of the two genomes.
    pub fn distance(&self, other: &Genome) -> usize {
        let (a, b) = (&self.sites, &other.sites);
        let (mut i, mut j) = (0, 0);
        let mut shared = 0;
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        a.len() + b.len() - 2 * shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_edits_survive() {
        let genome = Genome::from_edits([7, 3, 7, 9, 3, 3]);
        assert_eq!(genome.sites(), &[3, 9]);
        assert!(genome.contains(9));
        assert!(!genome.contains(7));
    }

    #[test]
    fn double_edit_cancels() {
        assert_eq!(Genome::from_edits([7, 7]), Genome::wild_type());
    }

    #[test]
    fn distance_is_a_metric() {
        let a = Genome::from_edits([1, 2, 3]);
        let b = Genome::from_edits([2, 3, 4, 5]);
        let c = Genome::from_edits([5]);

        assert_eq!(a.distance(&a), 0);
        assert_eq!(a.distance(&b), 3);
        assert_eq!(b.distance(&a), 3);
        assert_eq!(a.distance(&c), 4);
        assert_eq!(b.distance(&c), 3);
        assert!(a.distance(&c) <= a.distance(&b) + b.distance(&c));
    }
}
