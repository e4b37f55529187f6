use crate::network::ContactNetwork;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Genome evolution parameters.
    pub genome: GenomeConfig,
    /// Epidemic (compartment) parameters.
    pub epidemic: EpidemicConfig,
    /// Sub-populations and their contact network rows.
    pub populations: Vec<PopulationConfig>,
    /// Genetic sampling parameters.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Run control parameters.
    pub run: RunConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Number of sites in the genome.
    pub length: u32,
    /// Mutation rate per site and replication.
    pub mut_rate: f64,
    /// How repeated edits of a site are treated.
    #[serde(default)]
    pub model: GenomeModel,
}

/// Genome evolution model.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenomeModel {
    /// Mutated sites are drawn freely and an even number of edits cancels out.
    #[default]
    Cancelling,
    /// Mutated sites are always new to the lineage (no back-mutation).
    Unique,
}

impl GenomeConfig {
    /// Mean number of mutations per replication (`mu * L`).
    pub fn mean_mutations(&self) -> f64 {
        self.mut_rate * self.length as f64
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EpidemicConfig {
    /// Transmission rate.
    pub beta: f64,
    /// Age at which a pathogen becomes infectious.
    pub t_latent: u32,
    /// Age at which a pathogen is removed.
    pub t_removal: u32,
    /// Number of wild type infections seeded in population 0.
    pub n_seed: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of hosts.
    pub capacity: usize,
    /// Neighboring population indices (must include the population itself).
    pub neighbors: Vec<usize>,
    /// Raw contact weights, one per neighbor.
    pub weights: Vec<f64>,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Scheduled samples.
    #[serde(default)]
    pub schedule: Vec<SampleTime>,
    /// Size of the samples drawn at every step for monitoring, if any.
    #[serde(default)]
    pub monitor_size: Option<usize>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SampleTime {
    /// Step after which the sample is drawn.
    pub step: usize,
    /// Number of isolates drawn.
    pub size: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of steps.
    pub duration: usize,
    /// Random number generator seed (drawn from the OS when absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config = Self::from_toml_str(&contents)?;

        Ok(config)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_num(self.genome.length, 1..).context("invalid genome length")?;
        check_num(self.genome.mut_rate, 0.0..1.0).context("invalid mutation rate")?;

        check_num(self.epidemic.beta, 0.0..).context("invalid transmission rate")?;
        check_num(self.epidemic.t_latent, 1..).context("invalid latency threshold")?;
        check_num(self.epidemic.t_removal, self.epidemic.t_latent..)
            .context("invalid removal threshold")?;

        check_num(self.populations.len(), 1..).context("invalid number of populations")?;
        for (i_pop, pop) in self.populations.iter().enumerate() {
            check_num(pop.capacity, 1..)
                .with_context(|| format!("invalid capacity of population {i_pop}"))?;
        }
        ContactNetwork::new(&self.populations).context("invalid contact network")?;
        check_num(self.epidemic.n_seed, 1..=self.populations[0].capacity)
            .context("invalid initial number of infections")?;

        check_num(self.run.duration, 1..).context("invalid duration")?;

        let n_hosts: usize = self.populations.iter().map(|pop| pop.capacity).sum();
        for (i_smp, smp) in self.sampling.schedule.iter().enumerate() {
            check_num(smp.step, 1..=self.run.duration)
                .with_context(|| format!("invalid step of scheduled sample {i_smp}"))?;
            check_num(smp.size, 1..=n_hosts)
                .with_context(|| format!("invalid size of scheduled sample {i_smp}"))?;
        }
        if let Some(size) = self.sampling.monitor_size {
            check_num(size, 1..=n_hosts).context("invalid monitoring sample size")?;
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
impl Config {
    /// Fully connected network of `n_pop` equal populations with uniform weights,
    /// seeded in population 0.
    pub fn fully_connected(n_pop: usize, capacity: usize, n_seed: usize) -> Self {
        let populations = (0..n_pop)
            .map(|i_pop| {
                let mut neighbors = vec![i_pop];
                neighbors.extend((0..n_pop).filter(|&nb| nb != i_pop));
                PopulationConfig {
                    capacity,
                    neighbors,
                    weights: vec![1.0; n_pop],
                }
            })
            .collect();
        Self {
            genome: GenomeConfig {
                length: 100_000,
                mut_rate: 1e-6,
                model: GenomeModel::Cancelling,
            },
            epidemic: EpidemicConfig {
                beta: 2.0,
                t_latent: 1,
                t_removal: 2,
                n_seed,
            },
            populations,
            sampling: SamplingConfig::default(),
            run: RunConfig {
                duration: 100,
                seed: Some(42),
            },
        }
    }
}
