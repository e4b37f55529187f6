use crate::config::Config;
use crate::infection::InfectionEngine;
use crate::metapop::Metapopulation;
use crate::network::ContactNetwork;
use crate::popgen::SumstatRecord;
use crate::population::Counts;
use crate::sample::{Sample, draw_from_population, draw_sample};
use anyhow::{Context, Result};
use rand::{TryRngCore, prelude::*, rngs::OsRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reason a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// No susceptible host is left.
    SusceptiblesExhausted,
    /// No exposed or infectious host is left.
    InfectionsExhausted,
    /// The configured number of steps was simulated.
    DurationElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub outcome: Outcome,
    /// Last simulated step.
    pub step: usize,
    /// Seed of the random number generator.
    pub seed: u64,
}

/// Compartment sizes at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub step: usize,
    pub totals: Counts,
    pub per_pop: Vec<Counts>,
}

/// A scheduled sample and the step it was drawn at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSample {
    pub step: usize,
    /// Number of isolates requested.
    pub requested: usize,
    pub sample: Sample,
}

/// Everything produced by a run.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: RunOutcome,
    pub trajectory: Vec<Record>,
    pub samples: Vec<TimedSample>,
    /// All scheduled samples merged.
    pub merged: Sample,
    /// Statistics of the merged sample, if it is not empty.
    pub merged_stats: Option<SumstatRecord>,
    /// Per-step monitoring statistics.
    pub monitor: Vec<SumstatRecord>,
}

/// Simulation engine.
///
/// Holds the configuration, network, metapopulation and the single random
/// number generator every draw is taken from.
pub struct Engine {
    cfg: Config,
    network: ContactNetwork,
    metapop: Metapopulation,
    infection: InfectionEngine,
    schedule: BTreeMap<usize, usize>,
    seed: u64,
    rng: ChaCha12Rng,
    step: usize,
}

impl Engine {
    /// Create a new `Engine` with the initial infections seeded in population 0.
    pub fn new(cfg: Config) -> Result<Self> {
        let network = ContactNetwork::new(&cfg.populations).context("failed to construct network")?;
        let metapop = Metapopulation::new(&cfg);
        let infection = InfectionEngine::new(&cfg).context("failed to construct infection engine")?;

        let mut schedule = BTreeMap::new();
        for smp in &cfg.sampling.schedule {
            *schedule.entry(smp.step).or_insert(0) += smp.size;
        }

        let seed = match cfg.run.seed {
            Some(seed) => seed,
            None => OsRng.try_next_u64().context("failed to draw seed")?,
        };
        log::info!("seed = {seed}");
        let rng = ChaCha12Rng::seed_from_u64(seed);

        Ok(Self {
            cfg,
            network,
            metapop,
            infection,
            schedule,
            seed,
            rng,
            step: 0,
        })
    }

    #[cfg(test)]
    pub fn metapop(&self) -> &Metapopulation {
        &self.metapop
    }

    #[cfg(test)]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Reason to stop, if the run is over.
    pub fn termination(&self) -> Option<Outcome> {
        let totals = self.metapop.totals();
        if totals.n_sus == 0 {
            Some(Outcome::SusceptiblesExhausted)
        } else if totals.n_active() == 0 {
            Some(Outcome::InfectionsExhausted)
        } else if self.step >= self.cfg.run.duration {
            Some(Outcome::DurationElapsed)
        } else {
            None
        }
    }

    /// Advance every population by one step: aging first, then new infections.
    pub fn perform_step(&mut self) -> Result<()> {
        self.step += 1;

        let epi = &self.cfg.epidemic;
        self.metapop.age_one_step(epi.t_latent, epi.t_removal);

        for target in 0..self.network.n_pop() {
            self.infection
                .infect_step(target, &mut self.metapop, &self.network, &mut self.rng)
                .with_context(|| format!("failed to infect population {target}"))?;
        }

        Ok(())
    }

    /// Draw a sample of `n` isolates from the current metapopulation.
    pub fn draw_sample(&mut self, n: usize) -> Result<Option<Sample>> {
        draw_sample(&self.metapop, n, &mut self.rng)
    }

    pub fn record(&self) -> Record {
        Record {
            step: self.step,
            totals: self.metapop.totals(),
            per_pop: self
                .metapop
                .populations()
                .iter()
                .map(|pop| pop.counts())
                .collect(),
        }
    }

    /// Run the simulation until it terminates.
    pub fn run(&mut self) -> Result<Report> {
        let duration = self.cfg.run.duration;
        let length = self.cfg.genome.length;
        let log_every = (duration / 10).max(1);

        let mut trajectory = Vec::new();
        let mut samples = Vec::new();
        let mut monitor = Vec::new();

        let outcome = loop {
            if let Some(outcome) = self.termination() {
                break outcome;
            }

            self.perform_step().context("failed to perform step")?;

            if let Some(&size) = self.schedule.get(&self.step) {
                let sample = self.scheduled_sample(size)?;
                samples.push(TimedSample {
                    step: self.step,
                    requested: size,
                    sample,
                });
            }

            if let Some(size) = self.cfg.sampling.monitor_size {
                self.monitor_step(size, length, &mut monitor)
                    .context("failed to monitor step")?;
            }

            let record = self.record();
            log::debug!("step {}: {:?}", record.step, record.totals);
            trajectory.push(record);

            if self.step % log_every == 0 {
                let progress = 100.0 * self.step as f64 / duration as f64;
                log::info!("completed {progress:06.2}%");
            }
        };

        let outcome = RunOutcome {
            outcome,
            step: self.step,
            seed: self.seed,
        };
        log::info!("{outcome:?}");

        let merged = Sample::merge(samples.iter().map(|timed| &timed.sample));
        let merged_stats = (!merged.is_empty())
            .then(|| SumstatRecord::compute(self.step, None, &merged, length));

        Ok(Report {
            outcome,
            trajectory,
            samples,
            merged,
            merged_stats,
            monitor,
        })
    }

    fn scheduled_sample(&mut self, size: usize) -> Result<Sample> {
        let sample = self
            .draw_sample(size)
            .with_context(|| format!("failed to draw sample at step {}", self.step))?;
        match sample {
            Some(sample) => {
                log::info!("sampled {} isolates at step {}", sample.len(), self.step);
                Ok(sample)
            }
            None => {
                log::warn!("no active infection to sample at step {}", self.step);
                Ok(Sample::default())
            }
        }
    }

    fn monitor_step(&mut self, size: usize, length: u32, monitor: &mut Vec<SumstatRecord>) -> Result<()> {
        if let Some(sample) = draw_sample(&self.metapop, size, &mut self.rng)? {
            monitor.push(SumstatRecord::compute(self.step, None, &sample, length));
        }
        for pop in 0..self.metapop.n_pop() {
            if let Some(sample) = draw_from_population(&self.metapop, pop, size, &mut self.rng) {
                monitor.push(SumstatRecord::compute(self.step, Some(pop), &sample, length));
            }
        }
        Ok(())
    }
}
