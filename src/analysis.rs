use crate::config::Config;
use crate::engine::{Outcome, Record, RunOutcome};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Output of a single run, as read back from its files.
pub struct RunData {
    pub outcome: RunOutcome,
    pub trajectory: Vec<Record>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObsReport {
    pub name: String,
    pub values: Vec<AccumulatorReport>,
}

pub trait Obs {
    fn update(&mut self, run: &RunData) -> Result<()>;
    fn report(&self) -> ObsReport;
}

const OUTCOMES: [Outcome; 3] = [
    Outcome::SusceptiblesExhausted,
    Outcome::InfectionsExhausted,
    Outcome::DurationElapsed,
];

/// Frequency of each way a run can end.
pub struct ProbOutcome {
    acc_vec: Vec<Accumulator>,
}

impl ProbOutcome {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(OUTCOMES.len(), Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for ProbOutcome {
    fn update(&mut self, run: &RunData) -> Result<()> {
        for (outcome, acc) in OUTCOMES.iter().zip(&mut self.acc_vec) {
            acc.add(if *outcome == run.outcome.outcome { 1.0 } else { 0.0 });
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "prob_outcome".to_string(),
            values: self.acc_vec.iter().map(|acc| acc.report()).collect(),
        }
    }
}

/// Fraction of hosts ever infected, per population.
pub struct AttackRate {
    capacity_vec: Vec<usize>,
    acc_vec: Vec<Accumulator>,
}

impl AttackRate {
    pub fn new(cfg: &Config) -> Self {
        let capacity_vec: Vec<_> = cfg.populations.iter().map(|pop| pop.capacity).collect();
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(capacity_vec.len(), Accumulator::new);
        Self {
            capacity_vec,
            acc_vec,
        }
    }
}

impl Obs for AttackRate {
    fn update(&mut self, run: &RunData) -> Result<()> {
        let Some(last) = run.trajectory.last() else {
            return Ok(());
        };
        for (i_pop, counts) in last.per_pop.iter().enumerate() {
            let capacity = self.capacity_vec[i_pop];
            self.acc_vec[i_pop].add(counts.n_exp_cum as f64 / capacity as f64);
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "attack_rate".to_string(),
            values: self.acc_vec.iter().map(|acc| acc.report()).collect(),
        }
    }
}

/// Number of steps simulated.
pub struct Duration {
    acc: Accumulator,
}

impl Duration {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Duration {
    fn update(&mut self, run: &RunData) -> Result<()> {
        self.acc.add(run.outcome.step as f64);
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "duration".to_string(),
            values: vec![self.acc.report()],
        }
    }
}

/// Largest total number of infectious hosts and the step it was reached at.
pub struct PeakInfectious {
    size_acc: Accumulator,
    step_acc: Accumulator,
}

impl PeakInfectious {
    pub fn new() -> Self {
        Self {
            size_acc: Accumulator::new(),
            step_acc: Accumulator::new(),
        }
    }
}

impl Obs for PeakInfectious {
    fn update(&mut self, run: &RunData) -> Result<()> {
        let Some(peak) = run.trajectory.iter().max_by_key(|rec| rec.totals.n_inf) else {
            return Ok(());
        };
        self.size_acc.add(peak.totals.n_inf as f64);
        self.step_acc.add(peak.step as f64);
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: "peak_infectious".to_string(),
            values: vec![self.size_acc.report(), self.step_acc.report()],
        }
    }
}

/// Aggregates observables over the runs of a simulation.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(ProbOutcome::new()),
            Box::new(AttackRate::new(cfg)),
            Box::new(Duration::new()),
            Box::new(PeakInfectious::new()),
        ];
        Self { obs_ptr_vec }
    }

    /// Read a run from its outcome and trajectory files and update every observable.
    pub fn add_run<P: AsRef<Path>>(&mut self, outcome_file: P, trajectory_file: P) -> Result<()> {
        let outcome_file = outcome_file.as_ref();
        let file =
            File::open(outcome_file).with_context(|| format!("failed to open {outcome_file:?}"))?;
        let outcome: RunOutcome =
            decode::from_read(BufReader::new(file)).context("failed to deserialize outcome")?;

        let trajectory_file = trajectory_file.as_ref();
        let file = File::open(trajectory_file)
            .with_context(|| format!("failed to open {trajectory_file:?}"))?;
        let mut reader = BufReader::new(file);

        let mut trajectory = Vec::with_capacity(outcome.step);
        for _ in 0..outcome.step {
            let record = decode::from_read(&mut reader).context("failed to read record")?;
            trajectory.push(record);
        }

        self.add(&RunData {
            outcome,
            trajectory,
        })
    }

    pub fn add(&mut self, run: &RunData) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(run).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<ObsReport> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        encode::write(&mut writer, &self.reports()).context("failed to serialize reports")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Counts;

    fn record(step: usize, n_inf: usize, n_exp_cum: usize) -> Record {
        let counts = Counts {
            n_sus: 100 - n_exp_cum,
            n_exp: 0,
            n_inf,
            n_rec: n_exp_cum - n_inf,
            n_exp_cum,
        };
        Record {
            step,
            totals: counts,
            per_pop: vec![counts],
        }
    }

    fn run(outcome: Outcome, trajectory: Vec<Record>) -> RunData {
        RunData {
            outcome: RunOutcome {
                outcome,
                step: trajectory.len(),
                seed: 0,
            },
            trajectory,
        }
    }

    #[test]
    fn observables_aggregate_runs() {
        let cfg = Config::fully_connected(1, 100, 1);
        let mut analyzer = Analyzer::new(&cfg);

        analyzer
            .add(&run(
                Outcome::InfectionsExhausted,
                vec![record(1, 5, 10), record(2, 8, 20), record(3, 0, 20)],
            ))
            .unwrap();
        analyzer
            .add(&run(
                Outcome::DurationElapsed,
                vec![record(1, 2, 40), record(2, 4, 60), record(3, 6, 80)],
            ))
            .unwrap();

        let reports = analyzer.reports();
        assert_eq!(reports.len(), 4);

        let prob = &reports[0].values;
        assert_eq!(prob[0].mean, 0.0);
        assert_eq!(prob[1].mean, 0.5);
        assert_eq!(prob[2].mean, 0.5);

        assert!((reports[1].values[0].mean - 0.5).abs() < 1e-12);
        assert_eq!(reports[2].values[0].mean, 3.0);
        assert_eq!(reports[3].values[0].mean, 7.0);
        assert_eq!(reports[3].values[1].mean, 2.5);
    }
}
