use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::{Engine, Record, Report};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::new(self.cfg.clone()).context("failed to construct engine")?;
        let report = engine.run().context("failed to run simulation")?;

        self.save_report(&run_dir, &report)
            .context("failed to save report")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;

        let mut analyzer = Analyzer::new(&self.cfg);
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            analyzer
                .add_run(
                    run_dir.join("outcome.msgpack"),
                    run_dir.join("trajectory.msgpack"),
                )
                .with_context(|| format!("failed to add {run_dir:?}"))?;
        }
        log::info!("analyzed {n_runs} runs");

        analyzer
            .save_results(self.results_file())
            .context("failed to save results")?;

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
        {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }

        Ok(())
    }

    fn save_report(&self, run_dir: &Path, report: &Report) -> Result<()> {
        write_trajectory(run_dir.join("trajectory.msgpack"), &report.trajectory)
            .context("failed to write trajectory")?;
        write_counts(run_dir.join("counts.tsv"), &report.trajectory)
            .context("failed to write counts")?;
        write_msgpack(
            run_dir.join("samples.msgpack"),
            &(&report.samples, &report.merged),
        )
        .context("failed to write samples")?;
        write_msgpack(
            run_dir.join("sumstats.msgpack"),
            &(&report.merged_stats, &report.monitor),
        )
        .context("failed to write sumstats")?;
        write_msgpack(run_dir.join("outcome.msgpack"), &report.outcome)
            .context("failed to write outcome")?;
        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}

fn create_writer<P: AsRef<Path>>(file: P) -> Result<BufWriter<File>> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    Ok(BufWriter::new(file))
}

fn write_msgpack<P: AsRef<Path>, T: Serialize>(file: P, value: &T) -> Result<()> {
    let mut writer = create_writer(file)?;
    encode::write(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// One msgpack value per record, read back record by record.
fn write_trajectory<P: AsRef<Path>>(file: P, trajectory: &[Record]) -> Result<()> {
    let mut writer = create_writer(file)?;
    for record in trajectory {
        encode::write(&mut writer, record).context("failed to serialize record")?;
    }
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn write_counts<P: AsRef<Path>>(file: P, trajectory: &[Record]) -> Result<()> {
    let mut writer = create_writer(file)?;
    writeln!(writer, "step\tpop\tn_sus\tn_exp\tn_inf\tn_rec\tn_exp_cum")
        .context("failed to write header")?;
    for record in trajectory {
        for (pop, counts) in record.per_pop.iter().enumerate() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                record.step,
                pop,
                counts.n_sus,
                counts.n_exp,
                counts.n_inf,
                counts.n_rec,
                counts.n_exp_cum
            )
            .context("failed to write counts")?;
        }
    }
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
