use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[genome]\n"
        + "length = 10000\n"
        + "mut_rate = 0.0001\n"
        + "\n"
        + "[epidemic]\n"
        + "beta = 2.0\n"
        + "t_latent = 1\n"
        + "t_removal = 3\n"
        + "n_seed = 10\n"
        + "\n"
        + "[[populations]]\n"
        + "capacity = 500\n"
        + "neighbors = [ 0, 1,]\n"
        + "weights = [ 0.9, 0.1,]\n"
        + "\n"
        + "[[populations]]\n"
        + "capacity = 500\n"
        + "neighbors = [ 1, 0,]\n"
        + "weights = [ 0.9, 0.1,]\n"
        + "\n"
        + "[sampling]\n"
        + "schedule = [ { step = 3, size = 20 }, { step = 6, size = 20 },]\n"
        + "monitor_size = 10\n"
        + "\n"
        + "[run]\n"
        + "duration = 50\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_epidemics"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    for run_name in ["run-0000", "run-0001"] {
        let run_dir = test_dir.join(run_name);
        for file_name in [
            "trajectory.msgpack",
            "samples.msgpack",
            "sumstats.msgpack",
            "outcome.msgpack",
            "counts.tsv",
        ] {
            assert!(run_dir.join(file_name).is_file(), "missing {file_name}");
        }
        let counts = fs::read_to_string(run_dir.join("counts.tsv")).expect("failed to read counts");
        assert!(counts.starts_with("step\tpop\t"));
    }

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("results.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("results.msgpack").exists());

    fs::remove_dir_all(&test_dir).ok();
}
