//! `strobe run`: simulate the clocked greeting design.
//!
//! Loads `strobe.toml`, declares its clocks (plus the default `clock` when the
//! file does not define one), registers a process that greets on every rising
//! edge of `clock`, and runs until the end time. Greetings go to stdout as
//! they fire, the run summary to stderr.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use strobe_config::{parse_duration, StrobeConfig, CONFIG_FILE_NAME};
use strobe_sim::{
    ClockSpec, JsonLinesTrace, ProcessSpec, RunSummary, Scheduler, Sensitivity, SimConfig,
    SimError, SimTime, StopCondition,
};
use tracing::info;

use crate::{GlobalArgs, RunArgs};

/// Name of the clock the greeting process listens to.
pub const CLOCK_NAME: &str = "clock";

/// End time used when neither the command line nor the config sets one.
pub const DEFAULT_END_TIME: SimTime = SimTime::from_ns(10);

/// Toggle interval of the default clock.
pub const DEFAULT_HALF_PERIOD: SimTime = SimTime::from_ns(1);

/// Runs the `strobe run` command.
///
/// Returns exit code 0 when the simulation completes.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_settings(global)?;

    let end = match &args.time {
        Some(t) => parse_duration("--time", t)?,
        None => config.simulation.end_time()?.unwrap_or(DEFAULT_END_TIME),
    };
    let sim_config = run_config(&config, args)?;
    let mut sched = build_design(&config, sim_config, Box::new(io::stdout()))?;

    let trace_path = args
        .trace
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| config.simulation.trace.clone());
    if let Some(path) = &trace_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        sched.set_trace_sink(Box::new(JsonLinesTrace::new(writer)))?;
    }

    info!(end = %end, "simulating");
    let summary = sched.start(StopCondition::Until(end))?;

    if args.json {
        println!("{}", serde_json::to_string(&summary)?);
    }
    if !global.quiet {
        eprintln!("   {}", describe(&summary));
        if let Some(path) = &trace_path {
            eprintln!("   Trace written to {}", path.display());
        }
    }
    Ok(0)
}

/// Loads the configuration named by `--config`, or `./strobe.toml` if present.
fn load_settings(global: &GlobalArgs) -> Result<StrobeConfig, Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) => {
            let path = Path::new(path);
            if path.is_dir() {
                Ok(strobe_config::load_config(path)?)
            } else {
                let content = std::fs::read_to_string(path)?;
                Ok(strobe_config::load_config_from_str(&content)?)
            }
        }
        None => {
            let cwd = std::env::current_dir()?;
            if cwd.join(CONFIG_FILE_NAME).is_file() {
                Ok(strobe_config::load_config(&cwd)?)
            } else {
                Ok(StrobeConfig::default())
            }
        }
    }
}

/// Kernel settings for a CLI run: the config values, `--max-deltas`, and no
/// in-memory trace.
fn run_config(
    config: &StrobeConfig,
    args: &RunArgs,
) -> Result<SimConfig, Box<dyn std::error::Error>> {
    let mut sim_config = config.simulation.sim_config();
    sim_config.record_trace = false;
    if let Some(max) = args.max_deltas {
        if max == 0 {
            return Err("--max-deltas must be positive".into());
        }
        sim_config.max_delta_cycles = max;
    }
    Ok(sim_config)
}

/// Elaborates the greeting design into an idle scheduler.
///
/// The `hello` process writes one line to `out` per rising edge of `clock`.
pub fn build_design(
    config: &StrobeConfig,
    sim_config: SimConfig,
    mut out: Box<dyn Write>,
) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let mut sched = Scheduler::new(sim_config);
    for (name, def) in &config.clocks {
        sched.add_clock(name, def.spec(name)?)?;
    }
    let clock = match sched.lookup(CLOCK_NAME) {
        Some(id) => id,
        None => sched.add_clock(CLOCK_NAME, ClockSpec::with_half_period(DEFAULT_HALF_PERIOD))?,
    };

    sched.add_process(
        ProcessSpec::new("hello").sensitive_to(Sensitivity::posedge(clock)),
        move |ctx| -> Result<(), SimError> {
            writeln!(out, "Hello, strobe! Time: {}", ctx.now())?;
            Ok(())
        },
    )?;
    Ok(sched)
}

fn describe(summary: &RunSummary) -> String {
    format!(
        "Finished at {} ({}): {} time steps, {} delta cycles, {} process runs",
        summary.final_time,
        summary.reason,
        summary.time_steps,
        summary.delta_cycles,
        summary.process_runs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use strobe_config::load_config_from_str;
    use strobe_sim::HaltReason;
    use tempfile::TempDir;

    /// Captures greeting output for inspection after the run.
    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.borrow())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn no_flags() -> RunArgs {
        RunArgs {
            time: None,
            trace: None,
            max_deltas: None,
            json: false,
        }
    }

    fn quiet(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config,
        }
    }

    #[test]
    fn default_design_greets_on_odd_nanoseconds() {
        let out = Captured::default();
        let mut sched = build_design(
            &StrobeConfig::default(),
            SimConfig::default(),
            Box::new(out.clone()),
        )
        .unwrap();
        let summary = sched.start(StopCondition::Until(DEFAULT_END_TIME)).unwrap();

        assert_eq!(summary.final_time, SimTime::from_ns(10));
        assert_eq!(summary.reason, HaltReason::EndTime);
        assert_eq!(
            out.lines(),
            vec![
                "Hello, strobe! Time: 1 ns",
                "Hello, strobe! Time: 3 ns",
                "Hello, strobe! Time: 5 ns",
                "Hello, strobe! Time: 7 ns",
                "Hello, strobe! Time: 9 ns",
            ]
        );
    }

    #[test]
    fn configured_clock_replaces_the_default() {
        let config = load_config_from_str(
            r#"
[clocks.clock]
period = "10ns"
"#,
        )
        .unwrap();
        let out = Captured::default();
        let mut sched =
            build_design(&config, SimConfig::default(), Box::new(out.clone())).unwrap();
        sched.run_for(SimTime::from_ns(30)).unwrap();
        let lines = out.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Hello, strobe! Time: 5 ns");
    }

    #[test]
    fn greetings_are_written_before_a_failed_run_ends() {
        let out = Captured::default();
        let mut sched = build_design(
            &StrobeConfig::default(),
            SimConfig::default(),
            Box::new(out.clone()),
        )
        .unwrap();
        let clock = sched.lookup(CLOCK_NAME).unwrap();
        sched
            .add_process(
                ProcessSpec::new("fault").sensitive_to(Sensitivity::posedge(clock)),
                |ctx| {
                    if ctx.now() >= SimTime::from_ns(5) {
                        return Err(ctx.fail("stuck"));
                    }
                    Ok(())
                },
            )
            .unwrap();
        assert!(sched.start(StopCondition::Until(DEFAULT_END_TIME)).is_err());
        assert_eq!(
            out.lines()[..2],
            ["Hello, strobe! Time: 1 ns", "Hello, strobe! Time: 3 ns"]
        );
    }

    #[test]
    fn cli_run_keeps_no_memory_trace() {
        let config = StrobeConfig::default();
        let sim_config = run_config(&config, &no_flags()).unwrap();
        assert!(!sim_config.record_trace);

        let mut sched = build_design(&config, sim_config, Box::new(io::sink())).unwrap();
        let summary = sched.start(StopCondition::Until(SimTime::from_ns(100))).unwrap();
        assert!(summary.process_runs > 0);
        assert!(sched.trace().is_empty());
    }

    #[test]
    fn extra_clocks_are_declared() {
        let config = load_config_from_str(
            r#"
[clocks.aux]
period = "4ns"
"#,
        )
        .unwrap();
        let sched = build_design(&config, SimConfig::default(), Box::new(io::sink())).unwrap();
        assert!(sched.lookup("aux").is_some());
        assert!(sched.lookup(CLOCK_NAME).is_some());
    }

    #[test]
    fn run_writes_json_lines_trace() {
        let tmp = TempDir::new().unwrap();
        let trace = tmp.path().join("out").join("trace.jsonl");
        let args = RunArgs {
            time: Some("4ns".into()),
            trace: Some(trace.to_str().unwrap().to_string()),
            max_deltas: None,
            json: false,
        };
        let code = run(&args, &quiet(Some(tmp.path().to_str().unwrap().to_string())));
        // The directory has no strobe.toml, so loading it fails.
        assert!(code.is_err());

        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let code = run(&args, &quiet(Some(tmp.path().to_str().unwrap().to_string()))).unwrap();
        assert_eq!(code, 0);

        let content = std::fs::read_to_string(&trace).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["signal"], "clock");
        assert_eq!(lines[0]["time_fs"], 1_000_000);
        assert_eq!(lines[0]["value"]["bool"], true);
    }

    #[test]
    fn config_file_sets_end_time() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        let trace = tmp.path().join("t.jsonl");
        std::fs::write(
            &path,
            format!(
                "[simulation]\nend_time = \"2ns\"\ntrace = {:?}\n",
                trace.to_str().unwrap()
            ),
        )
        .unwrap();
        let args = RunArgs {
            time: None,
            trace: None,
            max_deltas: None,
            json: false,
        };
        run(&args, &quiet(Some(path.to_str().unwrap().to_string()))).unwrap();
        let content = std::fs::read_to_string(&trace).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn zero_max_deltas_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let args = RunArgs {
            time: None,
            trace: None,
            max_deltas: Some(0),
            json: false,
        };
        let err = run(&args, &quiet(Some(tmp.path().to_str().unwrap().to_string()))).unwrap_err();
        assert!(err.to_string().contains("--max-deltas"));
    }

    #[test]
    fn bad_time_flag_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let args = RunArgs {
            time: Some("soon".into()),
            trace: None,
            max_deltas: None,
            json: false,
        };
        let err = run(&args, &quiet(Some(tmp.path().to_str().unwrap().to_string()))).unwrap_err();
        assert!(err.to_string().contains("--time"));
    }

    #[test]
    fn summary_description() {
        let summary = RunSummary {
            final_time: SimTime::from_ns(10),
            time_steps: 10,
            delta_cycles: 15,
            process_runs: 15,
            reason: HaltReason::EndTime,
        };
        assert_eq!(
            describe(&summary),
            "Finished at 10 ns (end time reached): 10 time steps, 15 delta cycles, 15 process runs"
        );
    }
}
