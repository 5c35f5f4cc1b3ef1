use clap::{Parser, Subcommand};
use ndarray::Array2;
use std::io::{self, BufRead, Write};
use tomo_pick::geometry::Point3;
use tomo_pick::io::{
    export_traveltimes, import_traveltimes, load_session, maybe_autosave, save_session,
};
use tomo_pick::metrics::{
    apparent_velocity, corrected_travel_times, pick_statistics, TimeZero, AIR_VELOCITY,
};
use tomo_pick::picking::{
    ChangeEvent, PanelView, PickController, PointerButton, PointerClick, TargetMode,
};
use tomo_pick::session::{Borehole, GridModel, Session};
use tomo_pick::survey::{AirShot, Mog, TraceSet, UNPICKED};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Builds an acquisition whose waveforms carry a damped-sine first
/// arrival at the given time per trace, over gaussian background noise.
fn synth_traces(
    name: &str,
    pairs: &[(Point3, Point3)],
    arrivals: &[f64],
    rng: &mut SimpleRng,
) -> TraceSet {
    let nsample = 64;
    let dt = 0.8;
    let timestp: Vec<f64> = (0..nsample).map(|s| s as f64 * dt).collect();
    let mut rdata = Array2::zeros((nsample, pairs.len()));
    for (i, &arrival) in arrivals.iter().enumerate() {
        for (s, &t) in timestp.iter().enumerate() {
            let lag = t - arrival;
            let wavelet = if lag >= 0.0 {
                (-lag / 6.0).exp() * (lag * 1.8).sin()
            } else {
                0.0
            };
            rdata[[s, i]] = wavelet + rng.gauss(0.0, 0.02);
        }
    }
    let tx = pairs.iter().map(|p| p.0).collect();
    let rx = pairs.iter().map(|p| p.1).collect();
    TraceSet::new(name, tx, rx, rdata, timestp, "ns", "mV")
}

/// Deterministic crosshole session: one mog between two boreholes, a
/// picked air-shot pair with a known time-zero drift, and picks on the
/// first half of the survey so every command has something to chew on.
fn demo_session(ntrace: usize) -> Session {
    let mut rng = SimpleRng::new(42);
    let velocity = 0.12;
    let spacing = 0.5;
    let offset = 5.0;
    let t0 = TimeZero {
        before: Some(2.0),
        after: Some(2.6),
    };
    let span = (ntrace.saturating_sub(1)).max(1) as f64;

    let pairs: Vec<(Point3, Point3)> = (0..ntrace)
        .map(|i| {
            let z = -(i as f64) * spacing;
            (Point3::new(0.0, 0.0, z), Point3::new(offset, 0.0, z))
        })
        .collect();
    let arrivals: Vec<f64> = (0..ntrace)
        .map(|i| offset / velocity + t0.at(i as f64 / span))
        .collect();
    let mut traces = synth_traces("M01", &pairs, &arrivals, &mut rng);
    for i in 0..ntrace / 2 {
        let jitter = rng.gauss(0.0, 0.15);
        traces.set_pick(i, arrivals[i] + jitter).unwrap();
        traces
            .set_uncertainty(i, 0.2 + 0.3 * rng.next_f64())
            .unwrap();
    }
    let mut mog = Mog::new(traces);
    mog.av = Some(0);
    mog.ap = Some(1);

    let mut air_shots = Vec::new();
    for (name, side) in [("A01", t0.before), ("A02", t0.after)] {
        let distances = [1.0, 2.0, 4.0];
        let pairs: Vec<(Point3, Point3)> = distances
            .iter()
            .map(|&d| (Point3::new(0.0, 0.0, 0.0), Point3::new(d, 0.0, 0.0)))
            .collect();
        let arrivals: Vec<f64> = distances
            .iter()
            .map(|&d| d / AIR_VELOCITY + side.unwrap_or(0.0))
            .collect();
        let mut shot = synth_traces(name, &pairs, &arrivals, &mut rng);
        for (i, &arrival) in arrivals.iter().enumerate() {
            shot.set_pick(i, arrival + rng.gauss(0.0, 0.02)).unwrap();
            shot.set_uncertainty(i, 0.1).unwrap();
        }
        air_shots.push(AirShot::new(shot));
    }

    let mut session = Session::new();
    session
        .boreholes
        .push(Borehole::new("BH-1", Point3::new(0.0, 0.0, 100.0), 20.0));
    session
        .boreholes
        .push(Borehole::new("BH-2", Point3::new(offset, 0.0, 100.0), 20.0));
    session.mogs.push(mog);
    session.air_shots = air_shots;
    session.models.push(GridModel {
        name: "demo-grid".to_string(),
        mog_indices: vec![0],
        cell_size: 0.25,
    });
    session
}

fn target_label(mode: TargetMode) -> &'static str {
    match mode {
        TargetMode::MainSurvey => "main survey",
        TargetMode::AirShotBefore => "before air shot",
        TargetMode::AirShotAfter => "after air shot",
    }
}

fn fmt_t0(side: Option<f64>) -> String {
    match side {
        Some(t) => format!("{t:.3}"),
        None => "none".to_string(),
    }
}

fn write_corrected(path: &str, traces: &TraceSet, corrected: &[f64]) -> std::io::Result<usize> {
    let mut file = std::fs::File::create(path)?;
    let mut count = 0;
    for (i, &t) in corrected.iter().enumerate() {
        if t != UNPICKED {
            writeln!(file, "{} {} {}", i + 1, t, traces.et[i])?;
            count += 1;
        }
    }
    Ok(count)
}

fn print_events(ctl: &mut PickController) {
    for event in ctl.drain_events() {
        match event {
            ChangeEvent::PickSet { trace, time, .. } => {
                println!("Pick {:.3} on trace {}", time, trace + 1)
            }
            ChangeEvent::UncertaintySet {
                trace, half_width, ..
            } => println!("Uncertainty {:.3} on trace {}", half_width, trace + 1),
            ChangeEvent::PickReset { trace, .. } => println!("Cleared trace {}", trace + 1),
            ChangeEvent::TraceChanged { trace } => println!("Trace {}", trace + 1),
            ChangeEvent::TargetChanged { mode } => println!("Target: {}", target_label(mode)),
            ChangeEvent::SurveyChanged { .. } => {}
        }
    }
}

/// Interactive review loop. Trace numbers are 1-based to match the
/// travel-time file format; `save` writes the session and `quit` exits
/// without saving.
fn pick_shell(path: &str, mog: usize) -> bool {
    let mut session = match load_session(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            return false;
        }
    };
    let mut ctl = PickController::new();
    if let Err(e) = ctl.select_survey(&session, mog) {
        eprintln!("Error selecting mog {}: {}", mog, e);
        return false;
    }
    let name = session.mogs[mog].traces.name.clone();
    println!(
        "Picking {} ({} traces). Commands: trace N, pick T, unc T, reset, next, \
         jump on|off, target main|before|after, status, save, quit",
        name,
        session.mogs[mog].traces.ntrace()
    );
    print_events(&mut ctl);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
        let tokens = match shell_words::split(line.trim()) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };
        if tokens.is_empty() {
            continue;
        }
        let committed_before = ctl.picks_committed();
        let args = &tokens[1..];
        let outcome: Result<(), String> = match tokens[0].as_str() {
            "quit" => break,
            "trace" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
                Some(n) if n >= 1 => {
                    ctl.set_trace(&session, n - 1).map_err(|e| e.to_string())
                }
                _ => Err("usage: trace N (1-based)".to_string()),
            },
            "pick" | "unc" => match args.first().and_then(|a| a.parse::<f64>().ok()) {
                Some(time) => {
                    let button = if tokens[0] == "pick" {
                        PointerButton::Primary
                    } else {
                        PointerButton::Secondary
                    };
                    let click = PointerClick {
                        view: PanelView::Waveform,
                        button,
                        x: time,
                        y: 0.0,
                    };
                    ctl.handle_click(&mut session, click, &[])
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
                None => Err(format!("usage: {} T", tokens[0])),
            },
            "reset" => ctl
                .reset_current_trace(&mut session)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            "next" => ctl
                .advance_trace(&session)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            "jump" => match args.first().map(String::as_str) {
                Some("on") => {
                    ctl.jump_to_unpicked = true;
                    Ok(())
                }
                Some("off") => {
                    ctl.jump_to_unpicked = false;
                    Ok(())
                }
                _ => Err("usage: jump on|off".to_string()),
            },
            "target" => match args.first().map(String::as_str) {
                Some("main") => {
                    ctl.set_target_mode(TargetMode::MainSurvey);
                    Ok(())
                }
                Some("before") => {
                    ctl.set_target_mode(TargetMode::AirShotBefore);
                    Ok(())
                }
                Some("after") => {
                    ctl.set_target_mode(TargetMode::AirShotAfter);
                    Ok(())
                }
                _ => Err("usage: target main|before|after".to_string()),
            },
            "status" => match ctl.target_traces(&session) {
                Ok(traces) => {
                    let counts = traces.pick_counts();
                    println!(
                        "{}, trace {} of {}: {} picked, {} pending, {} excluded",
                        target_label(ctl.current_target_mode()),
                        ctl.current_trace_index() + 1,
                        counts.ntrace,
                        counts.picked,
                        counts.pending,
                        counts.excluded
                    );
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
            "save" => match save_session(path, &session) {
                Ok(()) => {
                    println!("Saved {}", path);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
            other => Err(format!("unknown command: {}", other)),
        };
        if let Err(msg) = outcome {
            eprintln!("Error: {}", msg);
            continue;
        }
        print_events(&mut ctl);
        // The cadence predicate is stateless, so only consult it when
        // this command actually committed a pick.
        if ctl.picks_committed() != committed_before {
            match maybe_autosave(path, &session, ctl.picks_committed()) {
                Ok(true) => println!("Autosaved after {} picks", ctl.picks_committed()),
                Ok(false) => {}
                Err(e) => eprintln!("Error autosaving {}: {}", path, e),
            }
        }
    }
    println!(
        "Done: {} picks committed this session",
        ctl.picks_committed()
    );
    true
}

#[derive(Parser)]
#[command(name = "tomo_pick_cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a deterministic demo session to try the other commands on.
    InitDemo {
        path: String,
        #[arg(long, default_value_t = 8)]
        ntrace: usize,
    },
    /// Print record counts and per-mog pick progress for a session.
    Info { session: String },
    /// Import a travel-time file (trace tt et, 1-based) into a mog.
    ImportTt {
        session: String,
        mog: usize,
        file: String,
    },
    /// Export a mog's reviewed picks to a travel-time file.
    ExportTt {
        session: String,
        mog: usize,
        output: String,
    },
    /// Estimate a mog's apparent straight-ray velocity.
    Velocity { session: String, mog: usize },
    /// Apply air-shot time-zero corrections to a mog's travel times.
    Correct {
        session: String,
        mog: usize,
        #[arg(long)]
        output: Option<String>,
    },
    /// Print pick-quality statistics for a mog.
    Stats { session: String, mog: usize },
    /// Print the first trace of a mog still waiting for review.
    NextUnpicked { session: String, mog: usize },
    /// Review a mog's picks interactively.
    Pick { session: String, mog: usize },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if !run(cli.command) {
        std::process::exit(1);
    }
}

fn run(command: Commands) -> bool {
    match command {
        Commands::InitDemo { path, ntrace } => {
            let session = demo_session(ntrace);
            match save_session(&path, &session) {
                Ok(()) => {
                    println!("Wrote demo session ({} traces) to {}", ntrace, path);
                    true
                }
                Err(e) => {
                    eprintln!("Error writing {}: {}", path, e);
                    false
                }
            }
        }
        Commands::Info { session } => match load_session(&session) {
            Ok(s) => {
                println!(
                    "Boreholes: {}\nMogs: {}\nAir shots: {}\nModels: {}",
                    s.boreholes.len(),
                    s.mogs.len(),
                    s.air_shots.len(),
                    s.models.len()
                );
                for (i, mog) in s.mogs.iter().enumerate() {
                    let counts = mog.traces.pick_counts();
                    println!(
                        "[{}] {}: {} of {} picked, {} pending, {} excluded",
                        i,
                        mog.traces.name,
                        counts.picked,
                        counts.ntrace,
                        counts.pending,
                        counts.excluded
                    );
                }
                true
            }
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::ImportTt { session, mog, file } => match load_session(&session) {
            Ok(mut s) => {
                let imported = s
                    .mog_mut(mog)
                    .and_then(|m| import_traveltimes(&file, &mut m.traces));
                match imported {
                    Ok(n) => match save_session(&session, &s) {
                        Ok(()) => {
                            println!("Imported {} travel times into mog {}", n, mog);
                            true
                        }
                        Err(e) => {
                            eprintln!("Error writing {}: {}", session, e);
                            false
                        }
                    },
                    Err(e) => {
                        eprintln!("Error importing {}: {}", file, e);
                        false
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::ExportTt {
            session,
            mog,
            output,
        } => match load_session(&session) {
            Ok(s) => {
                let exported = s
                    .mog(mog)
                    .and_then(|m| export_traveltimes(&output, &m.traces));
                match exported {
                    Ok(n) => {
                        println!("Wrote {} picks to {}", n, output);
                        true
                    }
                    Err(e) => {
                        eprintln!("Error writing {}: {}", output, e);
                        false
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::Velocity { session, mog } => match load_session(&session) {
            Ok(s) => match s.mog(mog) {
                Ok(m) => {
                    let est = apparent_velocity(m);
                    if est.indices.is_empty() {
                        println!("No qualifying picks");
                    } else {
                        println!(
                            "Apparent velocity: {:.4} over {} traces ({})",
                            est.mean,
                            est.indices.len(),
                            if est.weighted {
                                "uncertainty-weighted"
                            } else {
                                "arithmetic mean"
                            }
                        );
                    }
                    true
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    false
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::Correct {
            session,
            mog,
            output,
        } => match load_session(&session) {
            Ok(s) => match s.mog(mog).and_then(|m| corrected_travel_times(m, &s.air_shots)) {
                Ok((corrected, t0)) => {
                    println!(
                        "Time zero: before {}, after {}",
                        fmt_t0(t0.before),
                        fmt_t0(t0.after)
                    );
                    match output {
                        Some(path) => match write_corrected(&path, &s.mogs[mog].traces, &corrected)
                        {
                            Ok(n) => {
                                println!("Wrote {} corrected travel times to {}", n, path);
                                true
                            }
                            Err(e) => {
                                eprintln!("Error writing {}: {}", path, e);
                                false
                            }
                        },
                        None => {
                            for (i, &t) in corrected.iter().enumerate() {
                                if t != UNPICKED {
                                    println!("{} {:.3}", i + 1, t);
                                }
                            }
                            true
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    false
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::Stats { session, mog } => match load_session(&session) {
            Ok(s) => match s.mog(mog) {
                Ok(m) => {
                    let stats = pick_statistics(m);
                    println!(
                        "Traces: {} ({} picked, {} pending, {} excluded)",
                        stats.counts.ntrace,
                        stats.counts.picked,
                        stats.counts.pending,
                        stats.counts.excluded
                    );
                    println!(
                        "Travel time: mean {:.3}, std {:.3}",
                        stats.tt_mean, stats.tt_std
                    );
                    println!(
                        "Velocity: mean {:.4}, std {:.4}",
                        stats.velocity_mean, stats.velocity_std
                    );
                    println!(
                        "Incidence angle: {:.1} to {:.1} deg",
                        stats.angle_min, stats.angle_max
                    );
                    true
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    false
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::NextUnpicked { session, mog } => match load_session(&session) {
            Ok(s) => match s.mog(mog).and_then(|m| m.traces.next_unpicked()) {
                Ok(index) => {
                    println!("Next unpicked trace: {}", index + 1);
                    true
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    false
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", session, e);
                false
            }
        },
        Commands::Pick { session, mog } => pick_shell(&session, mog),
    }
}
