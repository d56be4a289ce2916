use clap::Parser;
use std::cell::RefCell;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Error as IoError};
use std::rc::Rc;

mod events;
mod physics;
mod sources;

use events::{get_ts, parse_event, serialize_event, LogEvent, ReplayMirror};
use murkkusw::shared::avoidance::AvoidanceController;
use murkkusw::shared::RandTurnRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sources::{SimActuator, SimClock, SimRig, SimSensor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file path or '-' for stdin (replay verification mode)
    #[arg(required_unless_present = "sim")]
    source: Option<String>,

    /// Enable debug prints
    #[arg(long, short)]
    debug: bool,

    /// Run in simulation mode (ignores source)
    #[arg(long, short)]
    sim: bool,

    /// Arena width in mm (simulation only)
    #[arg(long, default_value_t = 3000.0)]
    arena_width: f32,

    /// Arena height in mm (simulation only)
    #[arg(long, default_value_t = 3000.0)]
    arena_height: f32,

    /// Whether to omit the box obstacle from the arena (simulation only)
    #[arg(long)]
    no_object: bool,

    /// RNG seed for sensor noise and turn direction picks
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Virtual seconds to simulate
    #[arg(long, default_value_t = 30.0)]
    seconds: f32,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if args.sim {
        run_simulation(&args);
        return Ok(());
    }

    let source = args
        .source
        .as_ref()
        .ok_or("Source argument required when not in simulation mode")?;
    let lines: Box<dyn Iterator<Item = Result<String, IoError>>> = if source == "-" {
        Box::new(io::stdin().lines())
    } else {
        let file = File::open(source)?;
        Box::new(BufReader::new(file).lines())
    };
    replay_log(lines, args.debug)
}

fn run_simulation(args: &Args) {
    let rig = Rc::new(RefCell::new(SimRig::new(
        args.arena_width,
        args.arena_height,
        args.no_object,
        args.seed,
    )));

    let mut controller = AvoidanceController::new(
        SimSensor(rig.clone()),
        SimActuator(rig.clone()),
        SimClock(rig.clone()),
        RandTurnRng(StdRng::seed_from_u64(args.seed)),
    );

    let end_us = (args.seconds * 1_000_000.0) as u64;
    let mut ticks: u64 = 0;
    let mut maneuvers: u64 = 0;
    let mut escalations: u64 = 0;

    while rig.borrow().now_us() < end_us {
        let outcome = controller.tick();
        ticks += 1;

        let mut pending = rig.borrow_mut().drain_events();
        if let Some(m) = outcome.maneuver {
            maneuvers += 1;
            if m.looping {
                escalations += 1;
            }
            pending.push(LogEvent::Maneuver(rig.borrow().now_us(), m));
        }
        {
            let r = rig.borrow();
            pending.push(LogEvent::Pose(
                r.now_us(),
                r.rover.pos_x,
                r.rover.pos_y,
                r.rover.heading,
            ));
        }
        pending.sort_by_key(get_ts);
        for event in &pending {
            println!("{}", serialize_event(event));
        }

        if args.debug {
            if let Some(m) = outcome.maneuver {
                eprintln!(
                    "tick {}: {} cm, burst={} looping={} {}",
                    ticks,
                    outcome.distance_cm,
                    m.burst_count,
                    m.looping,
                    if m.turn_right { "R" } else { "L" }
                );
            }
        }
    }

    let r = rig.borrow();
    eprintln!(
        "Simulated {:.1}s: {} ticks, {} maneuvers ({} escalated), final pose ({:.0}, {:.0}) heading {:.2}",
        r.now_us() as f32 / 1_000_000.0,
        ticks,
        maneuvers,
        escalations,
        r.rover.pos_x,
        r.rover.pos_y,
        r.rover.heading,
    );
}

fn replay_log(
    lines: Box<dyn Iterator<Item = Result<String, IoError>>>,
    debug: bool,
) -> Result<(), Box<dyn Error>> {
    let mut mirror = ReplayMirror::new();
    let mut line_no: u64 = 0;
    let mut maneuvers: u64 = 0;
    let mut mismatches: u64 = 0;

    for line_res in lines {
        let line = line_res?;
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event = match parse_event(&line) {
            Ok(event) => event,
            Err(e) => {
                eprintln!("Skipping invalid line {}: {} (error: {})", line_no, line.trim(), e);
                continue;
            }
        };
        match event {
            LogEvent::Distance(ts, cm) => {
                mirror.on_distance(ts, cm);
                if debug {
                    eprintln!("Distance ts={} {} cm", ts, cm);
                }
            }
            LogEvent::Maneuver(ts, logged) => {
                maneuvers += 1;
                if let Some(why) = mirror.check_maneuver(&logged) {
                    mismatches += 1;
                    eprintln!("Mismatch at line {} (ts={}): {}", line_no, ts, why);
                }
            }
            LogEvent::Drive(..) | LogEvent::Pose(..) => {}
        }
    }

    println!(
        "Replayed {} lines: {} maneuvers, {} mismatches",
        line_no, maneuvers, mismatches
    );
    if mismatches > 0 {
        return Err(format!("{} maneuvers disagree with the recorded log", mismatches).into());
    }
    Ok(())
}
