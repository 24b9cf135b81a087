use std::{fs, process};

use cachesim::config::{Config, Parameter};
use cachesim::sim::Simulator;
use cachesim::trace::Trace;

fn main() {
    let mut args = pico_args::Arguments::from_env();

    let mut config: Config = if let Some(config_path) = args
        .opt_value_from_str::<_, String>("-p")
        .expect("-p should be a path")
    {
        let config_str = fs::read_to_string(config_path).expect("Could not read config file");
        serde_json::from_str(&config_str).expect("Config file is not valid JSON")
    } else {
        Config::default()
    };

    // CLI flags override the config file, one parameter per flag.
    if let Some(v) = args.opt_value_from_str("-bs").expect("-bs should be an integer") {
        config.set(Parameter::BlockSize(v));
    }
    if let Some(v) = args.opt_value_from_str("-us").expect("-us should be an integer") {
        config.set(Parameter::UnifiedSize(v));
    }
    if let Some(v) = args.opt_value_from_str("-is").expect("-is should be an integer") {
        config.set(Parameter::InstSize(v));
    }
    if let Some(v) = args.opt_value_from_str("-ds").expect("-ds should be an integer") {
        config.set(Parameter::DataSize(v));
    }
    if let Some(v) = args.opt_value_from_str("-a").expect("-a should be an integer") {
        config.set(Parameter::Associativity(v));
    }
    if args.contains("-wb") {
        config.set(Parameter::WriteBack);
    }
    if args.contains("-wt") {
        config.set(Parameter::WriteThrough);
    }
    if args.contains("-wa") {
        config.set(Parameter::WriteAlloc);
    }
    if args.contains("-nw") {
        config.set(Parameter::NoWriteAlloc);
    }

    let heartbeat_int: u64 = args
        .opt_value_from_str("-h")
        .expect("-h should be an integer")
        .unwrap_or(0);
    let json_path: Option<String> = args.opt_value_from_str("--json").unwrap();
    let records_per_batch: usize = args
        .opt_value_from_str("--buffer-size")
        .expect("--buffer-size must be an integer")
        .unwrap_or(1024 * 16);
    let batches_per_queue: usize = args
        .opt_value_from_str("--queue-size")
        .expect("--queue-size must be an integer")
        .unwrap_or(32);
    let trace_path: String = args
        .opt_value_from_str("-t")
        .unwrap()
        .expect("Must provide a trace with -t");

    let unused = args.finish();
    if !unused.is_empty() {
        eprintln!("unrecognized arguments: {unused:?}");
        process::exit(1);
    }

    let mut sim = match Simulator::new(config) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("cache configuration error: {err}");
            process::exit(1);
        }
    };
    println!("{}", sim.config());

    let trace = Trace::open(trace_path.into(), records_per_batch, batches_per_queue)
        .expect("Could not open trace file");

    let mut n_records: u64 = 0;
    let mut next_heartbeat = heartbeat_int;
    for batch in trace.rec.iter() {
        let records = match batch {
            Ok(records) => records,
            Err(err) => {
                eprintln!("trace error: {err}");
                process::exit(1);
            }
        };
        for record in records {
            sim.access(record.addr, record.kind);
            n_records += 1;
        }
        if heartbeat_int != 0 && n_records > next_heartbeat {
            println!("Records: {n_records}");
            while next_heartbeat < n_records {
                next_heartbeat += heartbeat_int;
            }
        }
    }
    sim.flush();

    println!("Replayed {n_records} trace records");
    println!("{}", sim.stats());

    if let Some(path) = json_path {
        let stats_file = fs::File::create(path).expect("Cannot open output file");
        serde_json::to_writer_pretty(stats_file, sim.stats()).unwrap();
    }
}
