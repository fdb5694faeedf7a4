// Copyright (c) 2020 White Leaf
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use anyhow::{anyhow, Error};
use clap::{App, Arg, ArgMatches};
use config::Config;
use controller::{chronological_split, Split, ToTable};
use engine::{EvaluationReport, Engine};
use simplelog::{ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn cli() -> App<'static, 'static> {
    App::new("poi-recommender")
        .version(VERSION)
        .about("Trains and evaluates a geo and weather aware POI recommender")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration, defaults are used when missing")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("checkins")
                .long("checkins")
                .value_name("TSV")
                .help("user, item and time per line")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("coordinates")
                .long("coordinates")
                .value_name("TSV")
                .help("item, latitude and longitude per line")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("weather")
                .long("weather")
                .value_name("TSV")
                .help("time and feature value per line, needed by weather and context models")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Logs at debug level"),
        )
}

fn init_logger(matches: &ArgMatches) -> Result<(), Error> {
    let level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    TermLogger::init(level, ConfigBuilder::new().build(), TerminalMode::Mixed)
        .map_err(|e| anyhow!("Couldn't initialize the logger: {:?}", e))
}

fn print_report(name: &str, report: &EvaluationReport) {
    println!("{} results:", name);
    println!("{}", report.measures().to_table());
    println!("{}", report.counters().to_table());
}

fn main() -> Result<(), Error> {
    let matches = cli().get_matches();
    init_logger(&matches)?;

    let config = match matches.value_of("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let checkins_path = matches
        .value_of("checkins")
        .ok_or_else(|| anyhow!("Missing check-ins file"))?;
    let coordinates_path = matches
        .value_of("coordinates")
        .ok_or_else(|| anyhow!("Missing coordinates file"))?;

    let checkins = checkins_tsv::read_checkins(checkins_path)?;
    println!("Loaded check-ins:");
    println!("{}", checkins.stats().to_table());

    let active = checkins.retain_active(config.data.min_item_checkins, config.data.min_user_checkins);
    println!("Active check-ins:");
    println!("{}", active.stats().to_table());

    let Split {
        training,
        validation,
        test,
    } = chronological_split(&active, config.data.train_ratio, config.data.test_ratio)?;

    let coords = checkins_tsv::read_coordinates(coordinates_path)?;
    let weather = match matches.value_of("weather") {
        Some(path) => Some(checkins_tsv::read_weather(path, config.context.resolution_secs)?),
        None => None,
    };

    let engine = Engine::with_config(config);
    if engine.mode().uses_buckets() && weather.is_none() {
        return Err(anyhow!("The {} model needs --weather", engine.mode()));
    }

    let store = engine.initial_store(&training)?;
    let (model, summary) = engine.train(&training, &validation, &test, store, &coords, weather.as_ref())?;

    if !summary.excluded_items.is_empty() {
        log::warn!(
            "{} items trained without a geo affinity row",
            summary.excluded_items.len()
        );
    }

    print_report("Validation", &engine.evaluate(&model, &validation, &training)?);
    print_report("Test", &engine.evaluate(&model, &test, &training)?);

    Ok(())
}
