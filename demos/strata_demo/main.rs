//! # strata demo application
//!
//! A small CLI that declares its parameters as strata sections, registers
//! them on a clap command, and prints every resolved value with the source
//! it came from. It exists to exercise the pipeline by hand.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example strata_demo -- greet world
//! RUST_LOG=strata=debug cargo run --example strata_demo -- greet world
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature              | How to exercise it                                                    |
//! |----------------------|-----------------------------------------------------------------------|
//! | Defaults             | `cargo run --example strata_demo`                                     |
//! | Config file (cwd)    | Create `config.yaml` with `server: {port: 9000}` in cwd               |
//! | Explicit config file | `cargo run --example strata_demo -- --config other.yaml`              |
//! | Env var override     | `STRATA_DEMO_SERVER_PORT=7000 cargo run --example strata_demo`        |
//! | Flag override        | `cargo run --example strata_demo -- --server-host example.org`        |
//! | Positional args      | `cargo run --example strata_demo -- greet alice bob`                  |
//! | Profiles             | `cargo run --example strata_demo -- --profile dev --profile-file p.yaml` |
//! | Secret masking       | `STRATA_DEMO_SERVER_TOKEN=abc cargo run --example strata_demo`        |

use clap::{Arg, Command};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use strata::definition::render_value;
use strata::inspect;
use strata::{
    ClapCli, Definition, ParamValue, ParameterType, Schema, SearchPath, Section, Strata,
    StrataError,
};

const APP_NAME: &str = "strata-demo";

#[derive(Debug, Deserialize)]
struct Server {
    host: String,
    port: i64,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}

fn schema() -> Result<Schema, StrataError> {
    let default = Section::builder("default", "Command")
        .with_fields([
            Definition::new("verbose", ParameterType::Bool)
                .with_short('v')
                .with_help("Print the provenance log of every value"),
            Definition::new("greeting", ParameterType::Choice)
                .with_choices(["hello", "hi", "hey"])
                .with_default("hello"),
        ])
        .with_arguments([
            Definition::new("action", ParameterType::String).with_default("show"),
            Definition::new("names", ParameterType::StringList).with_help("Who to greet"),
        ])
        .build()?;
    let server = Section::builder("server", "Server")
        .with_prefix("server-")
        .with_description("Where the demo would connect")
        .with_fields([
            Definition::new("host", ParameterType::String).with_default("localhost"),
            Definition::new("port", ParameterType::Int).with_default(8080i64),
            Definition::new("token", ParameterType::Secret),
            Definition::new("labels", ParameterType::KeyValue),
        ])
        .build()?;
    Schema::from_sections([default, server])
}

fn command(schema: &Schema) -> Result<Command, StrataError> {
    let base = Command::new(APP_NAME)
        .about("Resolve layered parameters and show where they came from")
        .arg(Arg::new("config").long("config").value_name("FILE"))
        .arg(Arg::new("profile").long("profile").value_name("NAME"))
        .arg(Arg::new("profile-file").long("profile-file").value_name("FILE"));
    let mut cli = ClapCli::new(base);
    for section in schema.iter() {
        section.add_to_cli(&mut cli)?;
    }
    Ok(cli.build())
}

fn run() -> Result<(), StrataError> {
    let schema = schema()?;
    let matches = command(&schema)?.get_matches();

    let builder = Strata::builder().app_name(APP_NAME).cli(&matches);
    let builder = match matches.get_one::<String>("config") {
        Some(path) => builder.config_file(path),
        None => builder.add_search_path(SearchPath::Cwd),
    };
    let builder = match matches.get_one::<String>("profile") {
        Some(name) => builder.profile(name),
        None => builder,
    };
    let builder = match matches.get_one::<String>("profile-file") {
        Some(path) => builder.profile_file(path),
        None => builder,
    };

    let values = builder.load(&schema)?;
    let server: Server = values.decode_section("server")?;
    let greeting = values
        .get_value("default", "greeting")
        .map(render_value)
        .unwrap_or_default();
    let action = values
        .get_value("default", "action")
        .map(render_value)
        .unwrap_or_default();

    println!("{action}: {greeting} from {}:{}", server.host, server.port);
    if let Some(ParamValue::StringList(names)) = values.get_value("default", "names") {
        for name in names {
            println!("  {greeting}, {name}!");
        }
    }

    let report = inspect::describe(&values);
    let verbose = matches!(
        values.get_value("default", "verbose"),
        Some(ParamValue::Bool(true))
    );
    if verbose {
        println!("\n{report}");
    } else {
        for p in &report.parameters {
            println!("{}.{} = {}  ({})", p.section, p.name, p.value, p.source);
        }
    }
    Ok(())
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
