use chrono::Utc;
use clap::Parser;
use database::{Database, DocumentStore, SnapshotStore};
use log::info;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use tokio::runtime::Runtime;

// =================================================================================================
//                                     COMMAND LINE ARGUMENTS
// =================================================================================================

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MongoDB connection string, including the database name.
    #[arg(long, default_value = database::DEFAULT_URI)]
    uri: String,
}

// =================================================================================================
//                                          ENTRYPOINT
// =================================================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let runtime = Runtime::new()?;

    println!("Connecting to {}", args.uri);
    let snapshots = SnapshotStore::new(runtime.block_on(Database::connect(&args.uri))?);
    println!("Successfully connected. Type 'help' for commands.");

    let mut rl = Editor::<(), _>::new()?;
    loop {
        let readline = rl.readline(">> ");
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let parts: Vec<&str> = line.split_whitespace().collect();
                if let Some(command) = parts.first() {
                    if !handle_command(command, &parts[1..], &snapshots, &runtime) {
                        break; // Exit command was received
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Exiting.");
                break;
            }
            Err(err) => {
                println!("[CLI Error: {:?}]", err);
                break;
            }
        }
    }

    runtime.block_on(snapshots.into_inner().disconnect());
    info!("Closed the database connection");
    Ok(())
}

// =================================================================================================
//                                            COMMANDS
// =================================================================================================

fn handle_command(
    command: &str,
    args: &[&str],
    snapshots: &SnapshotStore<Database>,
    runtime: &Runtime,
) -> bool {
    match command.to_lowercase().as_str() {
        "get_player" => {
            if let Some(name) = args.first() {
                match runtime.block_on(snapshots.load_player(name)) {
                    Ok(Some(record)) => {
                        println!("{} ({}, owner {})", record.name, record.ctype, record.owner);
                        println!(
                            "  at {} ({:.0}, {:.0}) in {} on {} {}",
                            record.map,
                            record.x,
                            record.y,
                            record.instance,
                            record.server_region,
                            record.server_identifier
                        );
                        let listings = record.slots.values().flatten().count();
                        let items = record.items.iter().flatten().count();
                        println!("  {} item(s), {} listing(s)", items, listings);
                        if record.rip {
                            println!("  dead");
                        }
                    }
                    Ok(None) => println!("No record for {}", name),
                    Err(e) => eprintln!("Error getting player: {}", e),
                }
            } else {
                eprintln!("Usage: get_player <name>");
            }
        }
        "last_seen" => {
            if let Some(name) = args.first() {
                match runtime.block_on(snapshots.load_player(name)) {
                    Ok(Some(record)) => match record.last_seen_at() {
                        Some(seen) => {
                            let ago = Utc::now().signed_duration_since(seen);
                            println!("{} was last seen {} ({}s ago)", name, seen, ago.num_seconds());
                        }
                        None => println!("{} has never been seen", name),
                    },
                    Ok(None) => println!("No record for {}", name),
                    Err(e) => eprintln!("Error getting player: {}", e),
                }
            } else {
                eprintln!("Usage: last_seen <name>");
            }
        }
        "get_document" => {
            let collection = args.first().and_then(|name| database::Collection::from_name(name));
            if let (Some(collection), true) = (collection, args.len() > 1) {
                let fields = collection.key_fields();
                if args.len() - 1 != fields.len() {
                    eprintln!("{} is keyed by: {}", collection, fields.join(", "));
                    return true;
                }
                let key = fields
                    .iter()
                    .zip(&args[1..])
                    .fold(database::DocumentKey::new(), |key, (field, value)| {
                        key.with(field, key_value(value))
                    });
                match runtime.block_on(snapshots.store().find(collection, &key)) {
                    Ok(Some(document)) => println!("{:#}", document),
                    Ok(None) => println!("Nothing in {} for that key", collection),
                    Err(e) => eprintln!("Error getting document: {}", e),
                }
            } else {
                eprintln!("Usage: get_document <collection> <key values...>");
            }
        }
        "delete_player" => {
            if let Some(name) = args.first() {
                match runtime.block_on(snapshots.delete_player(name)) {
                    Ok(true) => println!("Deleted the record for {}", name),
                    Ok(false) => println!("No record for {}", name),
                    Err(e) => eprintln!("Error deleting player: {}", e),
                }
            } else {
                eprintln!("Usage: delete_player <name>");
            }
        }
        "help" => {
            println!("Available commands:");
            println!("  get_player <name>");
            println!("  last_seen <name>");
            println!("  get_document <collection> <key values...>");
            println!("  delete_player <name>");
            println!("  exit");
        }
        "exit" | "quit" => return false,
        _ => println!("Unknown command. Type 'help' for a list of commands."),
    }
    true
}

/// Numbers typed at the prompt are looked up as numbers, so keys such as a
/// death's `time` can match.
fn key_value(arg: &str) -> Value {
    if let Ok(integer) = arg.parse::<i64>() {
        return Value::from(integer);
    }
    match arg.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::from(arg),
    }
}
