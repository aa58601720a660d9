use librarian::{DriveKind, Library, LibrarianConfig, logging};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Folders,
    Move {
        file_id: String,
        destination_id: String,
        kind: DriveKind,
    },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliMode::Help);
    };
    match command.as_str() {
        "--help" | "-h" | "help" => Ok(CliMode::Help),
        "folders" => match args.next() {
            None => Ok(CliMode::Folders),
            Some(other) => anyhow::bail!("unexpected argument: {other}"),
        },
        "move" => {
            let mut positional = Vec::new();
            let mut kind = DriveKind::Unspecified;
            for arg in args {
                match arg.as_str() {
                    "--team" => kind = DriveKind::Team,
                    "--shared" => kind = DriveKind::Shared,
                    other if other.starts_with("--") => anyhow::bail!("unknown flag: {other}"),
                    _ => positional.push(arg),
                }
            }
            let [file_id, destination_id] = <[String; 2]>::try_from(positional)
                .map_err(|_| anyhow::anyhow!("usage: librarian move <file-id> <destination-id>"))?;
            Ok(CliMode::Move {
                file_id,
                destination_id,
                kind,
            })
        }
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn print_help() {
    println!("Usage: librarian <command>");
    println!("  folders                                  Print the folder tree as JSON");
    println!("  move <file-id> <destination-id> [--team|--shared]");
    println!("                                           Move a file and print the redirect path");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        print_help();
        return Ok(());
    }

    let config = LibrarianConfig::from_env()?;
    logging::init(&config.log_filter);
    let library = Library::bootstrap(config).await?;

    match mode {
        CliMode::Folders => {
            let folders = library.get_folders().await;
            println!("{}", serde_json::to_string_pretty(&folders)?);
        }
        CliMode::Move {
            file_id,
            destination_id,
            kind,
        } => {
            let path = library.move_file(&file_id, &destination_id, kind).await?;
            println!("{path}");
        }
        CliMode::Help => {}
    }
    Ok(())
}
