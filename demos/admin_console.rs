use checkout_journal::facade::DEFAULT_TAIL_LINES;
use checkout_journal::{LogFacade, LoggerConfig};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config = match LoggerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(2);
        }
    };
    let journal = LogFacade::assemble(config);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("tail") => {
            let lines = args
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_TAIL_LINES);
            println!("{}", journal.tail(lines));
        }
        Some("rotate") => match journal.force_rotate() {
            Ok(path) => println!("rotated to {}", path.display()),
            Err(err) => println!("nothing rotated: {err}"),
        },
        Some("purge") => println!("{} rotated file(s) deleted", journal.purge()),
        _ => match serde_json::to_string_pretty(&journal.stats()) {
            Ok(stats) => println!("{stats}"),
            Err(err) => eprintln!("could not render stats: {err}"),
        },
    }
}
