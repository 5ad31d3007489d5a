use clap::Parser;
use dojo_cli::{
    cmd::{Args, Completion},
    logger,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    logger::init();

    match args.exec().await {
        Ok(Completion::Finished) => {}
        Ok(Completion::Cancelled) => std::process::exit(130),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            std::process::exit(1);
        }
    }
}
