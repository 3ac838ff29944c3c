#[path = "integration/cli.rs"]
mod cli;
#[path = "integration/readline.rs"]
mod readline;
#[path = "integration/session.rs"]
mod session;
#[path = "integration/streaming.rs"]
mod streaming;
