//! costledger-replay - Replay an event file and print its postings.

fn main() -> std::process::ExitCode {
    costledger::cmd::replay_cmd::main()
}
