//! costledger-report - Inventory cost reports from an event file.

fn main() -> std::process::ExitCode {
    costledger::cmd::report_cmd::main()
}
