//! costledger-check - Check a ledger's integrity and reconcile it with its journal.

fn main() -> std::process::ExitCode {
    costledger::cmd::check::main()
}
