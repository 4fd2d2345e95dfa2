mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::MigrationProgress;
pub use styling::{dim, failure, magenta_bold};
pub use summary::print_summary;

/// Prints the log migrator banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📦 Log Migrator"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Migrates CI build and release logs to cloud storage")
    );
}
