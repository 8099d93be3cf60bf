use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    guardsql_lib::run().await
}
