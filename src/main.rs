//! rattendance main entrypoint.

use rattendance::run;
use rattendance::ui::messages::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error(e);
        std::process::exit(1);
    }
}
