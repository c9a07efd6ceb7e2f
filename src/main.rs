use std::sync::Arc;
use std::time::Duration;

use msgvisor::{Config, LogWriter, SimBackend, Subscribe, Supervisor, SyntheticSource};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::default();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let supervisor = Supervisor::new(cfg.clone(), subs);

    let source = SyntheticSource::new(Duration::from_secs(1));
    let backend = Arc::new(SimBackend::from_config(&cfg));

    match supervisor.run(Box::new(source), backend).await {
        Ok(()) => println!("msgvisor stopped cleanly"),
        Err(err) => println!("msgvisor stopped with error: {err}"),
    }
    Ok(())
}
