//! Supervises daemon launch sequencing and runtime orchestration.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::info;

use jobrelay_core::{Dispatcher, MessagePublisher, MessageSource};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{IngestHandler, QueueBroker, ResponseForwarder, SocketListener};
use crate::worker::{WorkerContext, WorkerPool};

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S, W> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
    pub(crate) output: W,
}

/// Runs the daemon using the production collaborators.
///
/// Results are written to standard output as JSON lines; logs go to
/// standard error.
///
/// # Errors
///
/// Returns [`LaunchError`] when signal handlers cannot be registered,
/// bootstrap fails, a runtime thread cannot be started, or a runtime thread
/// panics.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::install()?,
        output: io::stdout(),
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S, W>(plan: LaunchPlan<L, S, W>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    W: Write + Send + 'static,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
        output,
    } = plan;

    let daemon = bootstrap_with(&loader, reporter.as_ref())?;
    let config = daemon.config();
    info!(
        target: PROCESS_TARGET,
        pid = std::process::id(),
        "starting daemon runtime"
    );

    let broker = Arc::new(QueueBroker::new());
    let publisher: Arc<dyn MessagePublisher> = Arc::clone(&broker) as Arc<dyn MessagePublisher>;
    let source: Arc<dyn MessageSource> = Arc::clone(&broker) as Arc<dyn MessageSource>;

    let forwarder =
        ResponseForwarder::spawn(Arc::clone(&source), config.response_queue.clone(), output)?;
    let context = WorkerContext {
        pipeline: daemon.pipeline(),
        source,
        dispatcher: Arc::new(Dispatcher::new(
            Arc::clone(&publisher),
            config.response_queue.clone(),
        )),
        request_queue: config.request_queue.clone(),
    };
    let pool = WorkerPool::start(config.consumer_concurrency, &context)?;

    let listener = SocketListener::bind(config.listen_socket())?;
    if let Some(addr) = listener.local_addr() {
        info!(target: PROCESS_TARGET, %addr, "accepting jobs over TCP");
    }
    let ingest = Arc::new(IngestHandler::new(publisher, config.request_queue.clone()));
    let listener_handle = listener.start(ingest)?;
    reporter.runtime_ready(config);

    shutdown.wait()?;
    reporter.shutdown_started();

    listener_handle.shutdown();
    listener_handle.join()?;
    // Late connection threads are refused; queued payloads still run.
    broker.close_queue(&config.request_queue);
    pool.shutdown();
    pool.join()?;
    broker.close();
    forwarder.shutdown();
    forwarder.join()?;

    reporter.shutdown_completed();
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
