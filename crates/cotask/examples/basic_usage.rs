//! Basic usage example for the cotask engine
//!
//! Builds a "save document" chain out of a sequence of steps, a rescue for a
//! flaky upload, and a cancellation override, then runs it through an engine
//! with a console reporter.

use std::time::Duration;

use cotask::{
    as_task, from_future, sequence, BoxError, DelegateTask, Engine, EngineConfig, ExecutionContext,
    ImmediateTask, SimpleConsoleReporter, TaskExt,
};

#[derive(Debug, thiserror::Error)]
#[error("upload to {0} timed out")]
struct UploadTimeout(String);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Basic cotask usage ===\n");

    let config = EngineConfig::new().with_execution_timeout(Duration::from_secs(5))?;
    let engine = Engine::with_config(config)?
        .with_reporter(SimpleConsoleReporter::new())
        .with_hook(|task_name: &str, _: &ExecutionContext| -> Result<(), BoxError> {
            tracing::debug!(task = task_name, "about to start");
            Ok(())
        });
    engine.set_reporter_context("demo");

    // A sequence whose steps talk to each other through the context
    let validate = DelegateTask::with_context(|context: &ExecutionContext| {
        let document = context.source::<String>().ok_or("no document selected")?;
        context.set_target(format!("{}.bak", document));
        Ok::<_, BoxError>(())
    })
    .named("validate");

    let upload = from_future(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err::<(), _>(UploadTimeout("backup-server".to_string()))
    })
    .named("upload")
    .rescue(
        |error: Box<UploadTimeout>| {
            println!("  rescuing: {}", error);
            Ok(as_task(|| {
                println!("  writing a local copy instead");
                Ok::<_, BoxError>(())
            })
            .named("local-copy")
            .boxed())
        },
        false,
    );

    let save = sequence(vec![validate.boxed(), upload.boxed()]);
    let context = ExecutionContext::new().with_source("report.txt".to_string());
    engine.execute_async(save, context.clone()).await?;
    println!("Backup written to {}", context.target::<String>().unwrap_or_default());

    // A user dismissing a dialog cancels; the chain turns that into a default answer
    let answer = engine
        .execute(ImmediateTask::<u32>::cancelled().override_cancel_with(42))
        .await?;
    println!("Dialog answer: {}", answer);

    // Cancellation still surfaces as an error when nothing overrides it
    let cancelled = engine
        .execute(ImmediateTask::<()>::cancelled().when_cancelled(|| {
            Ok(as_task(|| {
                println!("  cleaning up after cancellation");
                Ok::<_, BoxError>(())
            })
            .boxed())
        }))
        .await;
    println!("Cancelled chain reported: {:?}", cancelled.err());

    let stats = engine.stats();
    println!(
        "\n{} executions: {} succeeded, {} cancelled, {} failed",
        stats.total_executions, stats.succeeded, stats.cancelled, stats.failed
    );
    engine.finish_reporting();

    Ok(())
}

