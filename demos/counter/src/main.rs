//! Counter demo binary
//!
//! Plays a scripted screen lifecycle against the counter store and prints
//! what the view displays along the way.

use counter::{CounterAction, CounterView, counter_store};
use gemini_core::{InitialActions, LifecycleEvent, ResumePauseStrategy};
use gemini_runtime::LifecycleObserver;
use gemini_runtime::metrics::MetricsExporter;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Let the store and the connection rules catch up
async fn pause_briefly() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter=debug,gemini_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut exporter = MetricsExporter::new();
    if let Err(error) = exporter.install() {
        tracing::warn!(%error, "Metrics disabled");
    }

    println!("=== Counter Demo: Gemini Architecture ===\n");

    // The store loads one increment on its own before any view shows up
    let store = counter_store()
        .bootstrapper(InitialActions(vec![CounterAction::Increment]))
        .build();
    let view = CounterView::new();
    let observer = LifecycleObserver::new(Arc::new(view.connector(&store)), ResumePauseStrategy);

    println!(">>> Screen created and resumed");
    observer
        .observe(
            &view,
            futures::stream::iter([
                LifecycleEvent::Create,
                LifecycleEvent::Start,
                LifecycleEvent::Resume,
            ]),
        )
        .await;
    pause_briefly().await;

    println!("\n>>> Clicking: Increment, Increment, Decrement");
    view.click(CounterAction::Increment);
    view.click(CounterAction::Increment);
    view.click(CounterAction::Decrement);
    pause_briefly().await;

    println!("\n>>> Clicking: IncrementLater(50ms)");
    view.click(CounterAction::IncrementLater {
        delay: Duration::from_millis(50),
    });
    pause_briefly().await;

    println!("\n>>> Screen paused while the increment is pending");
    observer.on_event(&view, LifecycleEvent::Pause);
    view.click(CounterAction::Reset);
    tokio::time::sleep(Duration::from_millis(80)).await;
    println!(
        "  [store] count = {} (the reset click was not delivered)",
        store.state(|s| s.count)
    );

    println!("\n>>> Screen resumed: latest state is replayed");
    observer.on_event(&view, LifecycleEvent::Resume);
    pause_briefly().await;

    println!("\n>>> Clicking: Reset, Decrement");
    view.click(CounterAction::Reset);
    view.click(CounterAction::Decrement);
    pause_briefly().await;

    println!("\n>>> Screen destroyed");
    for event in [
        LifecycleEvent::Pause,
        LifecycleEvent::Stop,
        LifecycleEvent::Destroy,
    ] {
        observer.on_event(&view, event);
    }
    observer.finish();
    println!("  [store] disposed = {}", store.is_disposed());

    if let Some(scrape) = exporter.render() {
        println!("\n=== Metrics ===\n");
        for line in scrape.lines().filter(|line| !line.starts_with('#')) {
            println!("  {line}");
        }
    }

    println!("\n=== Demo Complete ===");
    println!("\nKey concepts demonstrated:");
    println!("  • Middleware: actions become effects, synchronously or later");
    println!("  • Reducer: pure (state, effect) → state");
    println!("  • EventProducer: one-shot view events derived from effects");
    println!("  • Connector: view wired to the store only while resumed");
    println!("  • ErrorHandler: rejected actions are reported, the store keeps running");
}
