//! Consumer-initiated cancellation

use super::support::{read_chunks, Resource};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use suspense_render::{render_to_stream, Element, Node, RenderError, RenderOutcome, UNBOUNDED};

#[tokio::test(start_paused = true)]
async fn test_destroy_fails_pending_read_and_drops_operations() {
    let resource = Resource::new();
    let renders = Arc::new(AtomicUsize::new(0));
    let slow = {
        let resource = resource.clone();
        let renders = Arc::clone(&renders);
        Node::named_component("Slow", move |_| {
            renders.fetch_add(1, Ordering::SeqCst);
            match resource.load("slow", 1_000) {
                None => RenderOutcome::ready("slow"),
                Some(operation) => RenderOutcome::Suspended(operation),
            }
        })
    };
    let tree = Element::new("div").child(Node::boundary("Loading", vec![slow]));

    let mut reader = render_to_stream(tree);
    let first = reader.read_chunk(64).await.unwrap().unwrap();
    assert_eq!(&first[..], b"<div>".as_slice());

    let handle = reader.destroy_handle();
    let destroyer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.destroy(Some(anyhow::anyhow!("client disconnected")));
    });

    let err = reader.read_chunk(64).await.unwrap_err();
    destroyer.await.unwrap();
    assert!(err.is_consumer_abort());
    assert_eq!(
        err.to_string(),
        "Render stream was destroyed: client disconnected"
    );

    // The operation was dropped mid-flight and nothing is ever retried
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(resource.events(), vec!["begin:slow"]);
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert!(matches!(
        reader.read_chunk(UNBOUNDED).await,
        Err(RenderError::Terminated)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_is_idempotent() {
    let resource = Resource::new();
    let mut reader = render_to_stream(Node::boundary("", vec![resource.text("x", 50)]));
    let handle = reader.destroy_handle();

    handle.destroy(Some(anyhow::anyhow!("first")));
    handle.destroy(Some(anyhow::anyhow!("second")));
    handle.close();
    reader.close();
    assert!(handle.is_destroyed());

    match reader.read_chunk(UNBOUNDED).await {
        Err(RenderError::Destroyed(reason)) => assert_eq!(reason.to_string(), "first"),
        other => panic!("expected destroyed error, got {:?}", other),
    }
    assert!(matches!(
        reader.read_chunk(UNBOUNDED).await,
        Err(RenderError::Terminated)
    ));
    assert!(resource.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_closed_stream_reports_error_item() {
    let resource = Resource::new();
    let reader = render_to_stream(Element::new("div").children(vec![
        Node::text("visible"),
        Node::boundary("", vec![resource.text("never", 60_000)]),
    ]));
    let handle = reader.destroy_handle();
    let mut stream = Box::pin(reader.into_stream(1024));

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"<div>visible".as_slice());

    handle.close();
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, RenderError::Destroyed(ref reason) if reason.to_string() == "render stream was closed"));
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_after_end_of_stream() {
    let resource = Resource::new();
    let mut reader = render_to_stream(Node::boundary("", vec![resource.text("done", 5)]));
    let handle = reader.destroy_handle();
    let chunks = read_chunks(&mut reader, UNBOUNDED).await.unwrap();
    assert_eq!(chunks, vec!["<!--$-->done<!--/$-->"]);
    assert!(reader.read_chunk(UNBOUNDED).await.unwrap().is_none());

    handle.destroy(Some(anyhow::anyhow!("late cancel")));
    match reader.read_chunk(UNBOUNDED).await {
        Err(RenderError::Destroyed(reason)) => assert_eq!(reason.to_string(), "late cancel"),
        other => panic!("expected destroyed error, got {:?}", other),
    }
    assert!(matches!(
        reader.read_chunk(UNBOUNDED).await,
        Err(RenderError::Terminated)
    ));
}

#[tokio::test]
async fn test_reader_can_be_driven_from_spawned_task() {
    let mut reader = render_to_stream(Element::new("p").child("moved"));
    let markup = tokio::spawn(async move { reader.read_chunk(UNBOUNDED).await })
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(&markup[..], b"<p>moved</p>".as_slice());
}
