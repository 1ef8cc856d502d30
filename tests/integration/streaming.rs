//! Chunked output through the pull interface

use super::support::{read_chunks, Resource};
use futures::StreamExt;
use suspense_render::{
    render_to_static_stream, render_to_stream, render_to_string, Element, Node, Placeholder,
    RenderConfig, RenderOutcome, Renderer, UNBOUNDED,
};

#[tokio::test(start_paused = true)]
async fn test_boundaries_released_in_declaration_order() {
    let resource = Resource::new();
    let tree = Element::new("div").children(vec![
        Node::boundary("1", vec![resource.text("b1", 20)]),
        Node::boundary("2", vec![resource.text("b2", 5)]),
    ]);

    let mut reader = render_to_stream(tree);
    let chunks = read_chunks(&mut reader, 1024).await.unwrap();
    assert_eq!(
        chunks,
        vec![
            "<div>",
            "<!--$-->b1<!--/$-->",
            "<!--$-->b2<!--/$--></div>",
        ]
    );
    assert!(reader.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_nested_boundary_is_part_of_parent_chunk() {
    let resource = Resource::new();
    let tree = Element::new("article").child(Node::boundary(
        "outer",
        vec![
            resource.text("title", 5),
            Node::boundary("inner", vec![resource.text("body", 15)]),
        ],
    ));

    let mut reader = render_to_stream(tree);
    let chunks = read_chunks(&mut reader, 1024).await.unwrap();
    assert_eq!(
        chunks,
        vec![
            "<article>",
            "<!--$-->title<!--$-->body<!--/$--><!--/$--></article>",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_prefix_is_flushed_before_waiting() {
    let resource = Resource::new();
    let tree = Element::new("body").children(vec![
        Element::new("header").child("Shop").into(),
        Node::boundary("Loading", vec![resource.text("cart", 100)]),
    ]);

    let mut reader = render_to_stream(tree);
    let first = reader.read_chunk(1024).await.unwrap().unwrap();
    assert_eq!(&first[..], b"<body><header>Shop</header>".as_slice());
    assert!(!resource.is_resolved("cart"));

    let rest = reader.read_chunk(1024).await.unwrap().unwrap();
    assert_eq!(&rest[..], b"<!--$-->cart<!--/$--></body>".as_slice());
    assert!(reader.read_chunk(1024).await.unwrap().is_none());
}

#[tokio::test]
async fn test_small_hint_splits_synchronous_output() {
    let tree = Element::new("ol").children(
        (0..4).map(|i| Element::new("li").child(i.to_string()).into()),
    );
    let mut reader = render_to_static_stream(tree);
    let chunks = read_chunks(&mut reader, 8).await.unwrap();
    assert!(chunks.len() > 1);
    assert!(chunks[..chunks.len() - 1].iter().all(|chunk| chunk.len() >= 8));
    assert_eq!(
        chunks.concat(),
        "<ol><li>0</li><li>1</li><li>2</li><li>3</li></ol>"
    );
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_published_on_first_suspension() {
    let resource = Resource::new();
    let fallback = Element::new("span").attr("class", "spinner").child("Loading");
    let tree = Element::new("div").child(Node::boundary(
        fallback,
        vec![resource.text("a", 10), resource.text("b", 10)],
    ));

    let mut reader = render_to_stream(tree);
    let first = reader.read_chunk(1024).await.unwrap().unwrap();
    assert_eq!(&first[..], b"<div>".as_slice());
    assert_eq!(
        reader.take_placeholders(),
        vec![Placeholder {
            boundary: 0,
            markup: "<span class=\"spinner\">Loading</span>".to_string(),
        }]
    );

    let rest = read_chunks(&mut reader, 1024).await.unwrap().concat();
    assert_eq!(rest, "<!--$-->ab<!--/$--></div>");
    assert!(!rest.contains("Loading"));
    assert!(reader.take_placeholders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_suspending_fallback_skips_placeholder() {
    let resource = Resource::new();
    let tree = || Node::boundary(resource.text("spin", 5), vec![resource.text("x", 10)]);

    let mut reader = render_to_stream(tree());
    let chunks = read_chunks(&mut reader, UNBOUNDED).await.unwrap();
    assert_eq!(chunks, vec!["<!--$-->x<!--/$-->"]);
    assert!(reader.take_placeholders().is_empty());
    // The fallback's operation was dropped without being polled
    assert_eq!(resource.events(), vec!["begin:x", "end:x"]);

    assert_eq!(render_to_string(tree()).await.unwrap(), chunks.concat());
}

#[tokio::test(start_paused = true)]
async fn test_failing_fallback_skips_placeholder() {
    let resource = Resource::new();
    let fallback = Node::named_component("BrokenFallback", |_| {
        RenderOutcome::fail(anyhow::anyhow!("fallback exploded"))
    });
    let tree = Element::new("div").children(vec![
        Node::boundary(fallback, vec![resource.text("a", 5)]),
        Node::boundary("Loading", vec![resource.text("b", 5)]),
    ]);

    let mut reader = render_to_stream(tree);
    let first = reader.read_chunk(1024).await.unwrap().unwrap();
    assert_eq!(&first[..], b"<div>".as_slice());
    // Only the healthy fallback is published
    assert_eq!(
        reader.take_placeholders(),
        vec![Placeholder {
            boundary: 1,
            markup: "Loading".to_string(),
        }]
    );

    let rest = read_chunks(&mut reader, 1024).await.unwrap().concat();
    assert_eq!(rest, "<!--$-->a<!--/$--><!--$-->b<!--/$--></div>");
    assert!(reader.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_placeholders_can_be_disabled() {
    let resource = Resource::new();
    let config = RenderConfig {
        placeholders: false,
        ..RenderConfig::default()
    };
    let tree = Node::boundary("Loading", vec![resource.text("x", 1)]);
    let mut reader = Renderer::new(config).stream(tree);
    let chunks = read_chunks(&mut reader, UNBOUNDED).await.unwrap();
    assert_eq!(chunks, vec!["<!--$-->x<!--/$-->"]);
    assert!(reader.take_placeholders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_into_stream_matches_reads() {
    let resource = Resource::new();
    let tree = Element::new("div").children(vec![
        Node::text("head"),
        Node::boundary("", vec![resource.text("late", 5)]),
    ]);

    let chunks: Vec<_> = render_to_stream(tree)
        .into_stream(4096)
        .map(|chunk| String::from_utf8(chunk.unwrap().to_vec()).unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["<div>head", "<!--$-->late<!--/$--></div>"]);
}
