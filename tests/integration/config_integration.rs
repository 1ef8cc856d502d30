//! Configuration loading feeding the renderer

use std::fs;
use suspense_render::{ConfigError, ConfigLoader, Element, Renderer};
use tempfile::TempDir;

#[tokio::test]
async fn test_file_configuration_drives_render() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("render.toml");
    fs::write(
        &path,
        r#"
[render]
root_attribute = "data-app-root"
chunk_size = 64
"#,
    )
    .unwrap();

    let settings = ConfigLoader::new()
        .with_file(&path)
        .with_env_prefix("MARKUP_IT_FILE")
        .load()
        .unwrap();
    assert_eq!(settings.render.chunk_size, 64);

    let renderer = Renderer::new(settings.render);
    let markup = renderer
        .render_to_string(Element::new("div").child(Element::new("span").child("x")))
        .await
        .unwrap();
    assert_eq!(markup, "<div data-app-root=\"\"><span>x</span></div>");
}

#[tokio::test]
async fn test_static_markup_from_environment() {
    std::env::set_var("MARKUP_IT_ENV_RENDER__STATIC_MARKUP", "true");
    std::env::set_var("MARKUP_IT_ENV_RENDER__ROOT_ATTRIBUTE", "data-root");
    let settings = ConfigLoader::new()
        .with_env_prefix("MARKUP_IT_ENV")
        .load()
        .unwrap();
    std::env::remove_var("MARKUP_IT_ENV_RENDER__STATIC_MARKUP");
    std::env::remove_var("MARKUP_IT_ENV_RENDER__ROOT_ATTRIBUTE");

    assert!(settings.render.static_markup);
    let markup = Renderer::new(settings.render)
        .render_to_string(Element::new("p").child("a").child("b"))
        .await
        .unwrap();
    // Static output carries neither the root attribute nor text separators
    assert_eq!(markup, "<p>ab</p>");
}

#[test]
fn test_invalid_chunk_size_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("render.toml");
    fs::write(&path, "[render]\nchunk_size = 0\n").unwrap();

    let result = ConfigLoader::new()
        .with_file(&path)
        .with_env_prefix("MARKUP_IT_INVALID")
        .load();
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_malformed_file_is_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("render.toml");
    fs::write(&path, "[render\nchunk_size = ").unwrap();

    let result = ConfigLoader::new()
        .with_file(&path)
        .with_env_prefix("MARKUP_IT_MALFORMED")
        .load();
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
