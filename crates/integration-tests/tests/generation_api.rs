//! Integration tests for the generation endpoints.
//!
//! Providers are in-process stubs; no vendor API is contacted.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tshirt_studio_api::config::ApiConfig;
use tshirt_studio_api::generation::{GeneratorStrategy, ResponseNormalizer};
use tshirt_studio_api::providers::{HttpImageFetcher, ProviderErrorKind};
use tshirt_studio_api::services::UsageMeter;
use tshirt_studio_api::state::AppState;
use tshirt_studio_integration_tests::{
    FailingEditor, MemoryUsageStore, StubDescriber, StubTextToImage, TEN_BYTE_PNG, client,
    json_response, png_data_uri, spawn, spawn_app, stub_strategy,
};

// =============================================================================
// POST /api/generate
// =============================================================================

#[tokio::test]
async fn test_generate_design_returns_provider_url() {
    let designer = StubTextToImage::url("dall-e-3", "https://x/img.png");
    let state = AppState::builder(ApiConfig::default())
        .designer(designer.clone())
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate"))
        .json(&json!({ "prompt": "a smiling sun" }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "success": true,
            "imageUrl": "https://x/img.png",
            "prompt": "a smiling sun",
        })
    );

    let prompts = designer.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("a smiling sun"));
}

#[tokio::test]
async fn test_generate_design_rejects_short_prompt() {
    let designer = StubTextToImage::url("dall-e-3", "https://x/img.png");
    let state = AppState::builder(ApiConfig::default())
        .designer(designer.clone())
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate"))
        .json(&json!({ "prompt": " ab " }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Please provide a detailed prompt");
    assert!(designer.prompts().is_empty(), "provider must not be called");
}

#[tokio::test]
async fn test_generate_design_without_provider_is_config_error() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let resp = client()
        .post(format!("{base}/api/generate"))
        .json(&json!({ "prompt": "a smiling sun" }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], "OpenAI API key not configured");
}

#[tokio::test]
async fn test_generate_design_content_policy_is_bad_request() {
    let designer = StubTextToImage::failing("dall-e-3", ProviderErrorKind::ContentPolicy);
    let state = AppState::builder(ApiConfig::default())
        .designer(designer)
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate"))
        .json(&json!({ "prompt": "something disallowed" }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Invalid prompt. Please try a different description."
    );
}

// =============================================================================
// POST /api/generate-sd
// =============================================================================

#[tokio::test]
async fn test_text_only_generation_embeds_fetched_image() {
    let generator = StubTextToImage::url("stub-sdxl", "https://cdn.test/out.png");
    let state = AppState::builder(ApiConfig::default())
        .generator(stub_strategy().with_text_to_image(generator.clone()))
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({ "prompt": "retro mountain sunset" }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["model"], "stub-sdxl");
    assert_eq!(body["tokensUsed"], 1);

    let image = body["imageUrl"].as_str().expect("imageUrl missing");
    let payload = image
        .strip_prefix("data:image/png;base64,")
        .expect("not a PNG data URI");
    assert_eq!(STANDARD.decode(payload).expect("bad base64"), TEN_BYTE_PNG);

    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_failed_edit_falls_back_to_vision_path() {
    let editor = FailingEditor::new(ProviderErrorKind::Upstream);
    let regenerator = StubTextToImage::url("stub-image", "https://cdn.test/fallback.png");
    let strategy = stub_strategy()
        .with_editor(editor.clone())
        .with_vision_fallback(
            StubDescriber::new("A bold orange tiger head, flat colors", 40),
            regenerator.clone(),
        );
    let state = AppState::builder(ApiConfig::default())
        .generator(strategy)
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({
            "prompt": "make it a tiger",
            "images": [png_data_uri()],
        }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200, "body: {body}");
    assert_eq!(body["model"], "stub-vision+stub-image");
    assert_eq!(body["tokensUsed"], 41);
    assert_eq!(editor.calls(), 1);
    assert_eq!(
        regenerator.prompts(),
        vec!["A bold orange tiger head, flat colors".to_string()]
    );
}

#[tokio::test]
async fn test_edit_failure_without_fallback_is_reported() {
    let editor = FailingEditor::new(ProviderErrorKind::ContentPolicy);
    let state = AppState::builder(ApiConfig::default())
        .generator(stub_strategy().with_editor(editor))
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({
            "prompt": "make it a tiger",
            "image": png_data_uri(),
        }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Content safety filter triggered. Please try a different prompt or image."
    );
}

#[tokio::test]
async fn test_failed_edit_fallback_describes_sprites() {
    let editor = FailingEditor::new(ProviderErrorKind::Upstream);
    let describer = StubDescriber::new("A tiger wearing a red hat", 12);
    let strategy = stub_strategy().with_editor(editor).with_vision_fallback(
        describer.clone(),
        StubTextToImage::url("stub-image", "https://cdn.test/fallback.png"),
    );
    let state = AppState::builder(ApiConfig::default())
        .generator(strategy)
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({
            "prompt": "make it a tiger",
            "images": [png_data_uri()],
            "sprites": [{ "imageData": png_data_uri(), "description": "the red hat" }],
        }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200, "body: {body}");
    assert!(
        body["prompt"]
            .as_str()
            .expect("prompt")
            .ends_with("1) the red hat.")
    );

    let seen = describer.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 2, "references and sprites are both described");
    assert!(seen[0].1.contains("Extract the following elements"));
    assert!(seen[0].1.contains("1) the red hat."));
}

#[tokio::test]
async fn test_remote_sprite_url_is_rejected_without_fetching() {
    let hits = Arc::new(AtomicUsize::new(0));
    let internal = spawn(Router::new().route(
        "/latest/meta-data/iam",
        get({
            let hits = hits.clone();
            move || async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "INTERNAL-CREDENTIALS"
            }
        }),
    ))
    .await;

    let editor = FailingEditor::new(ProviderErrorKind::Upstream);
    let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).expect("fetcher");
    let strategy = GeneratorStrategy::new(ResponseNormalizer::new(Arc::new(fetcher)))
        .with_editor(editor.clone());
    let state = AppState::builder(ApiConfig::default())
        .generator(strategy)
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({
            "prompt": "make it a tiger",
            "images": [png_data_uri()],
            "sprites": [{ "url": format!("{internal}/latest/meta-data/iam") }],
        }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Invalid image format. Please try a different image."
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(editor.calls(), 0);
}

#[tokio::test]
async fn test_short_prompt_with_images_makes_no_provider_call() {
    let editor = FailingEditor::new(ProviderErrorKind::Upstream);
    let describer = StubDescriber::new("unused", 1);
    let regenerator = StubTextToImage::url("stub-image", "https://cdn.test/fallback.png");
    let text_to_image = StubTextToImage::url("stub-sdxl", "https://cdn.test/out.png");
    let strategy = stub_strategy()
        .with_text_to_image(text_to_image.clone())
        .with_editor(editor.clone())
        .with_vision_fallback(describer.clone(), regenerator.clone());
    let state = AppState::builder(ApiConfig::default())
        .generator(strategy)
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({ "prompt": " ab ", "images": [png_data_uri()] }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Please provide a detailed prompt");
    assert_eq!(editor.calls(), 0);
    assert!(describer.seen().is_empty());
    assert!(regenerator.prompts().is_empty());
    assert!(text_to_image.prompts().is_empty());
}

#[tokio::test]
async fn test_too_many_reference_images_rejected() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;
    let images = vec![png_data_uri(); 6];

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({ "prompt": "collage", "images": images }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "A maximum of 5 reference images is supported");
}

// =============================================================================
// Usage metering
// =============================================================================

#[tokio::test]
async fn test_quota_exceeded_blocks_generation() {
    let store = Arc::new(MemoryUsageStore::default());
    store.seed("creator_1", Some(100), 100);
    let generator = StubTextToImage::url("stub-sdxl", "https://cdn.test/out.png");
    let state = AppState::builder(ApiConfig::default())
        .generator(stub_strategy().with_text_to_image(generator.clone()))
        .usage(Some(UsageMeter::new(store)))
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({ "prompt": "retro mountain sunset", "creatorId": "creator_1" }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 429);
    assert_eq!(body["limit"], 100);
    assert_eq!(body["used"], 100);
    assert!(generator.prompts().is_empty(), "provider must not be called");
}

#[tokio::test]
async fn test_successful_generation_records_usage() {
    let store = Arc::new(MemoryUsageStore::default());
    store.seed("creator_2", Some(100), 10);
    let state = AppState::builder(ApiConfig::default())
        .generator(
            stub_strategy()
                .with_text_to_image(StubTextToImage::url("stub-sdxl", "https://cdn.test/o.png")),
        )
        .usage(Some(UsageMeter::new(store.clone())))
        .build();
    let base = spawn_app(state).await;

    let resp = client()
        .post(format!("{base}/api/generate-sd"))
        .json(&json!({ "prompt": "retro mountain sunset", "creatorId": "creator_2" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status().as_u16(), 200);

    let record = store.get("creator_2").expect("record missing");
    assert_eq!(record.monthly_used, 11);
    assert_eq!(record.total_used, 11);
}
