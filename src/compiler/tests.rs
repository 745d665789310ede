use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use proptest::prelude::*;

use super::*;
use crate::markup::parse;
use crate::meta::{Deck, Marks, Settings};
use crate::model::{ClipBound, Fit, FrameRef, Playback, SectionKind};
use crate::registry::{RegistryError, StaticVoiceRegistry, VoiceBackend};

const GOOGLE: &str = "google-en-us-wavenet-a";
const AMAZON: &str = "amazon-en-gb-amy";
const LOCAL: &str = "local-espeak";

// ============================================================================
// Fixtures
// ============================================================================

fn deck(id: &str, page_count: u32, fit: Fit) -> Deck {
    Deck {
        id: id.to_string(),
        source: format!("{id}.pdf"),
        file_path: PathBuf::from(format!("/decks/{id}.pdf")),
        page_count,
        fit,
    }
}

fn meta(pages: u32) -> Meta {
    let mut decks = BTreeMap::new();
    decks.insert("main".to_string(), deck("main", pages, Fit::Contain));
    decks.insert("extra".to_string(), deck("extra", 5, Fit::Cover));
    Meta {
        info: BTreeMap::new(),
        settings: Settings::default(),
        decks,
        active_deck: "main".to_string(),
        lexicons: Vec::new(),
        marks: Marks::default(),
        warnings: Vec::new(),
    }
}

fn config() -> Config {
    Config {
        default_voice: GOOGLE.to_string(),
        ..Config::default()
    }
}

fn registry() -> StaticVoiceRegistry {
    StaticVoiceRegistry::new()
        .with_voice(GOOGLE, VoiceBackend::GoogleCloud)
        .with_voice(AMAZON, VoiceBackend::AmazonPolly)
        .with_voice(LOCAL, VoiceBackend::Other)
}

async fn compile_in(
    meta: &Meta,
    body: &str,
    dir: &Path,
) -> Result<CompilationResult, CompileError> {
    let lecture = parse(&format!("<lecture>{body}</lecture>")).unwrap();
    compile(meta, &speak_root(&lecture), dir, &config(), &registry()).await
}

async fn compile_body(meta: &Meta, body: &str) -> CompilationResult {
    compile_in(meta, body, Path::new("/nowhere")).await.unwrap()
}

fn slide(deck_id: &str, page: u32, fit: Fit) -> FrameRef {
    FrameRef::Slide {
        deck_id: deck_id.to_string(),
        page,
        fit,
    }
}

fn contents(result: &CompilationResult) -> Vec<&str> {
    result.ssml_contents().collect()
}

fn frames(result: &CompilationResult) -> Vec<FrameRef> {
    result.sections.iter().filter_map(|s| s.frame().cloned()).collect()
}

fn media_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["a.mp4", "b.mp4", "talk.mp3", "photo.png"] {
        std::fs::write(dir.path().join(name), b"media").unwrap();
    }
    dir
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_plain_text_is_one_section() {
    let result = compile_body(&meta(3), "Hello world.").await;

    assert_eq!(result.sections.len(), 1);
    let section = &result.sections[0];
    assert_eq!(section.id, 1);
    assert_eq!(section.type_name(), "ssml");
    assert_eq!(section.frame(), Some(&slide("main", 1, Fit::Contain)));
    assert_eq!(section.voice(), Some(GOOGLE));
    assert_eq!(section.content(), Some("<speak>Hello world.</speak>"));
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_slide_next_clamps_to_last_page() {
    let result = compile_body(
        &meta(2),
        r#"<slide page="next"/>Hello<slide page="next"/>World"#,
    )
    .await;

    assert_eq!(contents(&result), vec!["<speak>Hello</speak>", "<speak>World</speak>"]);
    assert_eq!(
        frames(&result),
        vec![slide("main", 2, Fit::Contain), slide("main", 2, Fit::Contain)]
    );
}

#[tokio::test]
async fn test_startmark_discards_preamble() {
    let mut meta = meta(3);
    meta.marks.startmark = Some("start2".to_string());

    let result = compile_body(
        &meta,
        r#"<mark name="start" chapter="Intro"/>Preamble.<mark name="start2"/>Real content."#,
    )
    .await;

    assert_eq!(contents(&result), vec!["<speak>Real content.</speak>"]);
    assert_eq!(result.sections[0].id, 1);
    assert!(result.chapters.is_empty());
    assert_eq!(result.marks.get("start2"), Some(&1));
    assert!(!result.marks.contains_key("start"));
}

#[tokio::test]
async fn test_video_resources_are_interned() {
    let dir = media_dir();
    let result = compile_in(
        &meta(3),
        r#"<video src="a.mp4" clipBegin="2s" clipEnd="4s"/>
           Between.
           <video src="./a.mp4" clipBegin="00:00:02" clipEnd="4000ms"/>"#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.video_resources.len(), 1);
    let resource = &result.video_resources[0];
    assert_eq!(resource.id, 0);
    assert_eq!(resource.path, dir.path().join("a.mp4"));
    assert_eq!(resource.variants.len(), 1);

    let key = "00:00:02.000-00:00:04.000-contain";
    let variant = &resource.variants[key];
    assert_eq!(variant.clip_begin.to_string(), "00:00:02.000");
    assert_eq!(variant.fit, Some(Fit::Contain));

    let video_keys: Vec<_> = result
        .sections
        .iter()
        .filter_map(|s| match &s.kind {
            SectionKind::Video {
                resource_id,
                variant_key,
                ..
            } => Some((*resource_id, variant_key.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(video_keys, vec![(0, key), (0, key)]);
    assert_eq!(result.sections.len(), 3);
}

#[tokio::test]
async fn test_single_budget_overage_fails() {
    let body = "a".repeat(5000);
    let err = compile_in(&meta(3), &body, Path::new("/nowhere"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CompileError::BudgetExceeded(vec![BudgetViolation {
            section_id: 1,
            kind: OverageKind::Combined,
            length: 5015,
            limit: 5000,
            amount: 15,
        }])
    );
}

// ============================================================================
// Split tags
// ============================================================================

#[tokio::test]
async fn test_voice_is_scoped_to_its_subtree() {
    let result = compile_body(
        &meta(3),
        &format!(r#"First.<voice name="{AMAZON}">Second.</voice>Third."#),
    )
    .await;

    let voices: Vec<_> = result.sections.iter().filter_map(|s| s.voice()).collect();
    assert_eq!(voices, vec![GOOGLE, AMAZON, GOOGLE]);
    assert_eq!(
        contents(&result),
        vec!["<speak>First.</speak>", "<speak>Second.</speak>", "<speak>Third.</speak>"]
    );
}

#[tokio::test]
async fn test_unknown_voice_keeps_outer_voice() {
    let result = compile_body(
        &meta(3),
        r#"<voice name="nobody">Hi.</voice><voice>Ho.</voice>"#,
    )
    .await;

    assert!(result.sections.iter().all(|s| s.voice() == Some(GOOGLE)));
    assert_eq!(result.sections.len(), 2);
    assert_eq!(result.warnings.len(), 2);
    assert!(result.warnings.iter().all(|w| w.tag == "voice"));
}

#[tokio::test]
async fn test_empty_voice_tag_changes_nothing() {
    let result = compile_body(
        &meta(3),
        &format!(r#"Before.<voice name="{AMAZON}"/>After."#),
    )
    .await;

    let voices: Vec<_> = result.sections.iter().filter_map(|s| s.voice()).collect();
    assert_eq!(voices, vec![GOOGLE, GOOGLE]);
}

#[tokio::test]
async fn test_voice_from_settings() {
    let mut meta = meta(3);
    meta.settings.insert("voice", AMAZON);
    let result = compile_body(&meta, "Hi.").await;
    assert_eq!(result.sections[0].voice(), Some(AMAZON));
}

#[tokio::test]
async fn test_split_inside_element_keeps_nesting() {
    let result = compile_body(
        &meta(3),
        r#"<p>One <mark name="m"/>Two</p><prosody rate="slow">Three</prosody>"#,
    )
    .await;

    assert_eq!(
        contents(&result),
        vec![
            "<speak><p>One </p></speak>",
            r#"<speak><p>Two</p><prosody rate="slow">Three</prosody></speak>"#,
        ]
    );
    assert_eq!(result.marks.get("m"), Some(&2));
}

#[tokio::test]
async fn test_split_tag_children_join_the_enclosing_element() {
    let result = compile_body(
        &meta(3),
        &format!(r#"<p>X<voice name="{AMAZON}">Y</voice>Z</p>"#),
    )
    .await;

    assert_eq!(
        contents(&result),
        vec![
            "<speak><p>X</p></speak>",
            "<speak><p>Y</p></speak>",
            "<speak><p>Z</p></speak>",
        ]
    );
}

#[tokio::test]
async fn test_content_without_text_does_not_form_a_section() {
    let result = compile_body(
        &meta(3),
        r#"<break time="1s"/><slide page="2"/>Now.<slide page="3"/><break time="2s"/>"#,
    )
    .await;

    // the first break carries over into the next section
    assert_eq!(
        contents(&result),
        vec![r#"<speak><break time="1s"/>Now.</speak>"#]
    );
    assert_eq!(frames(&result), vec![slide("main", 2, Fit::Contain)]);
}

#[tokio::test]
async fn test_meta_tags_are_skipped() {
    let result = compile_body(
        &meta(3),
        r#"<info title="x"/><settings fps="30"/>Hi.<lexicon xml:id="l"/>"#,
    )
    .await;
    assert_eq!(contents(&result), vec!["<speak>Hi.</speak>"]);
}

#[tokio::test]
async fn test_inline_whitespace_is_tidied() {
    let result = compile_body(
        &meta(3),
        "<p>\n    Hello\n    <break time=\"1s\"/>\n    world\n</p>",
    )
    .await;
    assert_eq!(
        contents(&result),
        vec!["<speak><p>\nHello <break time=\"1s\"/>\nworld\n</p></speak>"]
    );
}

// ============================================================================
// Marks and chapters
// ============================================================================

#[tokio::test]
async fn test_duplicate_mark_keeps_first() {
    let result = compile_body(
        &meta(3),
        r#"A<mark name="x"/>B<mark name="x" chapter="Again"/>C"#,
    )
    .await;

    assert_eq!(result.sections.len(), 3);
    assert_eq!(result.marks.get("x"), Some(&2));
    assert!(result.chapters.is_empty());
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_chapters() {
    let result = compile_body(
        &meta(3),
        r#"<mark name="intro" chapter="Introduction"/>Hello.
           <mark name="main" chapter="Main part"/>Body.
           <mark name="outro" chapter="Nothing follows"/>"#,
    )
    .await;

    let chapters: Vec<_> = result
        .chapters
        .iter()
        .map(|c| (c.title.as_str(), c.mark_name.as_str(), c.section_id))
        .collect();
    assert_eq!(
        chapters,
        vec![("Introduction", "intro", 1), ("Main part", "main", 2)]
    );
    assert_eq!(result.marks.get("outro"), Some(&3));
}

#[tokio::test]
async fn test_endmark_stops_sections() {
    let mut meta = meta(3);
    meta.marks.endmark = Some("end".to_string());

    let result = compile_body(
        &meta,
        r#"<p>Kept <mark name="end"/>dropped</p><mark name="after"/>Also dropped."#,
    )
    .await;

    assert_eq!(contents(&result), vec!["<speak><p>Kept </p></speak>"]);
    assert!(result.marks.contains_key("end"));
    assert!(!result.marks.contains_key("after"));
}

#[tokio::test]
async fn test_empty_mark_name_is_ignored() {
    let result = compile_body(&meta(3), r#"A<mark name=""/>B"#).await;
    assert!(result.marks.is_empty());
    assert_eq!(result.sections.len(), 2);
    assert_eq!(result.warnings.len(), 1);
}

// ============================================================================
// Frames
// ============================================================================

#[tokio::test]
async fn test_each_deck_remembers_its_page() {
    let result = compile_body(
        &meta(3),
        r#"<slide page="3"/>A
           <slide deck="extra"/>B
           <slide deck="extra" page="next"/>C
           <slide deck="main"/>D
           <slide page="-1" fit="fill"/>E"#,
    )
    .await;

    assert_eq!(
        frames(&result),
        vec![
            slide("main", 3, Fit::Contain),
            slide("extra", 1, Fit::Cover),
            slide("extra", 2, Fit::Cover),
            slide("main", 3, Fit::Contain),
            slide("main", 2, Fit::Fill),
        ]
    );
}

#[tokio::test]
async fn test_invalid_slide_changes_are_dropped() {
    let result = compile_body(
        &meta(3),
        r#"<slide page="2"/>A<slide page="soon"/>B<slide deck="ghost" page="1"/>C<slide/>D"#,
    )
    .await;

    assert_eq!(
        frames(&result),
        vec![slide("main", 2, Fit::Contain); 4]
    );
    assert_eq!(result.warnings.len(), 3);
}

#[tokio::test]
async fn test_image_frame() {
    let dir = media_dir();
    let result = compile_in(
        &meta(3),
        r#"<image src="photo.png" fit="cover"/>Look.<image src="missing.png"/>Still.<image src="photo.png"/>Again."#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.image_resources.len(), 1);
    assert_eq!(result.image_resources[0].path, dir.path().join("photo.png"));
    assert_eq!(
        frames(&result),
        vec![
            FrameRef::Image { resource_id: 0, fit: Fit::Cover },
            FrameRef::Image { resource_id: 0, fit: Fit::Cover },
            FrameRef::Image { resource_id: 0, fit: Fit::Contain },
        ]
    );
    assert_eq!(result.warnings.len(), 1);
}

// ============================================================================
// Media
// ============================================================================

#[tokio::test]
async fn test_video_keep_frame() {
    let dir = media_dir();
    let result = compile_in(
        &meta(3),
        r#"<video src="a.mp4" keepFrame="true" fit="fill" speed="120%"/>After.
           <video src="b.mp4"/>Later."#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.sections.len(), 4);
    match &result.sections[0].kind {
        SectionKind::Video { resource_id, variant_key, playback } => {
            assert_eq!(*resource_id, 0);
            assert_eq!(variant_key, "START-END-fill");
            assert_eq!(playback.speed, Some(120));
        }
        other => panic!("expected a video section, got {other:?}"),
    }
    let held = FrameRef::Video {
        resource_id: 0,
        variant_key: "START-END-fill".to_string(),
    };
    // b.mp4 does not keep its frame
    assert_eq!(frames(&result), vec![held.clone(), held]);
    assert_eq!(result.video_resources.len(), 2);
}

#[tokio::test]
async fn test_keep_frame_default_from_settings() {
    let dir = media_dir();
    let mut meta = meta(3);
    meta.settings.insert("defaultKeepFrame", "true");

    let result = compile_in(&meta, r#"<video src="a.mp4"/>After."#, dir.path())
        .await
        .unwrap();
    assert_eq!(
        result.sections[1].frame(),
        Some(&FrameRef::Video {
            resource_id: 0,
            variant_key: "START-END-contain".to_string()
        })
    );

    let result = compile_in(
        &meta,
        r#"<video src="a.mp4" keepFrame="false"/>After."#,
        dir.path(),
    )
    .await
    .unwrap();
    assert_eq!(result.sections[1].frame(), Some(&slide("main", 1, Fit::Contain)));
}

#[tokio::test]
async fn test_audio_plays_over_current_frame() {
    let dir = media_dir();
    let result = compile_in(
        &meta(3),
        r#"<slide page="2"/><audio src="talk.mp3" clipEnd="3s" soundLevel="+3dB" repeatCount="2"><p>ignored</p></audio>"#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.sections.len(), 1);
    assert_eq!(
        result.sections[0].kind,
        SectionKind::Audio {
            resource_id: 0,
            variant_key: "START-00:00:03.000".to_string(),
            playback: Playback {
                speed: None,
                sound_level: Some(3),
                repeat_count: Some(2),
            },
            frame: slide("main", 2, Fit::Contain),
        }
    );
    let variant = &result.audio_resources[0].variants["START-00:00:03.000"];
    assert_eq!(variant.clip_begin, ClipBound::Start);
    assert_eq!(variant.fit, None);
}

#[tokio::test]
async fn test_invalid_clips_are_dropped() {
    let dir = media_dir();
    let result = compile_in(
        &meta(3),
        r#"<video src="missing.mp4"/><video/><video src="a.mp4" clipBegin="4s" clipEnd="2s"/>Text."#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.sections.len(), 1);
    assert!(result.video_resources.is_empty());
    assert_eq!(result.warnings.len(), 3);
}

#[tokio::test]
async fn test_startmark_keeps_resource_pools() {
    let dir = media_dir();
    let mut meta = meta(3);
    meta.marks.startmark = Some("go".to_string());

    let result = compile_in(
        &meta,
        r#"<image src="photo.png"/>Preamble.<mark name="go"/>Talk."#,
        dir.path(),
    )
    .await
    .unwrap();

    assert_eq!(result.sections.len(), 1);
    assert_eq!(result.image_resources.len(), 1);
    assert_eq!(
        result.sections[0].frame(),
        Some(&FrameRef::Image { resource_id: 0, fit: Fit::Contain })
    );
}

#[tokio::test]
async fn test_startmark_discards_content_without_text() {
    let mut meta = meta(3);
    meta.marks.startmark = Some("go".to_string());

    let result = compile_body(&meta, r#"<break time="1s"/><mark name="go"/>Talk."#).await;
    assert_eq!(contents(&result), vec!["<speak>Talk.</speak>"]);

    let result = compile_body(
        &meta,
        r#"<p><break time="1s"/><mark name="go"/>Talk.</p>"#,
    )
    .await;
    assert_eq!(contents(&result), vec!["<speak><p>Talk.</p></speak>"]);
    assert_eq!(result.sections[0].id, 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_no_sections() {
    let err = compile_in(&meta(3), r#"<info title="Empty"/>"#, Path::new("/nowhere"))
        .await
        .unwrap_err();
    assert_eq!(err, CompileError::NoSections);

    let mut meta = meta(3);
    meta.marks.endmark = Some("stop".to_string());
    let err = compile_in(&meta, r#"<mark name="stop"/>Never spoken."#, Path::new("/nowhere"))
        .await
        .unwrap_err();
    assert_eq!(err, CompileError::NoSections);
}

#[tokio::test]
async fn test_split_budget_reports_all_sections() {
    let text = "b".repeat(3001);
    let body = format!(
        r#"<voice name="{AMAZON}">{text}<mark name="m"/>short<mark name="n"/>{text}</voice><voice name="{LOCAL}">{text}{text}</voice>"#
    );
    let err = compile_in(&meta(3), &body, Path::new("/nowhere"))
        .await
        .unwrap_err();

    let CompileError::BudgetExceeded(violations) = err else {
        panic!("expected a budget failure");
    };
    let found: Vec<_> = violations
        .iter()
        .map(|v| (v.section_id, v.kind, v.amount))
        .collect();
    assert_eq!(
        found,
        vec![(1, OverageKind::Text, 1), (3, OverageKind::Text, 1)]
    );
}

struct OfflineRegistry;

#[async_trait]
impl VoiceRegistry for OfflineRegistry {
    async fn voice_backend(&self, _name: &str) -> Result<Option<VoiceBackend>, RegistryError> {
        Err(RegistryError::Unavailable("offline".into()))
    }
}

#[tokio::test]
async fn test_registry_failures_degrade_to_warnings() {
    let lecture = parse(r#"<lecture>A<voice name="x">B</voice></lecture>"#).unwrap();
    let result = compile(
        &meta(3),
        &speak_root(&lecture),
        Path::new("/nowhere"),
        &config(),
        &OfflineRegistry,
    )
    .await
    .unwrap();

    assert_eq!(result.sections.len(), 2);
    // one for the voice tag, one per unchecked section
    assert_eq!(result.warnings.len(), 3);
}

// ============================================================================
// Properties
// ============================================================================

const START: &str = r#"<mark name="start" chapter="Start"/>"#;
const END: &str = r#"<mark name="end"/>"#;

fn token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}\\.".prop_map(|w| format!("{w} ")),
        Just(r#"<slide page="next"/>"#.to_string()),
        Just(r#"<slide page="previous"/>"#.to_string()),
        (0u32..12).prop_map(|n| format!(r#"<slide page="{n}"/>"#)),
        (-6i32..6).prop_map(|n| format!(r#"<slide page="{n:+}"/>"#)),
        Just(r#"<slide deck="extra"/>"#.to_string()),
        Just(r#"<slide deck="main" page="last"/>"#.to_string()),
        (0u32..4).prop_map(|n| format!(r#"<mark name="m{n}" chapter="C{n}"/>"#)),
        Just(START.to_string()),
        Just(END.to_string()),
        "[a-z]{1,5}".prop_map(|w| format!("<p>{w}</p>")),
        "[a-z]{1,5}".prop_map(|w| format!(r#"<voice name="{AMAZON}">{w}</voice>"#)),
    ]
}

fn compile_blocking(meta: &Meta, body: &str) -> Result<CompilationResult, CompileError> {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(compile_in(meta, body, Path::new("/nowhere")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_plan_invariants(tokens in prop::collection::vec(token(), 0..24), pages in 1u32..6) {
        let mut meta = meta(pages);
        meta.marks.startmark = Some("start".to_string());
        meta.marks.endmark = Some("end".to_string());
        let body = tokens.concat();
        let compiled = compile_blocking(&meta, &body);

        // everything after the end mark is ignored
        if let Some(end) = tokens.iter().position(|t| t == END) {
            let head = tokens[..end].concat();
            prop_assert_eq!(
                compile_blocking(&meta, &head).map(|r| r.sections),
                compiled.clone().map(|r| r.sections)
            );
        }

        let Ok(result) = compiled else {
            return Ok(());
        };

        // ids are 1..=N, also after a start mark reset
        let ids: Vec<_> = result.sections.iter().map(|s| s.id).collect();
        prop_assert_eq!(ids, (1..=result.sections.len()).collect::<Vec<_>>());
        if let Some(&start) = result.marks.get("start") {
            prop_assert_eq!(start, 1);
        }

        // no section or mark follows the end mark
        if let Some(&end) = result.marks.get("end") {
            prop_assert!(result.sections.iter().all(|s| s.id < end));
            prop_assert!(result.marks.values().all(|&id| id <= end));
        }

        // every slide frame is inside its deck
        for frame in frames(&result) {
            if let FrameRef::Slide { deck_id, page, .. } = frame {
                let count = meta.decks[&deck_id].page_count;
                prop_assert!((1..=count).contains(&page));
            }
        }

        // chapters point at existing sections and surviving marks
        for chapter in &result.chapters {
            prop_assert!(result.section(chapter.section_id).is_some());
            prop_assert_eq!(result.marks.get(&chapter.mark_name), Some(&chapter.section_id));
        }

        // compiling again gives the same plan
        prop_assert_eq!(compile_blocking(&meta, &body), Ok(result));
    }
}
