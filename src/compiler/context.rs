//! The section-splitting traversal.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use super::content::ContentBuffer;
use super::media::{add_variant, clip_window, intern_image, intern_resource, playback};
use super::slide::PageRequest;
use crate::config::Config;
use crate::markup::{Element, MarkupNode};
use crate::meta::{META_TAGS, Meta};
use crate::model::{Chapter, CompilationResult, Fit, FrameRef, Section, SectionKind, TagWarning, Variant};
use crate::registry::VoiceRegistry;
use crate::util::{is_file, normalize_path};

/// Elements that end the section in progress.
pub const SPLIT_TAGS: [&str; 6] = ["voice", "slide", "video", "image", "audio", "mark"];

type Visit<'v> = Pin<Box<dyn Future<Output = ()> + Send + 'v>>;

/// Traversal state of one compile call.
///
/// Children are visited strictly one after another: every split tag reads
/// state written by the tags before it.
pub(super) struct Compiler<'a> {
    meta: &'a Meta,
    registry: &'a dyn VoiceRegistry,
    script_dir: &'a Path,
    keep_frame_default: bool,

    next_id: usize,
    voice: String,
    frame: FrameRef,
    /// Deck that slide changes without `deck` apply to.
    slide_deck: String,
    /// Last page shown per deck.
    pages: BTreeMap<String, u32>,
    content: ContentBuffer,
    endmark_reached: bool,

    result: CompilationResult,
}

impl<'a> Compiler<'a> {
    pub fn new(
        meta: &'a Meta,
        content_root: &Element,
        script_dir: &'a Path,
        config: &'a Config,
        registry: &'a dyn VoiceRegistry,
    ) -> Self {
        let voice = meta
            .settings
            .voice()
            .unwrap_or(&config.default_voice)
            .to_string();
        let keep_frame_default = meta
            .settings
            .bool("defaultKeepFrame")
            .unwrap_or(config.default_keep_frame);
        let fit = meta
            .deck(&meta.active_deck)
            .map(|d| d.fit)
            .unwrap_or_default();

        Self {
            meta,
            registry,
            script_dir,
            keep_frame_default,
            next_id: 1,
            voice,
            frame: FrameRef::Slide {
                deck_id: meta.active_deck.clone(),
                page: 1,
                fit,
            },
            slide_deck: meta.active_deck.clone(),
            pages: BTreeMap::new(),
            content: ContentBuffer::new(content_root),
            endmark_reached: false,
            result: CompilationResult::default(),
        }
    }

    /// Walk the children of the content root.
    pub async fn run(&mut self, content_root: &Element) {
        for child in &content_root.children {
            self.visit(child).await;
        }
    }

    /// Flush trailing content and drop chapters without a section.
    pub fn finish(mut self) -> CompilationResult {
        self.flush();
        debug_assert_eq!(self.content.depth(), 1, "unbalanced content nesting");

        let sections = &self.result.sections;
        self.result.chapters.retain(|chapter| {
            let exists = sections.iter().any(|s| s.id == chapter.section_id);
            if !exists {
                log::debug!(
                    "Dropped chapter \"{}\" as no section follows its mark",
                    chapter.title
                );
            }
            exists
        });
        self.result
    }

    fn visit<'v>(&'v mut self, node: &'v MarkupNode) -> Visit<'v> {
        Box::pin(async move {
            if self.endmark_reached {
                return;
            }
            match node {
                MarkupNode::Text(text) => self.content.push_text(text),
                MarkupNode::Element(el) => self.visit_element(el).await,
            }
        })
    }

    async fn visit_element(&mut self, el: &Element) {
        let name = el.name.as_str();
        if META_TAGS.contains(&name) {
            return;
        }

        if !SPLIT_TAGS.contains(&name) {
            self.content.open_element(el);
            for child in &el.children {
                self.visit(child).await;
            }
            self.content.close_element();
            return;
        }

        self.flush();
        let outer_voice = self.voice.clone();

        match name {
            "video" | "audio" => {
                // Clips end at the tag, whatever it contains
                self.embed_clip(el);
                return;
            }
            "mark" => self.mark(el),
            "voice" => self.voice_scope(el).await,
            "image" => self.image(el),
            "slide" => self.slide(el),
            _ => {}
        }

        if !el.children.is_empty() {
            for child in &el.children {
                self.visit(child).await;
            }
            self.flush();
        }
        self.voice = outer_voice;
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn push_section(&mut self, kind: SectionKind) {
        let section = Section {
            id: self.next_id,
            kind,
        };
        log::debug!(
            "Defined section {} of type {}{}",
            section.id,
            section.type_name(),
            section
                .voice()
                .map(|v| format!(" with voice \"{v}\""))
                .unwrap_or_default()
        );
        self.result.sections.push(section);
        self.next_id += 1;
    }

    /// Emit the collected content as a speech section, if it has any text.
    fn flush(&mut self) {
        if self.endmark_reached || !self.content.has_text() {
            return;
        }
        let content = self.content.render();
        self.push_section(SectionKind::Ssml {
            frame: self.frame.clone(),
            voice: self.voice.clone(),
            content,
        });
        self.content.reset();
    }

    fn warn(&mut self, el: &Element, message: impl Into<String>) {
        self.result
            .warnings
            .push(TagWarning::emit(el.name.as_str(), message));
    }

    /// A `fit` attribute, reporting unknown values.
    fn fit_attr(&mut self, el: &Element) -> Option<Fit> {
        let value = el.attr("fit")?;
        let fit = Fit::parse(value);
        if fit.is_none() {
            self.warn(
                el,
                format!("ignored fit=\"{value}\", expected contain, cover or fill"),
            );
        }
        fit
    }

    // ========================================================================
    // Split tags
    // ========================================================================

    fn mark(&mut self, el: &Element) {
        let Some(name) = el.non_empty_attr("name") else {
            self.warn(el, "ignored a <mark name=\"\"> tag with no defined name");
            return;
        };

        if self.result.marks.contains_key(name) {
            self.warn(
                el,
                format!("ignored <mark name=\"{name}\"> because a mark with the same name already exists"),
            );
            return;
        }

        if self.meta.marks.startmark.as_deref() == Some(name) {
            log::info!("Resetting sections as the start mark <mark name=\"{name}\"> was encountered");
            self.result.sections.clear();
            self.result.chapters.clear();
            self.result.marks.clear();
            self.content.reset();
            self.next_id = 1;
        }

        self.result.marks.insert(name.to_string(), self.next_id);

        if let Some(title) = el.non_empty_attr("chapter") {
            self.result.chapters.push(Chapter {
                title: title.to_string(),
                mark_name: name.to_string(),
                section_id: self.next_id,
            });
        }

        if self.meta.marks.endmark.as_deref() == Some(name) {
            log::info!("End mark <mark name=\"{name}\"> was reached");
            self.endmark_reached = true;
        }
    }

    async fn voice_scope(&mut self, el: &Element) {
        let Some(name) = el.non_empty_attr("name") else {
            self.warn(el, "ignored a <voice name=\"\"> tag with no defined voice name");
            return;
        };

        match self.registry.voice_exists(name).await {
            Ok(true) => self.voice = name.to_string(),
            Ok(false) => self.warn(
                el,
                format!("ignored <voice name=\"{name}\"> because the voice does not exist"),
            ),
            Err(e) => self.warn(
                el,
                format!("ignored <voice name=\"{name}\"> as the voice could not be looked up: {e}"),
            ),
        }
    }

    fn image(&mut self, el: &Element) {
        let Some(src) = el.non_empty_attr("src") else {
            self.warn(el, "ignored an <image src=\"\"> tag with no defined image file");
            return;
        };

        let path = normalize_path(src, self.script_dir);
        if !is_file(&path, None) {
            self.warn(
                el,
                format!("ignored <image src=\"{src}\"> because the file does not exist at \"{}\"", path.display()),
            );
            return;
        }

        let fit = self.fit_attr(el).unwrap_or_default();
        let resource_id = intern_image(&mut self.result.image_resources, path);
        self.frame = FrameRef::Image { resource_id, fit };
    }

    fn slide(&mut self, el: &Element) {
        let deck_id = match el.non_empty_attr("deck") {
            Some(id) if self.meta.deck(id).is_none() => {
                self.warn(
                    el,
                    format!("ignored change to slide deck \"{id}\" as it was not declared inside <lecture>"),
                );
                return;
            }
            Some(id) => id.to_string(),
            None => self.slide_deck.clone(),
        };

        let request = match el.non_empty_attr("page") {
            Some(value) => match PageRequest::parse(value) {
                Some(request) => request,
                None => {
                    self.warn(el, format!("ignored <slide page=\"{value}\"> as the page value is not valid"));
                    return;
                }
            },
            // Switching decks without a page shows that deck's current page
            None if el.non_empty_attr("deck").is_some() => PageRequest::Current,
            None => {
                self.warn(el, "ignored a <slide> tag without a defined page");
                return;
            }
        };

        let Some(deck) = self.meta.deck(&deck_id) else {
            self.warn(el, format!("ignored slide change as deck \"{deck_id}\" was not declared"));
            return;
        };

        let fit = self.fit_attr(el).unwrap_or(deck.fit);
        let current = self.pages.get(&deck_id).copied().unwrap_or(1);
        let page = request.resolve(current, deck.page_count);

        self.pages.insert(deck_id.clone(), page);
        self.slide_deck = deck_id.clone();
        self.frame = FrameRef::Slide { deck_id, page, fit };
    }

    fn embed_clip(&mut self, el: &Element) {
        let Some(src) = el.non_empty_attr("src") else {
            self.warn(el, format!("ignored a <{} src=\"\"> tag with no defined file", el.name));
            return;
        };

        let path = normalize_path(src, self.script_dir);
        if !is_file(&path, None) {
            self.warn(
                el,
                format!("ignored <{} src=\"{src}\"> as the file does not exist at \"{}\"", el.name, path.display()),
            );
            return;
        }

        let (clip_begin, clip_end) = match clip_window(el, &mut self.result.warnings) {
            Ok(window) => window,
            Err(message) => {
                self.warn(el, format!("ignored <{} src=\"{src}\">: {message}", el.name));
                return;
            }
        };

        let is_video = el.name == "video";
        let fit = if is_video {
            Some(self.fit_attr(el).unwrap_or_default())
        } else {
            None
        };
        let playback = playback(el, &mut self.result.warnings);

        let pool = if is_video {
            &mut self.result.video_resources
        } else {
            &mut self.result.audio_resources
        };
        let resource_id = intern_resource(pool, &path);
        let variant_key = add_variant(
            &mut pool[resource_id],
            Variant {
                clip_begin,
                clip_end,
                fit,
            },
        );

        if is_video {
            if self.keep_frame(el) {
                self.frame = FrameRef::Video {
                    resource_id,
                    variant_key: variant_key.clone(),
                };
            }
            self.push_section(SectionKind::Video {
                resource_id,
                variant_key,
                playback,
            });
        } else {
            self.push_section(SectionKind::Audio {
                resource_id,
                variant_key,
                playback,
                frame: self.frame.clone(),
            });
        }
    }

    fn keep_frame(&mut self, el: &Element) -> bool {
        match el.attr("keepFrame") {
            Some("true") => true,
            Some("false") => false,
            None => self.keep_frame_default,
            Some(value) => {
                self.warn(el, format!("ignored keepFrame=\"{value}\", expected true or false"));
                self.keep_frame_default
            }
        }
    }
}
