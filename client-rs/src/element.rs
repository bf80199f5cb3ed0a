//! Media element and document seams
//!
//! The manager never touches a DOM directly; it drives anything that can
//! take a list of sources. `InMemoryElement` / `InMemoryDocument` are the
//! headless implementations.

use crate::manager::VideoSource;
use crate::strategy::Preload;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Presentation attributes applied when an element is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub controls: bool,
    pub autoplay: bool,
    pub muted: bool,
    pub loop_playback: bool,
    pub plays_inline: bool,
    pub poster: Option<String>,
    pub preload: Preload,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub class_name: Option<String>,
}

impl Default for ElementAttributes {
    fn default() -> Self {
        Self {
            controls: true,
            autoplay: false,
            muted: true,
            loop_playback: false,
            plays_inline: true,
            poster: None,
            preload: Preload::Metadata,
            width: None,
            height: None,
            class_name: None,
        }
    }
}

/// A media element that can receive `<source>` children
pub trait MediaElement: Send + Sync {
    /// The logical video id this element is tagged with, if any
    fn video_id(&self) -> Option<String>;

    fn set_preload(&self, preload: Preload);

    fn set_poster(&self, poster: &str);

    /// Remove every existing source and append `sources` in order
    fn replace_sources(&self, sources: &[VideoSource]);

    /// Ask the element to re-run source selection
    fn reload(&self);
}

/// Lookup of currently mounted, video-tagged elements
pub trait MediaDocument: Send + Sync {
    fn tagged_videos(&self) -> Vec<Arc<dyn MediaElement>>;
}

#[derive(Debug, Default)]
struct ElementState {
    video_id: Option<String>,
    attributes: ElementAttributes,
    sources: Vec<VideoSource>,
    reload_count: usize,
}

/// Headless media element
#[derive(Debug, Default)]
pub struct InMemoryElement {
    state: Mutex<ElementState>,
}

impl InMemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tagged(video_id: &str) -> Self {
        Self::with_attributes(video_id, ElementAttributes::default())
    }

    pub fn with_attributes(video_id: &str, attributes: ElementAttributes) -> Self {
        Self {
            state: Mutex::new(ElementState {
                video_id: Some(video_id.to_string()),
                attributes,
                ..ElementState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn sources(&self) -> Vec<VideoSource> {
        self.lock().sources.clone()
    }

    pub fn attributes(&self) -> ElementAttributes {
        self.lock().attributes.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.lock().reload_count
    }
}

impl MediaElement for InMemoryElement {
    fn video_id(&self) -> Option<String> {
        self.lock().video_id.clone()
    }

    fn set_preload(&self, preload: Preload) {
        self.lock().attributes.preload = preload;
    }

    fn set_poster(&self, poster: &str) {
        self.lock().attributes.poster = Some(poster.to_string());
    }

    fn replace_sources(&self, sources: &[VideoSource]) {
        self.lock().sources = sources.to_vec();
    }

    fn reload(&self) {
        self.lock().reload_count += 1;
    }
}

/// Headless document holding mounted elements
#[derive(Default)]
pub struct InMemoryDocument {
    elements: Mutex<Vec<Arc<dyn MediaElement>>>,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, element: Arc<dyn MediaElement>) {
        self.elements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(element);
    }

    /// Drop every element tagged with `video_id`
    pub fn unmount(&self, video_id: &str) {
        self.elements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|element| element.video_id().as_deref() != Some(video_id));
    }
}

impl MediaDocument for InMemoryDocument {
    fn tagged_videos(&self) -> Vec<Arc<dyn MediaElement>> {
        self.elements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|element| element.video_id().is_some())
            .cloned()
            .collect()
    }
}
