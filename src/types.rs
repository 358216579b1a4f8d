//! Core types for the vocabulary store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash as StdHash;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of an aggregate stored in a keyed collection.
///
/// Identifiers are assigned by the persist layer from a per-kind counter.
pub trait AggregateId:
    Copy + Eq + Ord + StdHash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AggregateId for $name {
            fn from_raw(raw: u64) -> Self {
                $name(raw)
            }

            fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a word.
    WordId
);
define_id!(
    /// Unique identifier for a category.
    CategoryId
);
define_id!(
    /// Unique identifier for a stored resource (image or audio).
    ResourceId
);

/// Well-known identifier of the settings singleton.
pub const SETTINGS_ID: &str = "settings";

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Content hash for resource blobs (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(arr))
    }

    /// First byte as hex, used to shard blob directories.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[0..1])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The persisted entity types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Word,
    Category,
    Resource,
    Settings,
}

impl AggregateKind {
    /// Tag byte used in the mutation log.
    pub fn tag(self) -> u8 {
        match self {
            AggregateKind::Word => 0,
            AggregateKind::Category => 1,
            AggregateKind::Resource => 2,
            AggregateKind::Settings => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(AggregateKind::Word),
            1 => Some(AggregateKind::Category),
            2 => Some(AggregateKind::Resource),
            3 => Some(AggregateKind::Settings),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Word => "Word",
            AggregateKind::Category => "Category",
            AggregateKind::Resource => "Resource",
            AggregateKind::Settings => "Settings",
        };
        f.write_str(name)
    }
}

/// An entity kept in an identifier-keyed collection.
///
/// `apply` is the single definition of how a partial change lands on an
/// item; the optimistic in-memory update and every persist layer use it.
pub trait Aggregate:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Id: AggregateId;
    /// Caller-supplied fields for a new item (no id, no timestamps).
    type Draft: fmt::Debug + Send + Sync + 'static;
    /// Partial set of changed fields.
    type Changes: Clone + fmt::Debug + Send + Sync + 'static;

    const KIND: AggregateKind;

    fn id(&self) -> Self::Id;

    /// Build the full aggregate once the persist layer has assigned an id.
    fn from_draft(id: Self::Id, draft: Self::Draft, now: Timestamp) -> Self;

    /// Apply a partial change. Unset fields are left untouched.
    fn apply(&mut self, changes: &Self::Changes);

    /// Stamp a modification time.
    fn touch(&mut self, now: Timestamp);
}

/// Deserializes a present field (including `null`) as `Some(..)`, so that
/// `Option<Option<T>>` can tell "absent" from "clear this field".
mod double_option {
    use super::*;

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// --- Words ---

/// Grammatical role of a word, used for colour coding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordType {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Determiner,
    Interjection,
    Question,
    Social,
    Other,
}

impl WordType {
    pub const ALL: [WordType; 12] = [
        WordType::Noun,
        WordType::Verb,
        WordType::Adjective,
        WordType::Adverb,
        WordType::Pronoun,
        WordType::Preposition,
        WordType::Conjunction,
        WordType::Determiner,
        WordType::Interjection,
        WordType::Question,
        WordType::Social,
        WordType::Other,
    ];

    /// Colour from the modified Fitzgerald key.
    pub fn default_color(self) -> &'static str {
        match self {
            WordType::Noun => "#FFB74D",
            WordType::Verb => "#81C784",
            WordType::Adjective => "#64B5F6",
            WordType::Adverb => "#A1887F",
            WordType::Pronoun => "#FFF176",
            WordType::Preposition => "#F48FB1",
            WordType::Conjunction => "#FFFFFF",
            WordType::Determiner => "#B0BEC5",
            WordType::Interjection => "#CE93D8",
            WordType::Question => "#BA68C8",
            WordType::Social => "#F06292",
            WordType::Other => "#E0E0E0",
        }
    }
}

/// A word button on the board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    pub word_type: WordType,
    pub category_id: Option<CategoryId>,
    /// Overrides the word-type colour when set.
    pub color: Option<String>,
    pub image: Option<ResourceId>,
    /// Display position, owned by the board layout.
    pub order: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWord {
    pub text: String,
    pub word_type: WordType,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image: Option<ResourceId>,
    #[serde(default)]
    pub order: u32,
}

impl NewWord {
    pub fn new(text: impl Into<String>, word_type: WordType) -> Self {
        Self {
            text: text.into(),
            word_type,
            category_id: None,
            color: None,
            image: None,
            order: 0,
        }
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Partial update of a word.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WordChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_type: Option<WordType>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<ResourceId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl WordChanges {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn color(color: Option<String>) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }
}

impl Aggregate for Word {
    type Id = WordId;
    type Draft = NewWord;
    type Changes = WordChanges;

    const KIND: AggregateKind = AggregateKind::Word;

    fn id(&self) -> WordId {
        self.id
    }

    fn from_draft(id: WordId, draft: NewWord, now: Timestamp) -> Self {
        Word {
            id,
            text: draft.text,
            word_type: draft.word_type,
            category_id: draft.category_id,
            color: draft.color,
            image: draft.image,
            order: draft.order,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: &WordChanges) {
        if let Some(text) = &changes.text {
            self.text = text.clone();
        }
        if let Some(word_type) = changes.word_type {
            self.word_type = word_type;
        }
        if let Some(category_id) = changes.category_id {
            self.category_id = category_id;
        }
        if let Some(color) = &changes.color {
            self.color = color.clone();
        }
        if let Some(image) = changes.image {
            self.image = image;
        }
        if let Some(order) = changes.order {
            self.order = order;
        }
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

// --- Categories ---

/// A folder of words on the board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<ResourceId>,
    pub order: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<ResourceId>,
    #[serde(default)]
    pub order: u32,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            icon: None,
            order: 0,
        }
    }
}

/// Partial update of a category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<Option<ResourceId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl Aggregate for Category {
    type Id = CategoryId;
    type Draft = NewCategory;
    type Changes = CategoryChanges;

    const KIND: AggregateKind = AggregateKind::Category;

    fn id(&self) -> CategoryId {
        self.id
    }

    fn from_draft(id: CategoryId, draft: NewCategory, now: Timestamp) -> Self {
        Category {
            id,
            name: draft.name,
            color: draft.color,
            icon: draft.icon,
            order: draft.order,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: &CategoryChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(color) = &changes.color {
            self.color = color.clone();
        }
        if let Some(icon) = changes.icon {
            self.icon = icon;
        }
        if let Some(order) = changes.order {
            self.order = order;
        }
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

// --- Resources ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Audio,
}

/// Metadata of a stored image or sound. The bytes live in blob storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    pub content_type: String,
    pub hash: Hash,
    pub size: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for storing a resource.
#[derive(Clone, PartialEq)]
pub struct NewResource {
    pub name: String,
    pub kind: ResourceKind,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl NewResource {
    pub fn image(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Image,
            content_type: content_type.into(),
            data,
        }
    }
}

impl fmt::Debug for NewResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("content_type", &self.content_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Partial update of a resource. Content is immutable; only the name changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Aggregate for Resource {
    type Id = ResourceId;
    type Draft = NewResource;
    type Changes = ResourceChanges;

    const KIND: AggregateKind = AggregateKind::Resource;

    fn id(&self) -> ResourceId {
        self.id
    }

    fn from_draft(id: ResourceId, draft: NewResource, now: Timestamp) -> Self {
        Resource {
            id,
            hash: Hash::from_bytes(&draft.data),
            size: draft.data.len() as u64,
            name: draft.name,
            kind: draft.kind,
            content_type: draft.content_type,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: &ResourceChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

// --- Settings ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Platform voice identifier; `None` uses the system default.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonSize {
    Small,
    Medium,
    Large,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub columns: u16,
    pub rows: u16,
    pub gap: u16,
    pub button_size: ButtonSize,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: 6,
            rows: 4,
            gap: 8,
            button_size: ButtonSize::Medium,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    HighContrast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiPreferences {
    pub theme: Theme,
    pub show_labels: bool,
    pub font_scale: f32,
    /// Speak each word as soon as it is tapped.
    pub speak_on_select: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            show_labels: true,
            font_scale: 1.0,
            speak_on_select: true,
        }
    }
}

/// The settings singleton.
///
/// Exactly one exists per store, under [`SETTINGS_ID`]. It is materialized
/// with defaults on first read and can never be created explicitly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub voice_settings: VoiceSettings,
    pub word_type_colors: BTreeMap<WordType, String>,
    pub grid_layout: GridLayout,
    pub ui_preferences: UiPreferences,
    pub updated_at: Timestamp,
}

impl Settings {
    pub fn id(&self) -> &'static str {
        SETTINGS_ID
    }

    /// Default settings stamped with `now`.
    pub fn defaults(now: Timestamp) -> Self {
        Self {
            voice_settings: VoiceSettings::default(),
            word_type_colors: WordType::ALL
                .iter()
                .map(|t| (*t, t.default_color().to_string()))
                .collect(),
            grid_layout: GridLayout::default(),
            ui_preferences: UiPreferences::default(),
            updated_at: now,
        }
    }

    /// Merge a partial change one level deep: only the named children of
    /// each composite field are replaced.
    pub fn apply(&mut self, changes: &SettingsChanges) {
        if let Some(voice) = &changes.voice_settings {
            voice.apply_to(&mut self.voice_settings);
        }
        if let Some(colors) = &changes.word_type_colors {
            for (word_type, color) in colors {
                self.word_type_colors.insert(*word_type, color.clone());
            }
        }
        if let Some(grid) = &changes.grid_layout {
            grid.apply_to(&mut self.grid_layout);
        }
        if let Some(ui) = &changes.ui_preferences {
            ui.apply_to(&mut self.ui_preferences);
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    /// Effective colour for a word type.
    pub fn color_for(&self, word_type: WordType) -> &str {
        self.word_type_colors
            .get(&word_type)
            .map(String::as_str)
            .unwrap_or_else(|| word_type.default_color())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettingsChanges {
    #[serde(
        default,
        deserialize_with = "double_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub voice: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl VoiceSettingsChanges {
    fn apply_to(&self, voice: &mut VoiceSettings) {
        if let Some(v) = &self.voice {
            voice.voice = v.clone();
        }
        if let Some(rate) = self.rate {
            voice.rate = rate;
        }
        if let Some(pitch) = self.pitch {
            voice.pitch = pitch;
        }
        if let Some(volume) = self.volume {
            voice.volume = volume;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridLayoutChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_size: Option<ButtonSize>,
}

impl GridLayoutChanges {
    fn apply_to(&self, grid: &mut GridLayout) {
        if let Some(columns) = self.columns {
            grid.columns = columns;
        }
        if let Some(rows) = self.rows {
            grid.rows = rows;
        }
        if let Some(gap) = self.gap {
            grid.gap = gap;
        }
        if let Some(button_size) = self.button_size {
            grid.button_size = button_size;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UiPreferencesChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_labels: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak_on_select: Option<bool>,
}

impl UiPreferencesChanges {
    fn apply_to(&self, ui: &mut UiPreferences) {
        if let Some(theme) = self.theme {
            ui.theme = theme;
        }
        if let Some(show_labels) = self.show_labels {
            ui.show_labels = show_labels;
        }
        if let Some(font_scale) = self.font_scale {
            ui.font_scale = font_scale;
        }
        if let Some(speak_on_select) = self.speak_on_select {
            ui.speak_on_select = speak_on_select;
        }
    }
}

/// Partial update of the settings singleton.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettingsChanges>,
    /// Only the listed word types are recoloured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_type_colors: Option<BTreeMap<WordType, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_layout: Option<GridLayoutChanges>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_preferences: Option<UiPreferencesChanges>,
}

impl SettingsChanges {
    pub fn voice(voice: VoiceSettingsChanges) -> Self {
        Self {
            voice_settings: Some(voice),
            ..Default::default()
        }
    }

    pub fn grid(grid: GridLayoutChanges) -> Self {
        Self {
            grid_layout: Some(grid),
            ..Default::default()
        }
    }

    pub fn ui(ui: UiPreferencesChanges) -> Self {
        Self {
            ui_preferences: Some(ui),
            ..Default::default()
        }
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub word_count: u64,
    pub category_count: u64,
    pub resource_count: u64,
    pub blob_count: u64,
    pub log_entries: u64,
    pub log_size_bytes: u64,
    pub blob_size_bytes: u64,
}
