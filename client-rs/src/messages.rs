//! Message types for the live feed protocol
//!
//! Every inbound frame is an envelope `{"type": ..., "payload": ...}`. The
//! `type` names one [`EventType`] and the payload shape is fixed by that
//! type. [`Event`] is the decoded form: one variant per event type carrying
//! its payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Result;

/// A payload type that belongs to exactly one [`EventType`]
pub trait Payload: fmt::Debug + Send + Sync + 'static {
    /// The event type carrying this payload
    const EVENT_TYPE: EventType;

    /// Borrow the payload out of an event of the matching type
    fn from_event(event: &Event) -> Option<&Self>;
}

/// An event type name that is not part of the protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown event type: {0}")]
pub struct UnknownEventType(pub String);

macro_rules! event_types {
    ($( $(#[$doc:meta])* $variant:ident => $wire:literal : $payload:ty, )+) => {
        /// Kinds of live-show data the feed can carry
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum EventType {
            $( $(#[$doc])* #[serde(rename = $wire)] $variant, )+
        }

        impl EventType {
            /// Every event type, in declaration order
            pub const ALL: &'static [EventType] = &[ $( EventType::$variant, )+ ];

            /// The identifier used on the wire
            pub fn as_str(self) -> &'static str {
                match self {
                    $( EventType::$variant => $wire, )+
                }
            }
        }

        impl FromStr for EventType {
            type Err = UnknownEventType;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(EventType::$variant), )+
                    other => Err(UnknownEventType(other.to_string())),
                }
            }
        }

        /// A decoded event: the event type together with its payload
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type", content = "payload")]
        pub enum Event {
            $( $(#[$doc])* #[serde(rename = $wire)] $variant($payload), )+
        }

        impl Event {
            /// The type tag of this event
            pub fn event_type(&self) -> EventType {
                match self {
                    $( Event::$variant(_) => EventType::$variant, )+
                }
            }

            fn from_parts(event_type: EventType, payload: serde_json::Value) -> Result<Self> {
                Ok(match event_type {
                    $( EventType::$variant => Event::$variant(serde_json::from_value(payload)?), )+
                })
            }
        }

        $(
            impl Payload for $payload {
                const EVENT_TYPE: EventType = EventType::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$payload> for Event {
                fn from(payload: $payload) -> Self {
                    Event::$variant(payload)
                }
            }
        )+
    };
}

event_types! {
    /// An audience member entered the room
    Enter => "enter": EnterPayload,
    /// An audience member followed the channel
    Follow => "follow": FollowPayload,
    /// Profile details of an audience member changed
    AudienceUpdate => "audienceUpdate": Audience,
    /// Chat message
    Message => "message": MessagePayload,
    /// Paid, pinned chat message
    SuperChat => "superChat": SuperChatPayload,
    Gift => "gift": GiftPayload,
    Membership => "membership": MembershipPayload,
    ViewersCount => "viewersCount": ViewersCountPayload,
    /// Live caption of the streamer's speech
    Caption => "caption": CaptionPayload,
    HeartRate => "heartRate": HeartRatePayload,
    /// Now-playing media and its playback state
    MediaInfo => "mediaInfo": MediaInfoPayload,
    InputAudioSpectrum => "inputAudioSpectrum": InputAudioSpectrumPayload,
    OutputAudioSpectrum => "outputAudioSpectrum": OutputAudioSpectrumPayload,
    /// Song request queue
    KaraokeStation => "karaokeStation": KaraokeStationPayload,
    MousePosition => "mousePosition": MousePositionPayload,
    MouseButton => "mouseButton": MouseButtonPayload,
    KeyboardButton => "keyboardButton": KeyboardButtonPayload,
    Gamepad => "gamepad": GamepadPayload,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The wire unit: one envelope per inbound frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type identifier, possibly one this client does not know
    #[serde(rename = "type")]
    pub event_type: String,

    /// Payload, not yet checked against the declared type
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Parse the envelope structure of a text frame
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a text frame into a typed event
    ///
    /// Returns `Ok(None)` for event types outside the protocol. A payload that
    /// does not match its declared type is an error.
    pub fn decode(text: &str) -> Result<Option<Event>> {
        Self::parse(text)?.into_event()
    }

    /// Check the payload against the declared type
    pub fn into_event(self) -> Result<Option<Event>> {
        match self.event_type.parse::<EventType>() {
            Ok(event_type) => Event::from_parts(event_type, self.payload).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Encode an event as a text frame
    pub fn encode(event: &Event) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }
}

// ---------------------------------------------------------------------------
// Shared records
// ---------------------------------------------------------------------------

/// Localizable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringContent {
    pub string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_language: Option<String>,
}

impl StringContent {
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            language: None,
            pronunciation: None,
            translation: None,
            translation_language: None,
        }
    }
}

/// Image reference, optionally inlined as a data URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<StringContent>,
    pub level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A viewer of the live show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<StringContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<ImageContent>,
    pub level: f64,
    pub badges: Vec<Badge>,
    pub is_moderator: bool,
    pub is_member: bool,
}

/// A purchasable item (gift, membership tier, super chat tier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub id: String,
    pub display_name: StringContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    pub amount: f64,
    pub currency: String,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emote {
    pub id: String,
    pub keyword: String,
    pub image: ImageContent,
}

// ---------------------------------------------------------------------------
// Audience interactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterPayload {
    pub timestamp: f64,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowPayload {
    pub timestamp: f64,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Audience>,
    pub content: StringContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub emotes: Vec<Emote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatPayload {
    pub id: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Audience>,
    pub sku: Sku,
    pub content: StringContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub emotes: Vec<Emote>,
    /// Pinned from
    pub start: f64,
    /// Pinned until
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPayload {
    pub id: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Audience>,
    pub sku: Sku,
    pub count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<StringContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPayload {
    pub id: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Audience>,
    pub sku: Sku,
    pub count: f64,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewersCountPayload {
    pub timestamp: f64,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionPayload {
    pub start: f64,
    pub end: f64,
    pub content: StringContent,
}

/// Streamer heart rate in beats per minute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRatePayload {
    pub timestamp: f64,
    pub count: f64,
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Music,
    Unknown,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaPlaybackStatus {
    Changing,
    Closed,
    Opened,
    Paused,
    Playing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaPlaybackRepeatMode {
    List,
    None,
    Track,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfoPayload {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<ImageContent>,
    pub track_count: f64,
    pub track_number: f64,
    pub artist: String,
    pub genres: Vec<String>,
    pub status: MediaPlaybackStatus,
    pub repeat_mode: MediaPlaybackRepeatMode,
    pub shuffle: bool,
    pub rate: f64,
    pub duration: f64,
    pub position: f64,
}

/// Microphone spectrum, one normalized magnitude per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputAudioSpectrumPayload(pub Vec<f64>);

/// System output spectrum, one normalized magnitude per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputAudioSpectrumPayload(pub Vec<f64>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeStationItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KaraokeStationPayload {
    pub trigger_keyword: String,
    pub minimum_interval: f64,
    pub minimum_audience_level: f64,
    pub requires_wearing_badge: bool,
    pub list: Vec<KaraokeStationItem>,
}

// ---------------------------------------------------------------------------
// Peripheral input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MousePositionPayload {
    pub x: f64,
    pub y: f64,
}

/// Button state changes; buttons that did not change are absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseButtonPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub four: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub five: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardButtonPayload {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_down: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamepadPayload {
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    pub left_trigger: f64,
    pub right_trigger: f64,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub left_thumbstick: bool,
    pub right_thumbstick: bool,
    pub left_shoulder: bool,
    pub right_shoulder: bool,
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
    pub home: bool,
    pub util_left: bool,
    pub util_right: bool,
}
