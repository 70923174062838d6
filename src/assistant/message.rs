//! Chat message types and the assistant text side-channels
//!
//! Messages are immutable once created and carry a typed [`MessageBody`]
//! instead of loosely-typed extension fields. Assistant replies may embed a
//! `{COMPONENT_DIAGRAM: {...}}` marker which is parsed and stripped here, at
//! the boundary; a reply that fails to parse degrades to a plain message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::assistant::listing::ListingAnalysis;

/// Marker prefix for the embedded component-diagram protocol.
const DIAGRAM_MARKER: &str = "{COMPONENT_DIAGRAM:";

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The human user
    User,
    /// The assistant
    Ai,
}

impl Sender {
    /// Role string used in persistence rows and completion payloads
    pub fn as_role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_role())
    }
}

/// Typed message payload
///
/// The original notion of optional "extra fields" on a message is modelled
/// as a tagged union validated at the parse boundary. A message is plain
/// text unless a structured payload was successfully parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain conversational text
    #[default]
    Plain,
    /// A parsed vehicle-listing analysis
    ListingAnalysis(ListingAnalysis),
    /// A parsed component diagram extracted from an assistant reply
    ComponentDiagram(ComponentDiagram),
}

/// Component diagram payload embedded in assistant replies
///
/// Parsed from the `{COMPONENT_DIAGRAM: {...}}` text marker. Only
/// `component` is required; everything else defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDiagram {
    /// Name of the component being illustrated
    #[serde(alias = "componentName")]
    pub component: String,

    /// Free-text description of the component
    #[serde(default)]
    pub description: String,

    /// Parts to highlight in the diagram
    #[serde(default, alias = "highlightedParts")]
    pub highlighted_parts: Vec<String>,
}

/// A single chat message
///
/// Owned by the message store for the lifetime of the active session and
/// persisted as a row keyed by `id` once a session exists. Ids are minted
/// client-side so realtime echoes of our own writes can be deduplicated.
///
/// # Examples
///
/// ```
/// use gasket::assistant::{ChatMessage, Sender};
///
/// let msg = ChatMessage::user("My brakes are squealing");
/// assert_eq!(msg.sender, Sender::User);
/// assert!(msg.image.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Client-generated message identifier
    pub id: Uuid,
    /// Message author
    pub sender: Sender,
    /// Display text (markers already stripped for assistant messages)
    pub text: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Optional attached image (part photos)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Url>,
    /// Typed payload parsed at the boundary
    #[serde(default)]
    pub body: MessageBody,
}

impl ChatMessage {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use gasket::assistant::ChatMessage;
    ///
    /// let msg = ChatMessage::user("What does P0300 mean?");
    /// assert_eq!(msg.text, "What does P0300 mean?");
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Creates a new assistant message
    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, text)
    }

    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            image: None,
            body: MessageBody::default(),
        }
    }

    /// Attach an image URL (builder style)
    pub fn with_image(mut self, image: Url) -> Self {
        self.image = Some(image);
        self
    }

    /// Attach a typed payload (builder style)
    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }
}

/// Extract and strip an embedded component-diagram marker from reply text
///
/// Returns the display text and the parsed diagram, if any. When the marker
/// is absent or its JSON payload does not parse, the original text is
/// returned unchanged and the diagram is `None` (the feature degrades to
/// absent, never to an error).
///
/// # Examples
///
/// ```
/// use gasket::assistant::extract_component_diagram;
///
/// let reply = r#"Here is the layout. {COMPONENT_DIAGRAM: {"component": "Alternator"}}"#;
/// let (text, diagram) = extract_component_diagram(reply);
/// assert_eq!(text, "Here is the layout.");
/// assert_eq!(diagram.unwrap().component, "Alternator");
/// ```
pub fn extract_component_diagram(text: &str) -> (String, Option<ComponentDiagram>) {
    let Some(start) = text.find(DIAGRAM_MARKER) else {
        return (text.to_string(), None);
    };

    // The marker opens an outer object; scan for its matching close brace so
    // nested objects in the payload survive.
    let mut depth = 0usize;
    let mut end = None;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = Some(start + offset + ch.len_utf8());
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(end) = end else {
        // Unterminated marker: leave the text alone.
        return (text.to_string(), None);
    };

    let payload = text[start + DIAGRAM_MARKER.len()..end - 1].trim();
    match serde_json::from_str::<ComponentDiagram>(payload) {
        Ok(diagram) if !diagram.component.is_empty() => {
            let cleaned = format!("{}{}", &text[..start], &text[end..])
                .trim()
                .to_string();
            (cleaned, Some(diagram))
        }
        Ok(_) | Err(_) => {
            tracing::debug!("component diagram marker present but payload did not parse");
            (text.to_string(), None)
        }
    }
}

/// Extract markdown-linked video recommendations from reply text
///
/// The assistant endpoint recommends repair videos as plain markdown links;
/// this pulls out `(title, url)` pairs for links pointing at YouTube.
pub fn extract_video_links(text: &str) -> Vec<(String, Url)> {
    let re = regex::Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").expect("static regex");
    re.captures_iter(text)
        .filter_map(|cap| {
            let title = cap[1].to_string();
            let url = Url::parse(&cap[2]).ok()?;
            let host = url.host_str()?;
            if host.ends_with("youtube.com") || host.ends_with("youtu.be") {
                Some((title, url))
            } else {
                None
            }
        })
        .collect()
}
