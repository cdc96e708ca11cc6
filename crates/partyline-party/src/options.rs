//! Where a party session connects, and with which options.

use serde_json::Value;

/// Query key the bearer token is sent under.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

// ---------------------------------------------------------------------------
// SessionPath
// ---------------------------------------------------------------------------

/// Which party endpoint to open a session on.
///
/// Each variant maps to a path suffix appended to the service location:
///
/// ```text
/// Create      → party/create/<game>/<version>/<server>
/// QuickMatch  → parties/<game>/<version>/<server>/session
/// Connect     → party/<party_id>/session
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPath {
    /// Create a new party and become its first member.
    Create {
        game_name: String,
        game_version: String,
        game_server_name: String,
    },
    /// Join any party matching the options, or create one if none does.
    QuickMatch {
        game_name: String,
        game_version: String,
        game_server_name: String,
    },
    /// Connect to a known party by id.
    Connect { party_id: String },
}

impl SessionPath {
    /// The path suffix for this endpoint, without a leading `/`.
    pub fn to_path(&self) -> String {
        match self {
            Self::Create {
                game_name,
                game_version,
                game_server_name,
            } => format!("party/create/{game_name}/{game_version}/{game_server_name}"),
            Self::QuickMatch {
                game_name,
                game_version,
                game_server_name,
            } => format!("parties/{game_name}/{game_version}/{game_server_name}/session"),
            Self::Connect { party_id } => format!("party/{party_id}/session"),
        }
    }
}

// ---------------------------------------------------------------------------
// PartyOptions
// ---------------------------------------------------------------------------

/// Session options sent as query parameters when the session opens.
///
/// Every field is optional; unset fields are left out of the query so the
/// server applies its own defaults. The JSON fields are opaque to the
/// client and sent as compact JSON text.
///
/// ```rust
/// use partyline_party::PartyOptions;
/// use serde_json::json;
///
/// let options = PartyOptions::default()
///     .with_max_members(4)
///     .with_auto_start(true)
///     .with_party_settings(json!({"mode": "duel"}));
/// assert_eq!(
///     options.to_query(),
///     vec![
///         ("max_members".to_string(), "4".to_string()),
///         ("auto_start".to_string(), "true".to_string()),
///         ("party_settings".to_string(), r#"{"mode":"duel"}"#.to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartyOptions {
    /// Party capacity, when creating.
    pub max_members: Option<u32>,
    /// Join the party as soon as the session opens.
    pub auto_join: Option<bool>,
    /// Start the game once the party is full.
    pub auto_start: Option<bool>,
    /// Close the party once its game starts.
    pub auto_close: Option<bool>,
    pub party_settings: Option<Value>,
    pub room_settings: Option<Value>,
    /// Filters applied when looking for a room to start the game in.
    pub room_filters: Option<Value>,
    pub region: Option<String>,
    /// Profile sent with an automatic join.
    pub member_profile: Option<Value>,
    /// Server-side callback invoked when the party closes.
    pub close_callback: Option<String>,
}

impl PartyOptions {
    #[must_use]
    pub fn with_max_members(mut self, max_members: u32) -> Self {
        self.max_members = Some(max_members);
        self
    }

    #[must_use]
    pub fn with_auto_join(mut self, auto_join: bool) -> Self {
        self.auto_join = Some(auto_join);
        self
    }

    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = Some(auto_start);
        self
    }

    #[must_use]
    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = Some(auto_close);
        self
    }

    #[must_use]
    pub fn with_party_settings(mut self, settings: Value) -> Self {
        self.party_settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_room_settings(mut self, settings: Value) -> Self {
        self.room_settings = Some(settings);
        self
    }

    #[must_use]
    pub fn with_room_filters(mut self, filters: Value) -> Self {
        self.room_filters = Some(filters);
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_member_profile(mut self, profile: Value) -> Self {
        self.member_profile = Some(profile);
        self
    }

    #[must_use]
    pub fn with_close_callback(mut self, callback: impl Into<String>) -> Self {
        self.close_callback = Some(callback.into());
        self
    }

    /// Flattens the set options into query pairs, in field order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                query.push((key.to_owned(), value));
            }
        };

        push("max_members", self.max_members.map(|n| n.to_string()));
        push("auto_join", self.auto_join.map(|b| b.to_string()));
        push("auto_start", self.auto_start.map(|b| b.to_string()));
        push("auto_close", self.auto_close.map(|b| b.to_string()));
        push("party_settings", self.party_settings.as_ref().map(Value::to_string));
        push("room_settings", self.room_settings.as_ref().map(Value::to_string));
        push("room_filters", self.room_filters.as_ref().map(Value::to_string));
        push("region", self.region.clone());
        push("member_profile", self.member_profile.as_ref().map(Value::to_string));
        push("close_callback", self.close_callback.clone());
        query
    }
}
