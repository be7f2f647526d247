//! Built-in smart-home tool set
//!
//! The rooms the agent can act on, a `toggle_light` tool that records its
//! side effects into the turn context, and a no-op `stop_speaking` tool.

use crate::tools::context::TurnContext;
use crate::tools::registry::ToolRegistry;
use crate::tools::schema::{ParamType, ToolDecl};
use crate::{NatterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Turn-context key for rooms whose lights were switched on this round
pub const ENABLED_ROOMS: &str = "enabled_rooms";

/// Turn-context key for rooms whose lights were switched off this round
pub const DISABLED_ROOMS: &str = "disabled_rooms";

/// The closed set of rooms the agent can act upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Room {
    Bedroom,
    LivingRoom,
    Kitchen,
    Bathroom,
    Office,
}

impl Room {
    /// Spoken name of the room
    pub fn name(&self) -> &'static str {
        match self {
            Room::Bedroom => "bedroom",
            Room::LivingRoom => "living room",
            Room::Kitchen => "kitchen",
            Room::Bathroom => "bathroom",
            Room::Office => "office",
        }
    }

    /// Parse a room from its spoken name
    pub fn from_name(name: &str) -> Option<Self> {
        Room::all()
            .iter()
            .copied()
            .find(|room| room.name().eq_ignore_ascii_case(name.trim()))
    }

    /// All rooms, in schema order
    pub fn all() -> &'static [Room] {
        &[
            Room::Bedroom,
            Room::LivingRoom,
            Room::Kitchen,
            Room::Bathroom,
            Room::Office,
        ]
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Register the smart-home tools into `registry`
pub fn register_smart_home(registry: &mut ToolRegistry) -> Result<()> {
    let rooms: Vec<String> = Room::all().iter().map(|r| r.name().to_string()).collect();

    registry.register(
        ToolDecl::new("toggle_light", "Turn on/off the lights in a room")
            .param("room", ParamType::Enum(rooms), "The specific room")
            .param("status", ParamType::Bool, "Whether the lights should be on"),
        |args, cx: TurnContext| async move {
            let room_name = args.require_str("room")?.to_string();
            let status = args.require_bool("status")?;
            let room = Room::from_name(&room_name).ok_or_else(|| NatterError::InvalidArgument {
                tool: args.tool().to_string(),
                argument: "room".to_string(),
                reason: format!("`{}` is not a known room", room_name),
            })?;

            info!(%room, status, "toggle_light");
            let key = if status { ENABLED_ROOMS } else { DISABLED_ROOMS };
            cx.push(key, Value::String(room.name().to_string()));
            Ok(())
        },
    )?;

    registry.register(
        ToolDecl::new(
            "stop_speaking",
            "User wants the assistant to stop/pause speaking",
        ),
        |_args, _cx| async { Ok(()) },
    )?;

    Ok(())
}

/// Build the follow-up summarization prompt from a round's recorded
/// metadata, or `None` if no lights were touched.
pub fn summary_prompt(cx: &TurnContext) -> Option<String> {
    let room_list = |values: Vec<Value>| -> Vec<String> {
        values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    };

    let enabled = room_list(cx.get(ENABLED_ROOMS, &[]));
    let disabled = room_list(cx.get(DISABLED_ROOMS, &[]));
    if enabled.is_empty() && disabled.is_empty() {
        return None;
    }

    let mut prompt = String::from("Make a summary of the following actions you did:");
    if !enabled.is_empty() {
        prompt.push_str(&format!(
            "\n - You enabled the lights in the following rooms: {}",
            enabled.join(", ")
        ));
    }
    if !disabled.is_empty() {
        prompt.push_str(&format!(
            "\n - You disabled the lights in the following rooms: {}",
            disabled.join(", ")
        ));
    }
    Some(prompt)
}
