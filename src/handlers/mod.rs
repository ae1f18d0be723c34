//! Built-in virtual channel handlers
//!
//! | Pattern | Handler |
//! |---|---|
//! | `quat_(aoattqt\|aocmdqt\|aotarqt\|aoatupq)` | [`QuatHandler`] |
//! | `cmd_state_<key>_<frames>` | [`CmdStateHandler`] |
//! | `dp_(orbit\|lunar\|solar)ephem_(x\|y\|z\|vx\|vy\|vz)` | [`EphemHandler`] |
//! | `(pitch\|roll)_comp` | [`PitchRollHandler`] |
//! | `(pm2thv1t\|pm1thv2t)_clean[_<version>]` | [`ValveCleanHandler`] |
//! | configured names | [`ScriptHandler`] |

pub mod cmd_state;
pub mod ephem;
pub mod mode;
pub mod pitch_roll;
pub mod quat;
pub mod script;
pub mod valve;

pub use cmd_state::CmdStateHandler;
pub use ephem::EphemHandler;
pub use mode::{ModeClass, ModeSegment, ModeSegmenter};
pub use pitch_roll::PitchRollHandler;
pub use quat::QuatHandler;
pub use script::ScriptHandler;
pub use valve::ValveCleanHandler;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::registry::Registry;
use crate::scripting::ScriptEngine;
use std::sync::Arc;

/// Register every built-in handler, then one handler per configured script
/// channel, in that order
pub fn register_defaults(registry: &mut Registry, config: &EngineConfig) -> Result<()> {
    registry.register(QuatHandler::PATTERN, QuatHandler::new())?;
    registry.register(CmdStateHandler::PATTERN, CmdStateHandler::new())?;
    registry.register(EphemHandler::PATTERN, EphemHandler::new(config.cache.ephemeris))?;
    registry.register(
        PitchRollHandler::PATTERN,
        PitchRollHandler::new(config.cache.modes, config.cache.safe_sensor),
    )?;
    registry.register(ValveCleanHandler::PATTERN, ValveCleanHandler::new())?;

    if !config.script_channels.is_empty() {
        let engine = Arc::new(ScriptEngine::new());
        for channel in &config.script_channels {
            let handler = ScriptHandler::new(channel, engine.clone())?;
            registry.register(&handler.pattern(), handler)?;
        }
    }

    tracing::debug!("Registered {} virtual channel families", registry.len());
    Ok(())
}
