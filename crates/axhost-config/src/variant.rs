//! Operation sets a worker process can be started with.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Operation set exposed by a worker process.
///
/// Both variants share the same host; they differ only in the registry and
/// fallback the embedding application installs.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WorkerVariant {
    /// Executes accessibility operations on behalf of the controller.
    #[default]
    Worker,
    /// Watches the desktop and answers liveness probes.
    Monitor,
}
