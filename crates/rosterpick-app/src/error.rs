// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Conditions the picker absorbs instead of reporting. They show up in logs
/// and in the binding's resolve result, never as a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PickerFault {
    #[error("data provider is not attached")]
    MissingBackend,
    #[error("position {position} is out of range for {len} listed items")]
    ResolutionFailure { position: usize, len: usize },
}
