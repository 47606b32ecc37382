// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod binding;
pub mod error;
pub mod filter;
pub mod gate;
pub mod ids;
pub mod jid;
pub mod model;
pub mod request;
pub mod search;
pub mod state;

pub use binding::*;
pub use error::*;
pub use filter::*;
pub use gate::*;
pub use ids::*;
pub use jid::*;
pub use model::*;
pub use request::*;
pub use search::*;
pub use state::*;
