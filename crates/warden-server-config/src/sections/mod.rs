// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections, one module per concern.

mod handoff;
mod http;
mod logging;
mod oidc;
mod pkce;
mod policy;
mod session;

pub use handoff::{HandoffConfig, HandoffConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use oidc::OidcConfigLayer;
pub use pkce::{PkceConfig, PkceConfigLayer};
pub use policy::{baseline_defaults, PolicyConfigLayer, PolicySettings};
pub use session::{SessionConfig, SessionConfigLayer};
