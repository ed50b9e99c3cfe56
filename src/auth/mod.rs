// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod session;

pub use traits::{authorize, require_user, AuthProvider, Feature};
pub use session::SessionAuth;
